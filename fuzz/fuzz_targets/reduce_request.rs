#![no_main]

//! Fuzz target for the full reduce path: form parsing, dimension fit and size search.
//! Targets are bounded so a single run stays fast.

use arbitrary::{Arbitrary, Unstructured};
use image::{DynamicImage, RgbImage};
use libfuzzer_sys::fuzz_target;
use reduce_image::engine::reduce_decoded;
use reduce_image::{OutputFormat, ReduceConfig, ReduceRequest};

#[derive(Arbitrary, Debug)]
struct RequestSeed {
    format: u8,
    width: u8,
    height: u8,
    resize_width: Option<u8>,
    resize_height: Option<u8>,
    target: u16,
    exact: bool,
}

const FORMATS: [OutputFormat; 5] = [
    OutputFormat::Png,
    OutputFormat::Jpeg,
    OutputFormat::WebP,
    OutputFormat::Gif,
    OutputFormat::Bmp,
];

fuzz_target!(|data: &[u8]| {
    let mut unstructured = Unstructured::new(data);
    let seed: RequestSeed = match RequestSeed::arbitrary(&mut unstructured) {
        Ok(s) => s,
        Err(_) => return,
    };

    let w = (seed.width as u32 % 64).max(1);
    let h = (seed.height as u32 % 64).max(1);
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        let i = (x + y * w) as usize;
        let b = data.get(i % data.len().max(1)).copied().unwrap_or(0);
        image::Rgb([b, b.wrapping_mul(3), b ^ 0x5a])
    }));

    let resize_w = seed.resize_width.map(|v| (v % 96).to_string());
    let resize_h = seed.resize_height.map(|v| (v % 96).to_string());
    // Keep targets small: KB only, never more than 64KB
    let target = ((seed.target % 256) as f64 / 4.0).to_string();
    let max_kb = (seed.target % 64).to_string();

    let mut fields: Vec<(&str, &str)> = Vec::new();
    if let Some(v) = resize_w.as_deref() {
        fields.push(("width", v));
    }
    if let Some(v) = resize_h.as_deref() {
        fields.push(("height", v));
    }
    if seed.exact {
        fields.push(("custom_target_size", target.as_str()));
        fields.push(("size_unit", "KB"));
    } else {
        fields.push(("max_file_size", max_kb.as_str()));
    }

    let request = match ReduceRequest::from_form(fields) {
        Ok(r) => r,
        Err(_) => return,
    };

    let format = FORMATS[seed.format as usize % FORMATS.len()];
    if let Ok(out) = reduce_decoded(&img, format, &request, &ReduceConfig::default()) {
        assert!(!out.bytes.is_empty());
        if let Some(reduce_image::SizingMode::Exact(t)) = request.sizing {
            if out.status == reduce_image::FitStatus::Padded {
                assert_eq!(out.bytes.len() as u64, t);
            }
        }
    }
});
