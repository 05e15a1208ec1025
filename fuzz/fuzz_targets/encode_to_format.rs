#![no_main]

//! Fuzz target for the encoder primitives.
//! Exercises JPEG (mozjpeg), PNG (oxipng), WebP (libwebp) and the plain GIF/BMP path.

use arbitrary::{Arbitrary, Unstructured};
use image::{DynamicImage, RgbaImage};
use libfuzzer_sys::fuzz_target;
use reduce_image::engine::{encode_jpeg, encode_plain, encode_png, encode_webp};
use reduce_image::OutputFormat;

#[derive(Arbitrary, Debug)]
struct EncodeSeed {
    format: u8,
    setting: u8,
    width: u8,
    height: u8,
}

fn build_image(data: &[u8], width: u8, height: u8) -> DynamicImage {
    // Limit dimensions to avoid OOM (max 128x128)
    let w = (width as u32 % 128).max(1);
    let h = (height as u32 % 128).max(1);

    let buffer: Vec<u8> = (0..(w * h * 4) as usize)
        .map(|i| data.get(i % data.len().max(1)).copied().unwrap_or(128))
        .collect();

    match RgbaImage::from_raw(w, h, buffer) {
        Some(rgba) => DynamicImage::ImageRgba8(rgba),
        None => DynamicImage::ImageRgba8(RgbaImage::new(1, 1)),
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    let mut unstructured = Unstructured::new(data);
    let seed: EncodeSeed = match EncodeSeed::arbitrary(&mut unstructured) {
        Ok(s) => s,
        Err(_) => return,
    };

    let img = build_image(data, seed.width, seed.height);

    // Only panics/crashes matter, not encode errors
    match seed.format % 5 {
        0 => {
            let _ = encode_jpeg(&img, seed.setting);
        }
        1 => {
            let _ = encode_png(&img, seed.setting % 10);
        }
        2 => {
            let _ = encode_webp(&img, seed.setting);
        }
        3 => {
            let _ = encode_plain(&img, OutputFormat::Gif);
        }
        _ => {
            let _ = encode_plain(&img, OutputFormat::Bmp);
        }
    }
});
