use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use image::{DynamicImage, RgbImage};
use reduce_image::engine::{
    encode_jpeg, encode_png, fit_within_max, reduce_to_target, strategy_for, SearchPolicy,
};
use reduce_image::OutputFormat;
use std::hint::black_box;

fn create_test_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

fn bench_encoders(c: &mut Criterion) {
    let img = create_test_image(512, 512);
    let mut group = c.benchmark_group("encode");

    for quality in [50u8, 95] {
        group.bench_with_input(BenchmarkId::new("jpeg", quality), &quality, |b, &q| {
            b.iter(|| encode_jpeg(black_box(&img), q))
        });
    }
    for level in [0u8, 6, 9] {
        group.bench_with_input(BenchmarkId::new("png", level), &level, |b, &l| {
            b.iter(|| encode_png(black_box(&img), l))
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let img = create_test_image(512, 512);
    let policy = SearchPolicy::default();
    let mut group = c.benchmark_group("search");
    group.sample_size(10);

    for format in [OutputFormat::Jpeg, OutputFormat::Png] {
        let strategy = strategy_for(format);
        group.bench_function(BenchmarkId::new("shrink_20kb", format.as_str()), |b| {
            b.iter(|| reduce_to_target(black_box(&img), strategy.as_ref(), 20 * 1024, &policy))
        });
        group.bench_function(BenchmarkId::new("grow_2mb", format.as_str()), |b| {
            b.iter_batched(
                || img.clone(),
                |img| reduce_to_target(&img, strategy.as_ref(), 2 * 1024 * 1024, &policy),
                BatchSize::LargeInput,
            )
        });
        group.bench_function(BenchmarkId::new("fit_max_30kb", format.as_str()), |b| {
            b.iter(|| fit_within_max(black_box(&img), strategy.as_ref(), 30 * 1024, &policy))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encoders, bench_search);
criterion_main!(benches);
