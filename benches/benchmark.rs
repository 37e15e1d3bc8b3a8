use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};
use serde_json::json;
use shotbot::{AutoCropOptions, Behavior, BotConfig};
use std::collections::HashMap;
use std::time::Duration;

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn framed_image(size: u32, border: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let inside = x >= border && y >= border && x < size - border && y < size - border;
        if inside {
            Rgba([(x % 256) as u8, (y % 256) as u8, 90, 255])
        } else {
            Rgba([255, 255, 255, 255])
        }
    })
}

fn benchmark_auto_crop(c: &mut Criterion) {
    let mut group = c.benchmark_group("auto_crop");
    configure_fast_group(&mut group);

    let options = AutoCropOptions::default();
    let framed = framed_image(512, 40);
    let unframed = framed_image(512, 0);

    group.bench_function("bounds_framed", |b| {
        b.iter(|| black_box(shotbot::auto_crop_bounds(&framed, &options)));
    });

    group.bench_function("bounds_unframed", |b| {
        b.iter(|| black_box(shotbot::auto_crop_bounds(&unframed, &options)));
    });

    group.finish();
}

fn benchmark_target_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("targets");
    configure_fast_group(&mut group);

    let config: BotConfig = serde_json::from_value(json!({
        "snapshot_service": { "url": "https://snap.example/shot", "key": "k1" },
        "targets": {
            "mastodon": { "endpoint": "https://social.example/post" },
            "bluesky": { "endpoint": "https://bsky.example/post" }
        }
    }))
    .unwrap();
    let behavior: Behavior = serde_json::from_value(json!({
        "archive": { "id_prefix": "shot", "root_path": "archive" },
        "posting_targets": ["archive", "mastodon", "bluesky"],
        "image_source": { "kind": "jobs", "jobs": [] }
    }))
    .unwrap();
    let texts = HashMap::from([("mastodon".to_string(), "#screenshot".to_string())]);

    group.bench_function("build", |b| {
        b.iter(|| black_box(shotbot::build_targets(&texts, &config, &behavior)));
    });

    group.bench_function("post_id", |b| {
        b.iter(|| black_box(shotbot::post_id("shot")));
    });

    group.finish();
}

fn benchmark_filename_utilities(c: &mut Criterion) {
    let mut group = c.benchmark_group("filename_utilities");
    configure_fast_group(&mut group);

    let alt_texts = vec![
        "cat",
        "a cat on a mat",
        "file/with\\bad:chars*?\"<>|",
    ];

    group.bench_function("sanitize", |b| {
        b.iter(|| {
            for alt in &alt_texts {
                black_box(shotbot::sanitize_filename(alt));
            }
        });
    });

    group.bench_function("timestamp", |b| {
        b.iter(|| black_box(shotbot::filesystem_timestamp(Utc::now())));
    });

    group.finish();
}

criterion_group!(
    unit_benches,
    benchmark_auto_crop,
    benchmark_target_building,
    benchmark_filename_utilities,
);

criterion_main!(unit_benches);
