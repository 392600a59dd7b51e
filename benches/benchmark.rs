use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use visual_pdf::{
    CaptureOptions, CaptureTarget, Config, DefaultLogoLoader, DocumentComposer, PageFormat,
    PageGeometry, PageSlicer, StylePatcher,
};

#[cfg(feature = "integration_benchmarks")]
use visual_pdf::{BrowserSession, CaptureOverrides, VisualPdfService};

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn tall_capture() -> RgbaImage {
    // Roughly a long itinerary section at 2x on a 1440px wide layout.
    RgbaImage::from_fn(1800, 9000, |x, y| Rgba([(x % 251) as u8, (y % 241) as u8, 180, 255]))
}

// === UNIT BENCHMARKS ===

fn benchmark_slice_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice_planning");
    configure_fast_group(&mut group);

    for format in [PageFormat::A4, PageFormat::Letter, PageFormat::Legal] {
        let options = CaptureOptions {
            format,
            ..Default::default()
        };
        let slicer = PageSlicer::new(PageGeometry::from_options(&options).unwrap());

        group.bench_function(format!("{format:?}"), |b| {
            b.iter(|| {
                let plan = slicer.plan(black_box(1800), black_box(48_000)).unwrap();
                black_box(plan);
            });
        });
    }

    group.finish();
}

fn benchmark_slicing(c: &mut Criterion) {
    let mut group = c.benchmark_group("slicing");
    configure_fast_group(&mut group);

    let slicer = PageSlicer::new(PageGeometry::from_options(&CaptureOptions::default()).unwrap());
    let capture = tall_capture();

    group.bench_function("crop_pages", |b| {
        b.iter(|| {
            let (plan, pages) = slicer.slice(capture.clone()).unwrap();
            black_box((plan, pages));
        });
    });

    group.finish();
}

fn benchmark_composition(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("composition");
    configure_fast_group(&mut group);

    let options = CaptureOptions {
        include_logo: false,
        ..Default::default()
    };
    let geometry = PageGeometry::from_options(&options).unwrap();
    let (plan, pages) = PageSlicer::new(geometry).slice(tall_capture()).unwrap();
    let config = Config::default();

    let composer = DocumentComposer::new(
        geometry,
        options,
        config.branding.clone(),
        config.logo_timeout,
        Arc::new(DefaultLogoLoader::new()),
    );

    group.bench_function("compose", |b| {
        b.iter(|| {
            let document = rt.block_on(composer.compose(&plan, pages.clone())).unwrap();
            black_box(document);
        });
    });

    let document = rt.block_on(composer.compose(&plan, pages.clone())).unwrap();
    group.bench_function("serialize", |b| {
        b.iter(|| {
            let bytes = document.to_pdf_bytes().unwrap();
            black_box(bytes);
        });
    });

    group.finish();
}

fn benchmark_stylesheet(c: &mut Criterion) {
    let mut group = c.benchmark_group("color_fallbacks");
    configure_fast_group(&mut group);

    let config = Config::default();
    let patcher = StylePatcher::new(
        &CaptureTarget::Element("trip-details".to_string()),
        config.palette.clone(),
    );

    group.bench_function("stylesheet", |b| {
        b.iter(|| {
            black_box(patcher.stylesheet());
        });
    });

    group.finish();
}

fn benchmark_format_utilities(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_utilities");
    configure_fast_group(&mut group);

    group.bench_function("pdf_filename", |b| {
        b.iter(|| {
            black_box(visual_pdf::pdf_filename(black_box("../trips/kenya: 10 days")));
        });
    });

    group.bench_function("format_bytes", |b| {
        b.iter(|| {
            black_box(visual_pdf::format_bytes(black_box(3_456_789)));
        });
    });

    group.finish();
}

// === INTEGRATION BENCHMARKS ===

#[cfg(feature = "integration_benchmarks")]
fn benchmark_real_world_export(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("real_world_export");
    configure_fast_group(&mut group);

    group.bench_function("full_page", |b| {
        b.iter(|| {
            rt.block_on(async {
                let config = Config {
                    output_dir: std::env::temp_dir().join("visual-pdf-bench"),
                    ..Default::default()
                };

                let session = BrowserSession::launch(config.clone()).await.unwrap();
                let host = session.open("https://example.com").await.unwrap();

                let service = VisualPdfService::new(Arc::new(host), config);
                let overrides = CaptureOverrides {
                    include_logo: Some(false),
                    ..Default::default()
                };
                let result = service.generate_full_page_visual_pdf(&overrides).await;
                let success = result.is_ok();

                session.shutdown().await;
                black_box(success);
            })
        });
    });

    group.finish();
}

// === BENCHMARK GROUPS ===

criterion_group!(
    unit_benches,
    benchmark_slice_planning,
    benchmark_slicing,
    benchmark_composition,
    benchmark_stylesheet,
    benchmark_format_utilities,
);

#[cfg(feature = "integration_benchmarks")]
criterion_group!(integration_benches, benchmark_real_world_export);

#[cfg(feature = "integration_benchmarks")]
criterion_main!(unit_benches, integration_benches);

#[cfg(not(feature = "integration_benchmarks"))]
criterion_main!(unit_benches);
