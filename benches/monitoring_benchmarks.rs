//! Micro-benchmarks for the hot paths that run every UI tick: Timeline
//! pushes (one per visible metric, every ~500ms) and the telemetry merge/
//! derive step (one per GPU, every sampler tick). Grounded in the teacher's
//! own `monitoring_benchmarks` criterion target name.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ai_z::core::{GpuTelemetry, Timeline};

fn bench_timeline_push(c: &mut Criterion) {
    c.bench_function("timeline_push_120_capacity", |b| {
        let mut t = Timeline::new(120);
        let mut i = 0.0;
        b.iter(|| {
            t.push(black_box(i));
            i += 1.0;
        });
    });
}

fn bench_timeline_values(c: &mut Criterion) {
    let mut t = Timeline::new(120);
    for i in 0..120 {
        t.push(i as f64);
    }
    c.bench_function("timeline_values_full", |b| {
        b.iter(|| black_box(t.values()));
    });
}

fn bench_gpu_telemetry_merge_and_derive(c: &mut Criterion) {
    c.bench_function("gpu_telemetry_merge_and_derive", |b| {
        b.iter(|| {
            let mut merged = GpuTelemetry::default();
            let nvml = GpuTelemetry {
                util_pct: Some(42.0),
                vram_used_gib: Some(4.0),
                vram_total_gib: Some(8.0),
                mem_clock_mhz: Some(10000),
                source: Some("nvml".to_string()),
                ..Default::default()
            };
            merged.merge_missing(black_box(nvml));
            merged.derive_missing(Some(256));
            black_box(merged)
        });
    });
}

criterion_group!(
    benches,
    bench_timeline_push,
    bench_timeline_values,
    bench_gpu_telemetry_merge_and_derive
);
criterion_main!(benches);
