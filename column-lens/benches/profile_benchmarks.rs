//! Benchmarks for the pure profiling stages and a full DataFusion run.

use std::hint::black_box;
use std::time::Duration;

use column_lens::analyzers::{infer_type, pattern_signature, ColumnProfiler};
use column_lens::core::{ColumnDescriptor, TableRef};
use column_lens::cross_column::correlation::pearson;
use column_lens::executor::DataFusionExecutor;
use column_lens::test_fixtures::create_profiling_context;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::runtime::Runtime;

fn random_values(count: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| match rng.random_range(0..4) {
            0 => rng.random_range(0..100_000).to_string(),
            1 => format!("{:.2}", rng.random_range(-1_000.0..1_000.0)),
            2 => format!("2024-{:02}-{:02}", rng.random_range(1..13), rng.random_range(1..29)),
            _ => format!("SKU-{}{}", rng.random_range(100..999), rng.random_range(b'A'..=b'Z') as char),
        })
        .collect()
}

fn bench_pattern_signature(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_signature");
    for size in [100, 1_000, 10_000] {
        let values = random_values(size, 42);
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter(|| {
                for value in values {
                    black_box(pattern_signature(black_box(value)));
                }
            });
        });
    }
    group.finish();
}

fn bench_type_inference(c: &mut Criterion) {
    let mut group = c.benchmark_group("type_inference");
    for size in [20, 200, 2_000] {
        let values = random_values(size, 7);
        group.bench_with_input(BenchmarkId::from_parameter(size), &values, |b, values| {
            b.iter(|| infer_type(black_box(values)));
        });
    }
    group.finish();
}

fn bench_pearson(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(3);
    let pairs: Vec<(f64, f64)> = (0..10_000)
        .map(|_| {
            let x: f64 = rng.random_range(0.0..100.0);
            (x, x * 2.0 + rng.random_range(-5.0..5.0))
        })
        .collect();
    c.bench_function("pearson_10k", |b| b.iter(|| pearson(black_box(&pairs))));
}

fn bench_profile_column(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let executor = DataFusionExecutor::new(rt.block_on(create_profiling_context()).unwrap());

    let mut group = c.benchmark_group("profile_column");
    group.measurement_time(Duration::from_secs(8));

    let cases = [
        ("numeric", ColumnDescriptor::new(TableRef::new("people"), "score", "DOUBLE")),
        ("textual", ColumnDescriptor::new(TableRef::new("people"), "code", "VARCHAR")),
        ("temporal", ColumnDescriptor::new(TableRef::new("orders"), "created_at", "TIMESTAMP")),
    ];
    for combine in [false, true] {
        let profiler = ColumnProfiler::builder().combine_scalar_fragments(combine).build();
        let mode = if combine { "combined" } else { "separate" };
        for (name, descriptor) in &cases {
            group.bench_with_input(BenchmarkId::new(mode, name), descriptor, |b, descriptor| {
                b.iter(|| rt.block_on(profiler.profile_column(&executor, black_box(descriptor))));
            });
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_pattern_signature,
    bench_type_inference,
    bench_pearson,
    bench_profile_column
);

criterion_main!(benches);
