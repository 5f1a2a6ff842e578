//! Benchmarks for the percentile reducer.
//!
//! Run with: cargo bench -p rtdemo-core

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rtdemo_core::{summarize, SampleRecorder};
use std::hint::black_box;

fn build_samples(len: usize) -> Vec<i64> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..len).map(|_| rng.gen_range(1_000..5_000_000)).collect()
}

fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize");

    for len in [1_000, 100_000, 1_000_000] {
        let samples = build_samples(len);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &samples, |b, s| {
            b.iter(|| summarize(black_box(s)).map(|sum| sum.p99))
        });
    }

    group.finish();
}

fn bench_record(c: &mut Criterion) {
    c.bench_function("recorder_record_10k", |b| {
        b.iter(|| {
            let rec = SampleRecorder::with_capacity(10_000);
            for v in 0..10_000 {
                rec.record(black_box(v));
            }
            rec.len()
        })
    });
}

criterion_group!(benches, bench_summarize, bench_record);
criterion_main!(benches);
