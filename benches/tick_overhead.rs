//! Benchmarks for per-tick engine overhead across policy families

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use ticksched::prelude::*;

fn bench_case(c: &mut Criterion, name: &str, case_id: u8) {
    let config = SimConfig::builder().emit_snapshots(false).build().unwrap();

    c.bench_function(name, |b| {
        b.iter(|| {
            let mut sim = Simulation::new(config.clone(), Arc::new(NullSink)).unwrap();
            sim.load_case(case_id).unwrap();
            black_box(sim.run().unwrap())
        });
    });
}

fn bench_rate_monotonic(c: &mut Criterion) {
    bench_case(c, "rm_demo_400_ticks", 1);
}

fn bench_rm_full_load(c: &mut Criterion) {
    bench_case(c, "rm_full_load_900_ticks", 5);
}

fn bench_adaptive_removal(c: &mut Criterion) {
    bench_case(c, "adaptive_removal_1000_ticks", 48);
}

fn bench_skip_over(c: &mut Criterion) {
    bench_case(c, "edf_rto_600_ticks", 19);
}

criterion_group!(
    benches,
    bench_rate_monotonic,
    bench_rm_full_load,
    bench_adaptive_removal,
    bench_skip_over
);
criterion_main!(benches);
