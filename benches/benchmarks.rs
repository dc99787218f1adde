//! Benchmark suite for the timeline stores.
//!
//! This module provides performance benchmarks for:
//! - Zone tree installation and flattening
//! - View composition over large projections
//! - Optimistic apply/rollback on a loaded projection
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use takt::testing::fixtures::{spread_tasks, wide_forest, PROJECT};
use takt::{compose, TaskPatch, TaskProjectionStore, ViewSettings, ZoneHierarchyStore, ZoneId};

/// (roots, fanout, depth) giving roughly 1k, 10k and 100k zones.
const SHAPES: [(usize, usize, u32); 3] = [(10, 10, 3), (10, 10, 4), (100, 10, 4)];

fn zone_store(roots: usize, fanout: usize, depth: u32) -> ZoneHierarchyStore {
    let mut store = ZoneHierarchyStore::new();
    store
        .install(PROJECT, &wide_forest(roots, fanout, depth))
        .expect("generated forest is valid");
    store
}

// ============================================================================
// Zone Hierarchy Benchmarks
// ============================================================================

fn bench_zone_install(c: &mut Criterion) {
    let mut group = c.benchmark_group("zone_install");

    for (roots, fanout, depth) in SHAPES {
        let forest = wide_forest(roots, fanout, depth);
        let size = zone_store(roots, fanout, depth).arena().len();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &forest, |b, forest| {
            b.iter(|| {
                let mut store = ZoneHierarchyStore::new();
                black_box(store.install(PROJECT, black_box(forest)))
            });
        });
    }

    group.finish();
}

fn bench_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("zone_flatten");

    for (roots, fanout, depth) in SHAPES {
        let store = zone_store(roots, fanout, depth);
        let size = store.arena().len();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            b.iter(|| black_box(store.flatten()));
        });
    }

    group.finish();
}

// ============================================================================
// View Composer Benchmarks
// ============================================================================

fn bench_compose(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose");
    let settings = ViewSettings::default();

    for (roots, fanout, depth) in SHAPES {
        let zones = zone_store(roots, fanout, depth);
        let zone_ids: Vec<ZoneId> = zones.flatten().iter().map(|z| z.zone_id).collect();
        let mut tasks = TaskProjectionStore::new();
        tasks.replace_all(spread_tasks(zone_ids.len(), &zone_ids));
        let size = zone_ids.len();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &(zones, tasks),
            |b, (zones, tasks)| {
                b.iter(|| black_box(compose(zones, tasks, &settings)));
            },
        );
    }

    group.finish();
}

// ============================================================================
// Task Projection Benchmarks
// ============================================================================

/// One drag gesture followed by its rollback on a loaded projection.
fn bench_optimistic_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimistic_cycle");

    for size in [1_000usize, 10_000, 100_000] {
        let zone_ids: Vec<ZoneId> = (1..=100).map(ZoneId).collect();
        let rows = spread_tasks(size, &zone_ids);
        let target = rows[size / 2].id;
        let patch = TaskPatch::moved(rows[0].start_date, ZoneId(7));
        let mut store = TaskProjectionStore::new();
        store.replace_all(rows);

        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| {
                let token = store
                    .apply_optimistic(black_box(target), &patch)
                    .expect("target is loaded");
                black_box(store.rollback(token))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_zone_install,
    bench_flatten,
    bench_compose,
    bench_optimistic_cycle
);
criterion_main!(benches);
