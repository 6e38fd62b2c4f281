//! Benchmarks for the hot paths of the reactive core: computed cache hits,
//! wrapped reads under tracking, and coalesced batch flushes.
//!
//! Run with: cargo bench -p tether-core

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;

use tether_core::{Runtime, Value};

// ---------------------------------------------------------------------------
// 1. Computed cache hit vs recompute
// ---------------------------------------------------------------------------

fn bench_computed(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed");

    let (rt, _host) = Runtime::manual();
    let data = rt.wrap(json!({"a": 1, "b": 2})).unwrap();
    let d = data.clone();
    let sum = rt.computed(move || {
        d.get("a").as_f64().unwrap_or(0.0) + d.get("b").as_f64().unwrap_or(0.0)
    });
    sum.get().unwrap();

    group.bench_function("cache_hit", |b| b.iter(|| black_box(sum.get().unwrap())));

    let mut n = 0i64;
    group.bench_function("invalidate_and_recompute", |b| {
        b.iter(|| {
            n += 1;
            data.set("a", n).unwrap();
            black_box(sum.get().unwrap())
        })
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Tracked nested reads
// ---------------------------------------------------------------------------

fn bench_tracked_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracked_read");
    let (rt, _host) = Runtime::manual();
    let data = rt
        .wrap(json!({"user": {"profile": {"address": {"city": "Paris"}}}}))
        .unwrap();

    group.bench_function("depth_4", |b| {
        b.iter(|| {
            let tracked = rt.track(|| data.get_path("user.profile.address.city"));
            black_box(tracked.dependencies.len())
        })
    });
    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Batch coalescing
// ---------------------------------------------------------------------------

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");

    for writes in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(writes));
        let (rt, host) = Runtime::manual();
        rt.set_update_handler(|_, value| {
            black_box(value);
            Ok(())
        });
        let data = rt.wrap(json!({})).unwrap();
        let keys: Vec<String> = (0..16).map(|i| format!("k{i}")).collect();

        group.bench_with_input(BenchmarkId::new("write_then_frame", writes), &writes, |b, &writes| {
            b.iter(|| {
                for i in 0..writes {
                    let key = &keys[(i % 16) as usize];
                    data.set(key, Value::from(i as f64)).unwrap();
                }
                black_box(host.run_frame())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_computed, bench_tracked_reads, bench_batch);
criterion_main!(benches);
