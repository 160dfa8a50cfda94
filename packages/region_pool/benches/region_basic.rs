//! Basic benchmarks for the `region_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use criterion::{Criterion, criterion_group, criterion_main};
use new_zealand::nz;
use region_pool::RegionPool;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

const SMALL_ALLOCATION: usize = 24;

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("region_basic");

    group.bench_function("build_empty", |b| {
        b.iter(|| drop(black_box(RegionPool::new(nz!(4096), 0))));
    });

    group.bench_function("alloc_one_fresh_block", |b| {
        b.iter_custom(|iters| {
            let mut pools = iter::repeat_with(|| RegionPool::new(nz!(4096), 0))
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let start = Instant::now();

            for pool in &mut pools {
                _ = black_box(pool.alloc(black_box(SMALL_ALLOCATION)));
            }

            start.elapsed()
        });
    });

    group.bench_function("alloc_one_warm_block", |b| {
        b.iter_custom(|iters| {
            // Large enough that no new block is ever needed during the measurement.
            let block_size = usize::try_from(iters)
                .unwrap()
                .saturating_mul(SMALL_ALLOCATION * 2)
                .max(4096);

            let mut pool = RegionPool::builder()
                .block_size(block_size.try_into().unwrap())
                .build();

            // Create the block outside the measured region.
            let warmup = pool.alloc(1).unwrap();

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(pool.alloc(black_box(SMALL_ALLOCATION)));
            }

            let elapsed = start.elapsed();

            // SAFETY: The pointer came from this pool and is freed exactly once.
            unsafe { pool.free(warmup) };

            elapsed
        });
    });

    group.bench_function("alloc_free_block_cycle", |b| {
        b.iter_custom(|iters| {
            let mut pool = RegionPool::new(nz!(4096), 0);

            let start = Instant::now();

            // Every iteration creates a block and releases it together with its only allocation.
            for _ in 0..iters {
                let item = pool.alloc(black_box(SMALL_ALLOCATION)).unwrap();
                // SAFETY: The pointer came from this pool and is freed exactly once.
                unsafe { pool.free(black_box(item)) };
            }

            start.elapsed()
        });
    });

    group.finish();

    let mut group = c.benchmark_group("region_slow");

    group.bench_function("alloc_free_10k", |b| {
        b.iter(|| {
            let mut pool = RegionPool::new(nz!(4096), 0);

            let items = (0..10_000)
                .map(|_| pool.alloc(SMALL_ALLOCATION).unwrap())
                .collect::<Vec<_>>();

            for item in items {
                // SAFETY: The pointer came from this pool and is freed exactly once.
                unsafe { pool.free(item) };
            }

            black_box(pool.block_count())
        });
    });

    group.finish();
}
