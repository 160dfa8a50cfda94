//! Integration tests for the `region_pool` package.
//!
//! These tests exercise `RegionPool` only through its public API: allocation routing across
//! blocks, whole-block reclamation and the drop policy checks.

#![allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    reason = "test code doesn't need the same safety rigor as production code"
)]

use std::ptr::NonNull;

use new_zealand::nz;
use region_pool::{DropPolicy, Error, RegionPool};

fn fill(item: NonNull<u8>, size: usize, value: u8) {
    unsafe { item.as_ptr().write_bytes(value, size) };
}

fn all_equal(item: NonNull<u8>, size: usize, value: u8) -> bool {
    let bytes = unsafe { std::slice::from_raw_parts(item.as_ptr(), size) };
    bytes.iter().all(|&b| b == value)
}

#[test]
fn three_allocations_share_one_block_and_release_it() {
    let mut pool = RegionPool::new(nz!(4096), 0);

    let a = pool.alloc(20).unwrap();
    let b = pool.alloc(245).unwrap();
    let c = pool.alloc(3).unwrap();

    assert_ne!(a, b);
    assert_ne!(b, c);
    assert_ne!(a, c);
    assert_eq!(pool.block_count(), 1);
    assert_eq!(pool.len(), 3);

    unsafe {
        pool.free(c);
        pool.free(a);
    }
    assert_eq!(pool.block_count(), 1);

    unsafe { pool.free(b) };
    assert_eq!(pool.block_count(), 0);
    assert!(pool.is_empty());

    pool.destroy(DropPolicy::MustNotDropItems);
}

#[test]
fn every_free_order_reclaims_the_block() {
    let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

    for order in orders {
        let mut pool = RegionPool::builder()
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        let items = [
            pool.alloc(20).unwrap(),
            pool.alloc(245).unwrap(),
            pool.alloc(3).unwrap(),
        ];

        for index in order {
            assert_eq!(pool.block_count(), 1);
            unsafe { pool.free(items[index]) };
        }

        assert_eq!(pool.block_count(), 0);
    }
}

#[test]
fn second_large_request_opens_second_block() {
    let mut pool = RegionPool::new(nz!(64), 0);

    let first = pool.alloc(60).unwrap();
    assert_eq!(pool.block_count(), 1);

    let second = pool.alloc(60).unwrap();
    assert_eq!(pool.block_count(), 2);

    // Freeing the first block's only allocation releases that block and nothing else.
    unsafe { pool.free(first) };
    assert_eq!(pool.block_count(), 1);

    // The second block is still current and full, so even one byte opens a new block.
    let third = pool.alloc(1).unwrap();
    assert_eq!(pool.block_count(), 2);

    unsafe {
        pool.free(second);
        pool.free(third);
    }
    assert_eq!(pool.block_count(), 0);
}

#[test]
fn oversized_request_is_rejected_on_empty_pool() {
    let mut pool = RegionPool::new(nz!(128), 0);

    let error = pool.alloc(129).unwrap_err();
    assert_eq!(
        error,
        Error::AllocationExhausted {
            requested: 129,
            block_size: 128
        }
    );

    assert_eq!(pool.block_count(), 0);
    assert!(pool.is_empty());
}

#[test]
fn oversized_request_is_rejected_on_busy_pool() {
    let mut pool = RegionPool::new(nz!(128), 0);
    let item = pool.alloc(8).unwrap();

    assert!(matches!(
        pool.alloc(usize::MAX),
        Err(Error::AllocationExhausted { .. })
    ));

    assert_eq!(pool.block_count(), 1);
    assert_eq!(pool.len(), 1);

    unsafe { pool.free(item) };
}

#[test]
fn full_block_size_fits_and_next_byte_needs_new_block() {
    let mut pool = RegionPool::new(nz!(256), 0);

    let whole = pool.alloc(256).unwrap();
    fill(whole, 256, 0x5A);
    assert_eq!(pool.block_count(), 1);

    let next = pool.alloc(1).unwrap();
    assert_eq!(pool.block_count(), 2);

    assert!(all_equal(whole, 256, 0x5A));

    unsafe {
        pool.free(whole);
        pool.free(next);
    }
}

#[test]
fn allocations_are_aligned_and_keep_their_contents() {
    let mut pool = RegionPool::new(nz!(512), 0);

    let sizes = [1_usize, 2, 3, 5, 8, 13, 21, 34, 55, 89, 144, 233, 377, 0, 512, 7];
    let items: Vec<_> = sizes
        .iter()
        .map(|&size| (pool.alloc(size).unwrap(), size))
        .collect();

    for (index, &(item, size)) in items.iter().enumerate() {
        assert_eq!(item.as_ptr().addr() % align_of::<usize>(), 0);
        fill(item, size, u8::try_from(index).unwrap());
    }

    // Writing every allocation in full must not have clobbered any other allocation.
    for (index, &(item, size)) in items.iter().enumerate() {
        assert!(all_equal(item, size, u8::try_from(index).unwrap()));
    }

    let blocks_before = pool.block_count();

    for &(item, _) in &items {
        unsafe { pool.free(item) };
    }

    assert!(blocks_before > 1);
    assert_eq!(pool.block_count(), 0);
    assert!(pool.is_empty());
}

#[test]
fn interleaved_alloc_and_free_reclaims_everything() {
    let mut pool = RegionPool::builder()
        .block_size(nz!(100))
        .drop_policy(DropPolicy::MustNotDropItems)
        .build();

    let mut live = Vec::new();

    for round in 0_usize..200 {
        let size = (round * 37) % 90 + 1;
        let item = pool.alloc(size).unwrap();
        fill(item, size, u8::try_from(round % 251).unwrap());
        live.push((item, size, u8::try_from(round % 251).unwrap()));

        // Free the oldest allocation every third round.
        if round % 3 == 2 {
            let (item, size, value) = live.remove(0);
            assert!(all_equal(item, size, value));
            unsafe { pool.free(item) };
        }
    }

    assert_eq!(pool.len(), live.len());

    for (item, size, value) in live.drain(..) {
        assert!(all_equal(item, size, value));
        unsafe { pool.free(item) };
    }

    assert_eq!(pool.block_count(), 0);
}

#[test]
fn zero_sized_allocations_are_distinct() {
    let mut pool = RegionPool::new(nz!(64), 0);

    let a = pool.alloc(0).unwrap();
    let b = pool.alloc(0).unwrap();

    assert_ne!(a, b);
    assert_eq!(pool.len(), 2);

    unsafe {
        pool.free(a);
        pool.free(b);
    }

    assert_eq!(pool.block_count(), 0);
}

#[test]
fn max_size_is_reported() {
    let pool = RegionPool::new(nz!(64), 12345);

    assert_eq!(pool.max_size(), 12345);
    assert_eq!(pool.block_size(), 64);
    assert_eq!(pool.drop_policy(), DropPolicy::MayDropItems);
}

#[test]
fn dropping_pool_with_live_allocations_is_allowed_by_default() {
    let mut pool = RegionPool::new(nz!(64), 0);

    for _ in 0..10 {
        _ = pool.alloc(40).unwrap();
    }

    assert_eq!(pool.block_count(), 10);
    drop(pool);
}

#[test]
#[should_panic]
fn dropping_pool_with_live_allocations_panics_when_forbidden() {
    let mut pool = RegionPool::builder()
        .drop_policy(DropPolicy::MustNotDropItems)
        .build();

    _ = pool.alloc(40).unwrap();

    drop(pool);
}

#[test]
fn destroy_with_leak_check_succeeds_after_everything_is_freed() {
    let mut pool = RegionPool::new(nz!(32), 0);

    let items: Vec<_> = (0..16).map(|_| pool.alloc(24).unwrap()).collect();

    for item in items {
        unsafe { pool.free(item) };
    }

    pool.destroy(DropPolicy::MustNotDropItems);
}

#[test]
fn destroy_on_untouched_pool_succeeds() {
    let pool = RegionPool::builder()
        .drop_policy(DropPolicy::MustNotDropItems)
        .build();

    pool.destroy(DropPolicy::MustNotDropItems);
}
