use std::cell::Cell;
use std::marker::PhantomData;
use std::num::NonZero;

use crate::{DEFAULT_BLOCK_SIZE, DropPolicy, RegionPool};

/// Builder for creating an instance of [`RegionPool`].
///
/// All settings are optional. A pool built without any configuration uses blocks of
/// 4096 bytes and releases outstanding allocations silently when dropped.
///
/// # Examples
///
/// ```
/// use new_zealand::nz;
/// use region_pool::{DropPolicy, RegionPool};
///
/// let pool = RegionPool::builder()
///     .block_size(nz!(65536))
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
///
/// assert_eq!(pool.block_size(), 65536);
/// ```
///
/// # Thread safety
///
/// The builder is thread-mobile ([`Send`]) and can be safely transferred between threads,
/// allowing pool configuration to happen on different threads than where the pool is used.
/// However, it is not thread-safe ([`Sync`]) as it contains mutable configuration state.
#[derive(Debug)]
#[must_use]
pub struct RegionPoolBuilder {
    block_size: NonZero<usize>,
    max_size: usize,
    drop_policy: DropPolicy,

    // Prevents Sync while allowing Send - builders are thread-mobile but not thread-safe
    _not_sync: PhantomData<Cell<()>>,
}

impl RegionPoolBuilder {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_size: 0,
            drop_policy: DropPolicy::default(),
            _not_sync: PhantomData,
        }
    }

    /// Sets the capacity of every block the pool creates.
    ///
    /// This is also the largest allocation the pool can serve.
    #[inline]
    pub fn block_size(mut self, block_size: NonZero<usize>) -> Self {
        self.block_size = block_size;
        self
    }

    /// Sets the maximum size of the pool.
    ///
    /// This value is stored and reported by [`RegionPool::max_size()`] but is not enforced.
    #[inline]
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Sets the [drop policy][DropPolicy] for the pool. This governs how to treat
    /// allocations that were never freed when the pool is dropped.
    #[inline]
    pub fn drop_policy(mut self, policy: DropPolicy) -> Self {
        self.drop_policy = policy;
        self
    }

    /// Builds the region pool with the specified configuration.
    ///
    /// No memory is reserved until the first allocation.
    #[must_use]
    #[inline]
    pub fn build(self) -> RegionPool {
        RegionPool::new_inner(self.block_size, self.max_size, self.drop_policy)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use new_zealand::nz;
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    assert_impl_all!(RegionPoolBuilder: Send, std::fmt::Debug);
    assert_not_impl_any!(RegionPoolBuilder: Sync);

    #[test]
    fn defaults() {
        let builder = RegionPoolBuilder::new();
        assert_eq!(builder.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(builder.max_size, 0);
        assert_eq!(builder.drop_policy, DropPolicy::MayDropItems);
    }

    #[test]
    fn settings_are_applied() {
        let pool = RegionPoolBuilder::new()
            .block_size(nz!(128))
            .max_size(1024)
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        assert_eq!(pool.block_size(), 128);
        assert_eq!(pool.max_size(), 1024);
        assert_eq!(pool.drop_policy(), DropPolicy::MustNotDropItems);
        assert!(pool.is_empty());
        assert_eq!(pool.block_count(), 0);
    }

    #[test]
    fn large_block_size_serves_full_block_request() {
        let mut pool = RegionPoolBuilder::new()
            .block_size(nz!(65536))
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        assert_eq!(pool.block_size(), 65536);

        let item = pool.alloc(65536).unwrap();
        assert_eq!(pool.block_count(), 1);

        // SAFETY: The pointer came from this pool and is freed exactly once.
        unsafe { pool.free(item) };
        assert_eq!(pool.block_count(), 0);
    }

    #[test]
    fn later_settings_override_earlier_ones() {
        let builder = RegionPoolBuilder::new()
            .block_size(nz!(32))
            .block_size(nz!(64))
            .drop_policy(DropPolicy::MustNotDropItems)
            .drop_policy(DropPolicy::MayDropItems);

        assert_eq!(builder.block_size.get(), 64);
        assert_eq!(builder.drop_policy, DropPolicy::MayDropItems);
    }

    #[test]
    fn builder_can_move_between_threads() {
        let builder = RegionPoolBuilder::new().block_size(nz!(256));
        let handle = std::thread::spawn(move || builder.build());
        let pool = handle.join().expect("thread completed successfully");

        assert_eq!(pool.block_size(), 256);
    }
}
