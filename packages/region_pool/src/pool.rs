use std::num::NonZero;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use new_zealand::nz;
use tracing::{debug, warn};

use crate::{Block, DropPolicy, Error, RegionPoolBuilder, Result};

/// Global counter for generating unique pool IDs.
static POOL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique pool ID.
fn generate_pool_id() -> u64 {
    POOL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Capacity of each block when the builder is not told otherwise.
pub(crate) const DEFAULT_BLOCK_SIZE: NonZero<usize> = nz!(4096);

/// A region-based memory pool that serves variable-size allocations from large blocks.
///
/// Allocations are carved from the current block with a bump cursor. When the current block
/// cannot fit a request, a new block is created, appended to the pool's chain of blocks and
/// becomes the current block. Earlier blocks are never revisited for carving, even if
/// some of their allocations have since been freed.
///
/// Each block counts its live allocations. When the last allocation carved from a block is
/// freed, the block is unlinked and its memory is returned to the global allocator in one step.
///
/// Every returned pointer is preceded by a small header from which the owning block can be
/// recovered in constant time, so [`free()`](Self::free) never needs to search for the owner.
///
/// # Examples
///
/// ```
/// use new_zealand::nz;
/// use region_pool::RegionPool;
///
/// let mut pool = RegionPool::new(nz!(4096), 0);
///
/// let a = pool.alloc(20).unwrap();
/// let b = pool.alloc(245).unwrap();
///
/// // SAFETY: The allocation is 20 bytes long and we are its only user.
/// unsafe { a.as_ptr().write_bytes(0xAA, 20) };
///
/// assert_eq!(pool.len(), 2);
/// assert_eq!(pool.block_count(), 1);
///
/// // SAFETY: Both pointers came from this pool and are freed exactly once.
/// unsafe {
///     pool.free(a);
///     pool.free(b);
/// }
///
/// // The block was reclaimed as soon as it became empty.
/// assert_eq!(pool.block_count(), 0);
/// ```
///
/// # Thread safety
///
/// The pool is thread-mobile ([`Send`]) and can be moved between threads, but it is not
/// thread-safe ([`Sync`]) and cannot be shared between threads without additional synchronization.
#[derive(Debug)]
pub struct RegionPool {
    /// Tag written into every block we create, so pointers from a different pool can be
    /// detected when they are freed here.
    pool_id: u64,

    block_size: NonZero<usize>,

    /// Accepted at creation and reported back, but not enforced by any allocation path.
    max_size: usize,

    /// First block of the chain, in creation order.
    head: Option<NonNull<Block>>,

    /// Last block of the chain, where new blocks are linked.
    tail: Option<NonNull<Block>>,

    /// The block we are carving from. Always a member of the chain if set.
    current: Option<NonNull<Block>>,

    /// Number of blocks in the chain.
    block_count: usize,

    /// Number of live allocations across all blocks. We track this explicitly to avoid
    /// walking the chain when calculating the length.
    length: usize,

    drop_policy: DropPolicy,
}

impl RegionPool {
    /// Creates a builder for configuring and constructing a [`RegionPool`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use new_zealand::nz;
    /// use region_pool::RegionPool;
    ///
    /// let pool = RegionPool::builder().block_size(nz!(1024)).build();
    ///
    /// assert_eq!(pool.block_size(), 1024);
    /// assert!(pool.is_empty());
    /// ```
    #[inline]
    pub fn builder() -> RegionPoolBuilder {
        RegionPoolBuilder::new()
    }

    /// Creates a pool whose blocks each hold `block_size` bytes.
    ///
    /// `max_size` is recorded and reported by [`max_size()`](Self::max_size) but no
    /// allocation path consults it.
    ///
    /// No memory is reserved until the first allocation.
    #[must_use]
    #[inline]
    pub fn new(block_size: NonZero<usize>, max_size: usize) -> Self {
        Self::builder()
            .block_size(block_size)
            .max_size(max_size)
            .build()
    }

    #[must_use]
    pub(crate) fn new_inner(
        block_size: NonZero<usize>,
        max_size: usize,
        drop_policy: DropPolicy,
    ) -> Self {
        Self {
            pool_id: generate_pool_id(),
            block_size,
            max_size,
            head: None,
            tail: None,
            current: None,
            block_count: 0,
            length: 0,
            drop_policy,
        }
    }

    /// The capacity of each block, which is also the largest allocation the pool can serve.
    #[must_use]
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size.get()
    }

    /// The maximum size given at creation time. Informational only.
    #[must_use]
    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// The drop policy applied when the pool is dropped.
    #[must_use]
    #[inline]
    pub fn drop_policy(&self) -> DropPolicy {
        self.drop_policy
    }

    /// Number of allocations that have been made and not yet freed.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Whether the pool has no live allocations.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Number of blocks the pool currently holds.
    ///
    /// Blocks are created on demand and released as soon as their last allocation is freed.
    #[must_use]
    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Allocates `size` bytes and returns a pointer to them.
    ///
    /// The pointer is aligned to the platform word size and the memory is uninitialized. It
    /// stays valid until it is passed to [`free()`](Self::free) or the pool is dropped.
    ///
    /// Only the current block is considered. If it cannot fit the request, a new block is
    /// created even if older blocks have room.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AllocationExhausted`] if `size` is larger than the pool's block size,
    /// since an allocation never spans blocks.
    ///
    /// Returns [`Error::BackingAllocationFailed`] if a new block was needed and its memory
    /// could not be acquired.
    pub fn alloc(&mut self, size: usize) -> Result<NonNull<u8>> {
        if size > self.block_size.get() {
            return Err(Error::AllocationExhausted {
                requested: size,
                block_size: self.block_size.get(),
            });
        }

        if let Some(mut current) = self.current {
            // SAFETY: The current block is a member of our chain and chain members stay alive
            // until we unlink them. We hold &mut self, so nobody else is touching it.
            let current = unsafe { current.as_mut() };

            if let Some(item) = current.carve(size) {
                self.length = self.length.wrapping_add(1);
                return Ok(item);
            }
        }

        self.add_block_and_alloc(size)
    }

    fn add_block_and_alloc(&mut self, size: usize) -> Result<NonNull<u8>> {
        let mut block = Block::create(self.pool_id, self.block_size.get())?;

        // SAFETY: We just created the block and are its only user.
        let Some(item) = unsafe { block.as_mut() }.carve(size) else {
            // A fresh block holds block_size bytes and we checked the size against that,
            // so this is not expected. We still must not leave an empty block behind.
            // SAFETY: The block was never linked and nothing points into it.
            unsafe {
                Block::destroy(block, DropPolicy::MayDropItems);
            }

            return Err(Error::AllocationExhausted {
                requested: size,
                block_size: self.block_size.get(),
            });
        };

        self.link(block);
        self.current = Some(block);
        self.length = self.length.wrapping_add(1);

        Ok(item)
    }

    /// Appends a block to the end of the chain.
    fn link(&mut self, block: NonNull<Block>) {
        match self.tail {
            Some(mut tail) => {
                // SAFETY: The tail is a live member of our chain and we hold &mut self.
                unsafe { tail.as_mut() }.set_next(Some(block));
            }
            None => self.head = Some(block),
        }

        self.tail = Some(block);

        // Cannot overflow because every block occupies memory.
        self.block_count = self.block_count.wrapping_add(1);

        debug!(
            pool_id = self.pool_id,
            block_count = self.block_count,
            "linked new current block"
        );
    }

    /// Removes a block from the chain, fixing up every reference that pointed at it.
    ///
    /// Returns `false` if the block was not found in the chain.
    fn unlink(&mut self, block: NonNull<Block>) -> bool {
        let mut previous: Option<NonNull<Block>> = None;
        let mut cursor = self.head;

        // The chain is singly linked, so finding the predecessor requires a walk from the head.
        while let Some(candidate) = cursor {
            // SAFETY: Every block reachable from the head is a live member of our chain.
            let next = unsafe { candidate.as_ref() }.next();

            if candidate == block {
                match previous {
                    Some(mut previous) => {
                        // SAFETY: The predecessor is a live member of our chain.
                        unsafe { previous.as_mut() }.set_next(next);
                    }
                    None => self.head = next,
                }

                if self.tail == Some(block) {
                    self.tail = previous;
                }

                if self.current == Some(block) {
                    self.current = None;
                }

                // Cannot underflow because we just found the block in the chain.
                self.block_count = self.block_count.wrapping_sub(1);

                return true;
            }

            previous = cursor;
            cursor = next;
        }

        false
    }

    /// Returns an allocation to the pool.
    ///
    /// If this was the last live allocation of its block, the block is unlinked from the pool
    /// and its memory is released immediately.
    ///
    /// In debug builds, panics if the pointer belongs to a different pool or if its block has
    /// no live allocations left (which indicates a double free).
    ///
    /// # Safety
    ///
    /// The caller must guarantee that:
    /// - `ptr` was returned by [`alloc()`](Self::alloc) on this pool.
    /// - `ptr` has not already been freed.
    /// - The memory behind `ptr` is not accessed after this call.
    ///
    /// Violating these requirements silently corrupts the pool's bookkeeping.
    pub unsafe fn free(&mut self, ptr: NonNull<u8>) {
        #[cfg(debug_assertions)]
        {
            // SAFETY: Forwarding guarantees from the caller.
            let owner = unsafe { Block::owner_of(ptr) };

            // SAFETY: The owning block is alive per the caller's guarantees.
            let owner_pool_id = unsafe { owner.as_ref() }.owner();

            assert_eq!(
                owner_pool_id, self.pool_id,
                "attempted to free a pointer from pool {owner_pool_id} in pool {}",
                self.pool_id
            );
        }

        // SAFETY: Forwarding guarantees from the caller.
        let block = unsafe { Block::release(ptr) };

        // Legitimate usage cannot underflow because every freed pointer was counted by alloc().
        self.length = self.length.wrapping_sub(1);

        // SAFETY: The block is a live member of our chain, as it had a live allocation.
        if unsafe { block.as_ref() }.live() > 0 {
            return;
        }

        let unlinked = self.unlink(block);
        debug_assert!(unlinked, "empty block was not found in its pool's chain");

        if unlinked {
            // SAFETY: The block is no longer linked and its live count is zero, so there are
            // no pointers into it that may legitimately be used.
            unsafe {
                Block::destroy(block, DropPolicy::MayDropItems);
            }

            debug!(
                pool_id = self.pool_id,
                block_count = self.block_count,
                "reclaimed empty block"
            );
        }
    }

    /// Destroys the pool, applying `drop_policy` instead of the policy the pool was built with.
    ///
    /// With [`DropPolicy::MustNotDropItems`], panics if any allocation is still live. All memory
    /// is released before the check is made.
    pub fn destroy(mut self, drop_policy: DropPolicy) {
        self.destroy_blocks(drop_policy);
    }

    /// Destroys every block in chain order and leaves the pool empty.
    fn destroy_blocks(&mut self, drop_policy: DropPolicy) {
        let mut leaked: usize = 0;
        let mut cursor = self.head.take();

        while let Some(block) = cursor {
            // SAFETY: Every block reachable from the head is a live member of our chain.
            let block_ref = unsafe { block.as_ref() };

            cursor = block_ref.next();
            leaked = leaked.saturating_add(block_ref.live());

            // SAFETY: We took the whole chain out of the pool above, so the block is no longer
            // linked anywhere and we never touch it again. The policy check happens once below
            // so that the remaining blocks are still released if it fails.
            unsafe {
                Block::destroy(block, DropPolicy::MayDropItems);
            }
        }

        self.tail = None;
        self.current = None;
        self.block_count = 0;
        self.length = 0;

        if leaked > 0 {
            warn!(
                pool_id = self.pool_id,
                leaked, "destroyed pool with live allocations"
            );
        }

        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if !thread::panicking() && matches!(drop_policy, DropPolicy::MustNotDropItems) {
            assert!(
                leaked == 0,
                "dropped a RegionPool with {leaked} live allocations - this is forbidden by DropPolicy::MustNotDropItems"
            );
        }
    }

    /// Current block, for tests that inspect routing decisions.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn current(&self) -> Option<NonNull<Block>> {
        self.current
    }

    /// All blocks in chain order.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn chain(&self) -> Vec<NonNull<Block>> {
        let mut blocks = Vec::new();
        let mut cursor = self.head;

        while let Some(block) = cursor {
            blocks.push(block);
            // SAFETY: Every block reachable from the head is a live member of our chain.
            cursor = unsafe { block.as_ref() }.next();
        }

        blocks
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self) {
        let chain = self.chain();

        assert_eq!(
            chain.len(),
            self.block_count,
            "chain holds {} blocks but block_count is {}",
            chain.len(),
            self.block_count
        );

        assert_eq!(chain.last().copied(), self.tail, "tail is not the last block");

        if let Some(current) = self.current {
            assert!(chain.contains(&current), "current block is not in the chain");
        }

        let mut observed_length: usize = 0;

        for block in &chain {
            // SAFETY: Every block in the chain is alive.
            let block = unsafe { block.as_ref() };
            block.integrity_check(self.pool_id);
            assert_eq!(block.capacity(), self.block_size.get());

            observed_length = observed_length.wrapping_add(block.live());
        }

        assert_eq!(
            observed_length, self.length,
            "sum of live counts {observed_length} does not match length {}",
            self.length
        );
    }
}

impl Drop for RegionPool {
    fn drop(&mut self) {
        self.destroy_blocks(self.drop_policy);
    }
}

// SAFETY: The pool exclusively owns every block in its chain and every block exclusively owns
// its buffer. Nothing is shared with other pools or threads and no thread-local state is used,
// so moving the whole structure to another thread is sound. It is not Sync because the
// blocks are mutated without synchronization.
unsafe impl Send for RegionPool {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::indexing_slicing,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::collections::HashSet;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::header::WORD_ALIGNMENT;

    assert_impl_all!(RegionPool: Send, std::fmt::Debug);
    assert_not_impl_any!(RegionPool: Sync);

    #[test]
    fn smoke_test() {
        let mut pool = RegionPool::builder()
            .block_size(nz!(4096))
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        let a = pool.alloc(20).unwrap();
        let b = pool.alloc(245).unwrap();
        let c = pool.alloc(3).unwrap();

        let distinct: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(distinct.len(), 3);

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.block_count(), 1);
        pool.integrity_check();

        unsafe {
            pool.free(b);
            pool.integrity_check();
            pool.free(c);
            pool.integrity_check();
            pool.free(a);
        }

        pool.integrity_check();
        assert!(pool.is_empty());
        assert_eq!(pool.block_count(), 0);
        assert!(pool.current().is_none());
        assert!(pool.chain().is_empty());

        pool.destroy(DropPolicy::MustNotDropItems);
    }

    #[test]
    fn full_second_request_creates_second_block() {
        let mut pool = RegionPool::new(nz!(64), 0);

        let first = pool.alloc(60).unwrap();
        let second = pool.alloc(60).unwrap();

        pool.integrity_check();
        assert_eq!(pool.block_count(), 2);

        let chain = pool.chain();
        assert_eq!(pool.current(), Some(chain[1]));

        unsafe {
            assert_eq!(Block::owner_of(first), chain[0]);
            assert_eq!(Block::owner_of(second), chain[1]);
        }
    }

    #[test]
    fn oversized_request_fails_without_creating_block() {
        let mut pool = RegionPool::new(nz!(64), 0);

        assert_eq!(
            pool.alloc(65).unwrap_err(),
            Error::AllocationExhausted {
                requested: 65,
                block_size: 64
            }
        );

        assert_eq!(pool.block_count(), 0);
        assert!(pool.current().is_none());
        pool.integrity_check();
    }

    #[test]
    fn exact_fit_then_one_byte_creates_new_block() {
        let mut pool = RegionPool::new(nz!(64), 0);

        let whole = pool.alloc(64).unwrap();
        assert_eq!(pool.block_count(), 1);

        let one = pool.alloc(1).unwrap();
        assert_eq!(pool.block_count(), 2);
        pool.integrity_check();

        unsafe {
            assert_ne!(Block::owner_of(whole), Block::owner_of(one));
        }
    }

    #[test]
    fn exact_fit_of_remaining_space_stays_in_block() {
        let mut pool = RegionPool::new(nz!(128), 0);

        _ = pool.alloc(10).unwrap();

        let current = pool.current().unwrap();
        let remaining = unsafe { current.as_ref() }.remaining();

        _ = pool.alloc(remaining).unwrap();
        assert_eq!(pool.block_count(), 1);
        assert_eq!(unsafe { current.as_ref() }.remaining(), 0);

        _ = pool.alloc(1).unwrap();
        assert_eq!(pool.block_count(), 2);
        pool.integrity_check();
    }

    #[test]
    fn freeing_non_current_block_keeps_current() {
        let mut pool = RegionPool::new(nz!(64), 0);

        let a = pool.alloc(60).unwrap();
        let b = pool.alloc(60).unwrap();
        let c = pool.alloc(60).unwrap();

        let chain = pool.chain();
        assert_eq!(chain.len(), 3);

        // Middle block.
        unsafe { pool.free(b) };
        pool.integrity_check();
        assert_eq!(pool.chain(), vec![chain[0], chain[2]]);
        assert_eq!(pool.current(), Some(chain[2]));

        // Head block.
        unsafe { pool.free(a) };
        pool.integrity_check();
        assert_eq!(pool.chain(), vec![chain[2]]);
        assert_eq!(pool.current(), Some(chain[2]));

        unsafe { pool.free(c) };
        pool.integrity_check();
        assert!(pool.chain().is_empty());
        assert!(pool.current().is_none());
    }

    #[test]
    fn freeing_current_block_links_next_block_after_tail() {
        let mut pool = RegionPool::new(nz!(64), 0);

        let a = pool.alloc(60).unwrap();
        let b = pool.alloc(60).unwrap();

        // Empty the current (tail) block, leaving the first block behind.
        unsafe { pool.free(b) };
        pool.integrity_check();
        assert!(pool.current().is_none());
        assert_eq!(pool.block_count(), 1);

        // The next allocation gets a fresh block linked behind the surviving one.
        let c = pool.alloc(8).unwrap();
        pool.integrity_check();
        assert_eq!(pool.block_count(), 2);

        let chain = pool.chain();
        unsafe {
            assert_eq!(Block::owner_of(a), chain[0]);
            assert_eq!(Block::owner_of(c), chain[1]);
        }
        assert_eq!(pool.current(), Some(chain[1]));
    }

    #[test]
    fn earlier_blocks_are_not_searched_for_space() {
        let mut pool = RegionPool::new(nz!(128), 0);

        let a = pool.alloc(40).unwrap();
        let _b = pool.alloc(40).unwrap();
        let _c = pool.alloc(100).unwrap();
        assert_eq!(pool.block_count(), 2);

        // The first block now has space freed, but we still never carve from it again.
        unsafe { pool.free(a) };
        assert_eq!(pool.block_count(), 2);

        _ = pool.alloc(40).unwrap();
        assert_eq!(pool.block_count(), 3);
        pool.integrity_check();
    }

    #[test]
    fn pointers_are_word_aligned_and_disjoint() {
        let mut pool = RegionPool::new(nz!(256), 0);

        let sizes = [1_usize, 7, 20, 245, 3, 0, 64, 200, 13, 256, 31];
        let items: Vec<_> = sizes.iter().map(|&size| (pool.alloc(size).unwrap(), size)).collect();

        for &(item, _) in &items {
            assert_eq!(item.as_ptr().addr() % WORD_ALIGNMENT, 0);
        }

        let mut ranges: Vec<_> = items
            .iter()
            .map(|&(item, size)| (item.as_ptr().addr(), item.as_ptr().addr() + size))
            .collect();
        ranges.sort_unstable();

        for pair in ranges.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "overlapping allocations {pair:?}");
        }

        pool.integrity_check();
    }

    #[test]
    fn owner_is_recovered_after_unrelated_frees() {
        let mut pool = RegionPool::new(nz!(64), 0);

        let items: Vec<_> = (0..10).map(|_| pool.alloc(40).unwrap()).collect();
        let owners: Vec<_> = items.iter().map(|&item| unsafe { Block::owner_of(item) }).collect();

        // Free every other allocation; each block held exactly one, so those blocks vanish.
        for item in items.iter().step_by(2) {
            unsafe { pool.free(*item) };
        }

        pool.integrity_check();
        assert_eq!(pool.block_count(), 5);

        for (index, item) in items.iter().enumerate().skip(1).step_by(2) {
            assert_eq!(unsafe { Block::owner_of(*item) }, owners[index]);
        }
    }

    #[test]
    fn drop_with_no_live_items_does_not_panic_if_policy_must_not_drop() {
        let mut pool = RegionPool::builder()
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        let item = pool.alloc(100).unwrap();
        unsafe { pool.free(item) };

        drop(pool);
    }

    #[test]
    #[should_panic]
    fn drop_with_live_items_panics_if_policy_must_not_drop() {
        let mut pool = RegionPool::builder()
            .drop_policy(DropPolicy::MustNotDropItems)
            .build();

        _ = pool.alloc(100).unwrap();

        drop(pool);
    }

    #[test]
    fn drop_with_live_items_is_fine_by_default() {
        let mut pool = RegionPool::new(nz!(64), 0);

        _ = pool.alloc(60).unwrap();
        _ = pool.alloc(60).unwrap();
        _ = pool.alloc(60).unwrap();

        drop(pool);
    }

    #[test]
    #[should_panic]
    fn destroy_overrides_drop_policy() {
        let mut pool = RegionPool::new(nz!(64), 0);

        _ = pool.alloc(10).unwrap();

        pool.destroy(DropPolicy::MustNotDropItems);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn free_from_different_pool_panics_in_debug() {
        let mut pool1 = RegionPool::new(nz!(64), 0);
        let mut pool2 = RegionPool::new(nz!(64), 0);

        let item = pool1.alloc(8).unwrap();

        // We also allocate in pool2 so there is something to free in there.
        _ = pool2.alloc(8).unwrap();

        unsafe { pool2.free(item) };
    }

    #[test]
    fn pool_ids_are_unique() {
        let pool1 = RegionPool::new(nz!(64), 0);
        let pool2 = RegionPool::new(nz!(64), 0);

        assert_ne!(pool1.pool_id, pool2.pool_id);
    }

    #[test]
    fn max_size_is_not_enforced() {
        let mut pool = RegionPool::new(nz!(64), 1);

        // Far more than max_size in total, yet every allocation succeeds.
        let items: Vec<_> = (0..8).map(|_| pool.alloc(64).unwrap()).collect();
        assert_eq!(items.len(), 8);
        assert_eq!(pool.max_size(), 1);
    }

    #[test]
    fn pool_can_move_between_threads() {
        let mut pool = RegionPool::new(nz!(64), 0);
        _ = pool.alloc(16).unwrap();

        let handle = thread::spawn(move || {
            let item = pool.alloc(16).unwrap();
            unsafe { pool.free(item) };
            pool
        });

        let pool = handle.join().expect("thread completed successfully");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.block_count(), 1);
        pool.integrity_check();
    }
}
