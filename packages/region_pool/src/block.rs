use std::alloc::{Layout, alloc, dealloc};
use std::ptr::NonNull;
use std::thread;

use tracing::{debug, trace};

use crate::header::{self, BACK_POINTER_SIZE, HEADER_SIZE, WORD_ALIGNMENT};
use crate::{DropPolicy, Error, Result};

/// One contiguous backing buffer that allocations are carved from with a bump cursor.
///
/// A block is always heap-allocated and addressed via `NonNull<Block>` because its address is
/// written into the first slot of its own buffer. This is what lets [`Block::release()`] find
/// the block from nothing but a pointer to one of its allocations.
///
/// The cursors are byte offsets from the start of the buffer and always satisfy
/// `alloc_start <= last <= endp`.
#[derive(Debug)]
pub(crate) struct Block {
    /// ID of the pool that created this block. This does not imply ownership of any kind,
    /// it only lets the pool detect pointers that belong to a different pool.
    owner: u64,

    /// Exclusively owned raw buffer, released when the block is destroyed.
    buffer: NonNull<u8>,
    buffer_layout: Layout,

    /// Where the carvable region begins, just past the back-pointer slot.
    alloc_start: usize,

    /// Bump cursor. Everything before it has been handed out or is alignment padding.
    last: usize,

    /// End of the buffer.
    endp: usize,

    /// The capacity requested when the block was created.
    capacity: usize,

    /// Number of carved allocations that have not yet been released.
    live: usize,

    /// Next block in the pool's chain.
    next: Option<NonNull<Self>>,
}

impl Block {
    /// Creates a block able to hold at least one allocation of `capacity` bytes.
    ///
    /// The returned block is not linked into any chain. It must eventually be passed
    /// to [`Block::destroy()`].
    pub(crate) fn create(owner: u64, capacity: usize) -> Result<NonNull<Self>> {
        let buffer_layout = header::buffer_layout(capacity)
            .ok_or(Error::BackingAllocationFailed { capacity })?;

        // SAFETY: The layout always has a non-zero size because it includes the header
        // and the back-pointer slot.
        let buffer = NonNull::new(unsafe { alloc(buffer_layout) })
            .ok_or(Error::BackingAllocationFailed { capacity })?;

        let alloc_start = BACK_POINTER_SIZE;

        let block = Box::new(Self {
            owner,
            buffer,
            buffer_layout,
            alloc_start,
            last: alloc_start,
            // Matches buffer_layout.size(), which is known not to overflow.
            endp: alloc_start.wrapping_add(capacity).wrapping_add(HEADER_SIZE),
            capacity,
            live: 0,
            next: None,
        });

        let block = NonNull::from(Box::leak(block));

        // SAFETY: The buffer is at least BACK_POINTER_SIZE bytes long and we own it.
        unsafe {
            header::write_back_pointer(buffer, block);
        }

        debug!(pool_id = owner, capacity, "created block");

        Ok(block)
    }

    /// Releases the block and its buffer.
    ///
    /// With [`DropPolicy::MustNotDropItems`], panics if the block still has live allocations.
    /// The memory is released before the check is made.
    ///
    /// # Safety
    ///
    /// `block` must have been returned by [`Block::create()`], must not be linked into any
    /// chain and must not be used again after this call.
    pub(crate) unsafe fn destroy(block: NonNull<Self>, drop_policy: DropPolicy) {
        // SAFETY: The caller guarantees we are the last user of this block, which was
        // created from a Box in create().
        let block = unsafe { Box::from_raw(block.as_ptr()) };

        let live = block.live;
        let owner = block.owner;
        let capacity = block.capacity;

        drop(block);

        debug!(pool_id = owner, capacity, live, "destroyed block");

        // If we are already panicking, we do not want to panic again because that will
        // simply obscure whatever the original panic was, leading to debug difficulties.
        if !thread::panicking() && matches!(drop_policy, DropPolicy::MustNotDropItems) {
            assert!(
                live == 0,
                "destroyed a block with {live} live allocations - this is forbidden by DropPolicy::MustNotDropItems"
            );
        }
    }

    /// Number of bytes a single allocation may request from the current bump position.
    ///
    /// Accounts for aligning the cursor to the word boundary and for the header that
    /// precedes every allocation.
    #[must_use]
    pub(crate) fn remaining(&self) -> usize {
        header::align_up(self.last, WORD_ALIGNMENT)
            .and_then(|aligned| self.endp.checked_sub(aligned))
            .and_then(|available| available.checked_sub(HEADER_SIZE))
            .unwrap_or(0)
    }

    /// Carves `size` bytes from the block, returning a word-aligned pointer to them.
    ///
    /// Returns `None` if the request does not fit. The block is not modified in that case.
    #[must_use]
    pub(crate) fn carve(&mut self, size: usize) -> Option<NonNull<u8>> {
        if size > self.remaining() {
            return None;
        }

        // Nothing is mutated until the whole allocation is known to fit.
        let header_at = header::align_up(self.last, WORD_ALIGNMENT)?;
        let item_at = header_at.checked_add(HEADER_SIZE)?;
        let new_last = item_at.checked_add(size)?;

        if new_last > self.endp {
            return None;
        }

        // Cannot underflow because alloc_start <= last <= header_at.
        let offset = header_at.wrapping_sub(self.alloc_start);

        // SAFETY: header_at + HEADER_SIZE <= endp, so the header is inside the buffer.
        let header_ptr = unsafe { self.buffer.byte_add(header_at) };

        // SAFETY: See above, the header slot is in bounds and owned by us.
        unsafe {
            header::write_offset(header_ptr, offset);
        }

        // SAFETY: item_at <= endp, so this is in bounds or one past the end of the buffer.
        let item = unsafe { self.buffer.byte_add(item_at) };

        self.last = new_last;

        // Cannot overflow because every live allocation occupies at least one header.
        self.live = self.live.wrapping_add(1);

        trace!(pool_id = self.owner, size, offset, live = self.live, "carved");

        Some(item)
    }

    /// Finds the block that carved `item` without consulting any chain.
    ///
    /// # Safety
    ///
    /// `item` must have been returned by [`Block::carve()`] on a block that has not been destroyed.
    #[must_use]
    pub(crate) unsafe fn owner_of(item: NonNull<u8>) -> NonNull<Self> {
        // SAFETY: Forwarding guarantees from the caller. Every buffer starts with a
        // back-pointer to its block, written in create().
        unsafe { header::decode_owner::<Self>(item) }
    }

    /// Marks `item` as no longer in use and returns the block it was carved from.
    ///
    /// In debug builds, panics if the block has no live allocations left to release.
    ///
    /// # Safety
    ///
    /// `item` must have been returned by [`Block::carve()`] on a block that has not been
    /// destroyed, and must not have been released already.
    pub(crate) unsafe fn release(item: NonNull<u8>) -> NonNull<Self> {
        // SAFETY: Forwarding guarantees from the caller.
        let mut block = unsafe { Self::owner_of(item) };

        // SAFETY: The block is alive per the caller's guarantees and nobody else holds a
        // reference to it while we are in here.
        let block_ref = unsafe { block.as_mut() };

        debug_assert!(
            block_ref.live > 0,
            "released an allocation from a block with no live allocations - double free?"
        );

        block_ref.live = block_ref.live.wrapping_sub(1);

        trace!(pool_id = block_ref.owner, live = block_ref.live, "released");

        block
    }

    #[cfg(any(test, debug_assertions))]
    #[must_use]
    pub(crate) fn owner(&self) -> u64 {
        self.owner
    }

    #[cfg(test)]
    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of allocations carved from this block that have not yet been released.
    #[must_use]
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    #[must_use]
    pub(crate) fn next(&self) -> Option<NonNull<Self>> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: Option<NonNull<Self>>) {
        self.next = next;
    }

    /// Whether `item` points into the carvable region of this block.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn contains(&self, item: NonNull<u8>) -> bool {
        let start = self.buffer.as_ptr().addr().wrapping_add(self.alloc_start);
        let end = self.buffer.as_ptr().addr().wrapping_add(self.endp);

        (start..=end).contains(&item.as_ptr().addr())
    }

    #[cfg_attr(test, mutants::skip)] // This is essentially test logic, mutation is meaningless.
    #[cfg(test)]
    pub(crate) fn integrity_check(&self, expected_owner: u64) {
        assert_eq!(
            self.owner, expected_owner,
            "block owned by pool {} found in the chain of pool {expected_owner}",
            self.owner
        );

        assert!(
            self.alloc_start <= self.last && self.last <= self.endp,
            "block cursors out of order: alloc_start {} last {} endp {}",
            self.alloc_start,
            self.last,
            self.endp
        );

        assert_eq!(
            self.endp,
            self.buffer_layout.size(),
            "block end does not match the size of its buffer"
        );
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: We allocated the buffer with this layout in create() and nobody
        // else releases it.
        unsafe {
            dealloc(self.buffer.as_ptr(), self.buffer_layout);
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use super::*;

    fn create(capacity: usize) -> NonNull<Block> {
        Block::create(1, capacity).unwrap()
    }

    #[test]
    fn fresh_block_holds_full_capacity() {
        let mut block = create(64);
        let block_ref = unsafe { block.as_mut() };

        assert_eq!(block_ref.remaining(), 64);
        assert_eq!(block_ref.capacity(), 64);
        assert_eq!(block_ref.live(), 0);

        let item = block_ref.carve(64).unwrap();
        assert!(block_ref.contains(item));
        assert_eq!(block_ref.remaining(), 0);
        assert_eq!(block_ref.live(), 1);

        assert!(block_ref.carve(1).is_none());

        unsafe {
            _ = Block::release(item);
            Block::destroy(block, DropPolicy::MustNotDropItems);
        }
    }

    #[test]
    fn carved_items_are_word_aligned() {
        let mut block = create(4096);
        let block_ref = unsafe { block.as_mut() };

        for size in [1, 3, 7, 20, 245, 0, 9] {
            let item = block_ref.carve(size).unwrap();
            assert_eq!(item.as_ptr().addr() % WORD_ALIGNMENT, 0);
        }

        assert_eq!(block_ref.live(), 7);

        unsafe {
            Block::destroy(block, DropPolicy::MayDropItems);
        }
    }

    #[test]
    fn remaining_accounts_for_padding_and_header() {
        let mut block = create(64);
        let block_ref = unsafe { block.as_mut() };

        _ = block_ref.carve(3).unwrap();

        // 3 bytes used + padding to the next word, plus a header for the first and next item.
        let used = align_up_word(HEADER_SIZE + 3);
        assert_eq!(block_ref.remaining(), 64 + HEADER_SIZE - used - HEADER_SIZE);

        unsafe {
            Block::destroy(block, DropPolicy::MayDropItems);
        }
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let mut block = create(64);
        let block_ref = unsafe { block.as_mut() };

        // Leaves fewer than HEADER_SIZE bytes after alignment.
        _ = block_ref.carve(60).unwrap();
        assert_eq!(block_ref.remaining(), 0);
        assert!(block_ref.carve(0).is_none());

        unsafe {
            Block::destroy(block, DropPolicy::MayDropItems);
        }
    }

    #[test]
    fn failed_carve_leaves_block_unchanged() {
        let mut block = create(32);
        let block_ref = unsafe { block.as_mut() };

        _ = block_ref.carve(5).unwrap();
        let last_before = block_ref.last;
        let remaining_before = block_ref.remaining();

        assert!(block_ref.carve(remaining_before + 1).is_none());

        assert_eq!(block_ref.last, last_before);
        assert_eq!(block_ref.remaining(), remaining_before);
        assert_eq!(block_ref.live(), 1);

        unsafe {
            Block::destroy(block, DropPolicy::MayDropItems);
        }
    }

    #[test]
    fn release_recovers_owning_block() {
        let mut first = create(128);
        let mut second = create(128);

        let a = unsafe { first.as_mut() }.carve(10).unwrap();
        let b = unsafe { second.as_mut() }.carve(17).unwrap();
        let c = unsafe { first.as_mut() }.carve(33).unwrap();

        unsafe {
            assert_eq!(Block::owner_of(a), first);
            assert_eq!(Block::owner_of(b), second);
            assert_eq!(Block::owner_of(c), first);

            assert_eq!(Block::release(c), first);
            assert_eq!(first.as_ref().live(), 1);
            assert_eq!(second.as_ref().live(), 1);

            assert_eq!(Block::release(b), second);
            assert_eq!(second.as_ref().live(), 0);

            assert_eq!(Block::release(a), first);
            assert_eq!(first.as_ref().live(), 0);

            Block::destroy(first, DropPolicy::MustNotDropItems);
            Block::destroy(second, DropPolicy::MustNotDropItems);
        }
    }

    #[test]
    fn items_do_not_overlap() {
        let mut block = create(512);
        let block_ref = unsafe { block.as_mut() };

        let sizes = [20_usize, 245, 3, 17, 64];
        let items: Vec<_> = sizes
            .iter()
            .map(|&size| (block_ref.carve(size).unwrap(), size))
            .collect();

        for (index, &(item, size)) in items.iter().enumerate() {
            unsafe {
                item.as_ptr().write_bytes(u8::try_from(index).unwrap(), size);
            }
        }

        for (index, &(item, size)) in items.iter().enumerate() {
            let bytes = unsafe { std::slice::from_raw_parts(item.as_ptr(), size) };
            assert!(bytes.iter().all(|&b| usize::from(b) == index));
        }

        // Headers survived the writes, so every item still decodes to this block.
        for &(item, _) in &items {
            assert_eq!(unsafe { Block::owner_of(item) }, block);
        }

        unsafe {
            Block::destroy(block, DropPolicy::MayDropItems);
        }
    }

    #[test]
    fn never_carved_block_destroys_cleanly_when_leaks_forbidden() {
        let block = create(4096);

        unsafe {
            Block::destroy(block, DropPolicy::MustNotDropItems);
        }
    }

    #[test]
    #[should_panic]
    fn destroy_with_live_items_panics_when_leaks_forbidden() {
        let mut block = create(64);
        _ = unsafe { block.as_mut() }.carve(8).unwrap();

        unsafe {
            Block::destroy(block, DropPolicy::MustNotDropItems);
        }
    }

    #[test]
    fn create_with_overflowing_capacity_fails() {
        let result = Block::create(1, usize::MAX);

        assert_eq!(
            result.unwrap_err(),
            Error::BackingAllocationFailed {
                capacity: usize::MAX
            }
        );
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn release_below_zero_panics_in_debug() {
        let mut block = create(64);
        let item = unsafe { block.as_mut() }.carve(8).unwrap();

        unsafe {
            _ = Block::release(item);
            // The block is still alive (never destroyed), so this only trips the live check.
            _ = Block::release(item);
        }
    }

    fn align_up_word(value: usize) -> usize {
        header::align_up(value, WORD_ALIGNMENT).unwrap()
    }
}
