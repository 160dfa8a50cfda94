//! Raw layout of a block buffer and the metadata embedded in it.
//!
//! ```text
//! buffer
//! |
//! v
//! +--------------+--------+---------+-----+--------+---------+-----+---------+
//! | back-pointer | header | item... | pad | header | item... | ... | (free)  |
//! +--------------+--------+---------+-----+--------+---------+-----+---------+
//!                ^                                                           ^
//!                alloc_start                                                 endp
//! ```
//!
//! Every header holds the byte offset from `alloc_start` to the header itself. The
//! back-pointer slot holds the address of the block that owns the buffer. Together they
//! allow any returned pointer to be traced back to its block with two reads.

use std::alloc::Layout;
use std::ptr::NonNull;

/// Every header starts on this boundary, so every returned pointer does as well.
pub(crate) const WORD_ALIGNMENT: usize = align_of::<usize>();

/// Size of the offset header stored in front of every allocation.
pub(crate) const HEADER_SIZE: usize = size_of::<usize>();

/// Size of the slot at the start of the buffer that holds the owning block's address.
pub(crate) const BACK_POINTER_SIZE: usize = size_of::<NonNull<u8>>();

// `alloc_start` sits right after the back-pointer slot and must itself be word-aligned,
// otherwise offsets and addresses would disagree about alignment.
const _: () = assert!(BACK_POINTER_SIZE % WORD_ALIGNMENT == 0);
const _: () = assert!(HEADER_SIZE % WORD_ALIGNMENT == 0);

/// Rounds `offset` up to the next multiple of `align`, which must be a power of two.
///
/// Returns `None` if the result does not fit in `usize`.
#[must_use]
pub(crate) const fn align_up(offset: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());

    let mask = align.wrapping_sub(1);

    match offset.checked_add(mask) {
        Some(bumped) => Some(bumped & !mask),
        None => None,
    }
}

/// The memory layout of a buffer able to hold `capacity` bytes in one allocation.
///
/// The buffer holds the back-pointer slot, one header and `capacity` bytes, so a fresh
/// block can always satisfy a single request for its full capacity.
///
/// Returns `None` if the total size overflows or is not a valid layout size.
#[must_use]
pub(crate) fn buffer_layout(capacity: usize) -> Option<Layout> {
    let size = capacity
        .checked_add(HEADER_SIZE)?
        .checked_add(BACK_POINTER_SIZE)?;

    Layout::from_size_align(size, WORD_ALIGNMENT).ok()
}

/// Stores `offset` in the header at `header`.
///
/// # Safety
///
/// `header` must be valid for writes of `HEADER_SIZE` bytes.
pub(crate) unsafe fn write_offset(header: NonNull<u8>, offset: usize) {
    // SAFETY: Forwarding guarantees from the caller. Unaligned write so the encoding does
    // not depend on the caller having aligned the header, even though we always do.
    unsafe {
        header.cast::<usize>().write_unaligned(offset);
    }
}

/// Returns the address of the header preceding `item` and the offset stored in it.
///
/// # Safety
///
/// `item` must have been returned by a carve from a block that has not yet been destroyed.
#[must_use]
pub(crate) unsafe fn read_offset(item: NonNull<u8>) -> (NonNull<u8>, usize) {
    // SAFETY: Every carved item is preceded by a header inside the same buffer.
    let header = unsafe { item.byte_sub(HEADER_SIZE) };

    // SAFETY: The header was written by `write_offset()` when the item was carved.
    let offset = unsafe { header.cast::<usize>().read_unaligned() };

    (header, offset)
}

/// Stores the address of the owning block in the back-pointer slot at the start of `buffer`.
///
/// # Safety
///
/// `buffer` must be valid for writes of `BACK_POINTER_SIZE` bytes.
pub(crate) unsafe fn write_back_pointer<T>(buffer: NonNull<u8>, owner: NonNull<T>) {
    // SAFETY: Forwarding guarantees from the caller.
    unsafe {
        buffer.cast::<NonNull<T>>().write_unaligned(owner);
    }
}

/// Reads the owner address from the back-pointer slot immediately preceding `alloc_start`.
///
/// # Safety
///
/// `alloc_start` must point just past a back-pointer slot written by `write_back_pointer::<T>()`.
#[must_use]
pub(crate) unsafe fn read_back_pointer<T>(alloc_start: NonNull<u8>) -> NonNull<T> {
    // SAFETY: The back-pointer slot directly precedes `alloc_start` in the same buffer.
    let slot = unsafe { alloc_start.byte_sub(BACK_POINTER_SIZE) };

    // SAFETY: Forwarding guarantees from the caller.
    unsafe { slot.cast::<NonNull<T>>().read_unaligned() }
}

/// Recovers the owner of the buffer that `item` was carved from.
///
/// This is pure pointer arithmetic: the header gives us `alloc_start`, the slot in front
/// of `alloc_start` gives us the owner.
///
/// # Safety
///
/// `item` must have been returned by a carve from a buffer whose back-pointer slot was
/// written with `write_back_pointer::<T>()`, and the buffer must not have been released.
#[must_use]
pub(crate) unsafe fn decode_owner<T>(item: NonNull<u8>) -> NonNull<T> {
    // SAFETY: Forwarding guarantees from the caller.
    let (header, offset) = unsafe { read_offset(item) };

    // SAFETY: The offset was measured from `alloc_start` to this header, so stepping back
    // by it lands on `alloc_start` of the same buffer.
    let alloc_start = unsafe { header.byte_sub(offset) };

    // SAFETY: Forwarding guarantees from the caller.
    unsafe { read_back_pointer::<T>(alloc_start) }
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

    #[test]
    fn align_up_rounds_to_boundary() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(7, 8), Some(8));
        assert_eq!(align_up(8, 8), Some(8));
        assert_eq!(align_up(9, 8), Some(16));
        assert_eq!(align_up(13, 4), Some(16));
        assert_eq!(align_up(13, 1), Some(13));
    }

    #[test]
    fn align_up_overflow_is_none() {
        assert_eq!(align_up(usize::MAX, 8), None);
        assert_eq!(align_up(usize::MAX, 1), Some(usize::MAX));
    }

    #[test]
    fn buffer_layout_reserves_header_and_back_pointer() {
        let layout = buffer_layout(100).unwrap();

        assert_eq!(layout.size(), 100 + HEADER_SIZE + BACK_POINTER_SIZE);
        assert_eq!(layout.align(), WORD_ALIGNMENT);
    }

    #[test]
    fn buffer_layout_overflow_is_none() {
        assert!(buffer_layout(usize::MAX).is_none());
        assert!(buffer_layout(usize::MAX - HEADER_SIZE).is_none());
    }

    #[test]
    fn owner_is_recovered_from_item() {
        let mut owner = 0xABCD_u32;
        let owner_ptr = NonNull::from(&mut owner);

        // Room for a back-pointer, two headers and some item bytes.
        let mut storage = [0_usize; 8];
        let buffer = NonNull::from(&mut storage).cast::<u8>();

        unsafe {
            write_back_pointer(buffer, owner_ptr);

            let alloc_start = buffer.byte_add(BACK_POINTER_SIZE);

            // First item: header at offset 0.
            write_offset(alloc_start, 0);
            let first_item = alloc_start.byte_add(HEADER_SIZE);

            // Second item: header two words further in.
            let second_header_offset = HEADER_SIZE * 2;
            write_offset(alloc_start.byte_add(second_header_offset), second_header_offset);
            let second_item = alloc_start.byte_add(second_header_offset + HEADER_SIZE);

            assert_eq!(read_offset(first_item).1, 0);
            assert_eq!(read_offset(second_item).1, second_header_offset);

            assert_eq!(decode_owner::<u32>(first_item), owner_ptr);
            assert_eq!(decode_owner::<u32>(second_item), owner_ptr);
            assert_eq!(*decode_owner::<u32>(second_item).as_ref(), 0xABCD);
        }
    }
}
