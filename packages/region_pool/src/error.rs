use thiserror::Error;

/// Errors that can occur when allocating from a [`RegionPool`][crate::RegionPool].
#[derive(Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The requested size is larger than any block of the pool can ever hold.
    ///
    /// A single allocation is never spread across multiple blocks, so retrying the same
    /// request on the same pool will fail again.
    #[error("cannot allocate {requested} bytes from a pool with a block size of {block_size} bytes")]
    AllocationExhausted {
        /// The number of bytes the caller asked for.
        requested: usize,

        /// The capacity of each block in the pool.
        block_size: usize,
    },

    /// The global allocator could not provide the backing buffer for a new block.
    #[error("failed to acquire a backing buffer for a block of {capacity} bytes")]
    BackingAllocationFailed {
        /// The declared capacity of the block that could not be created.
        capacity: usize,
    },
}

/// A specialized `Result` type for region pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn allocation_exhausted_mentions_sizes() {
        let error = Error::AllocationExhausted {
            requested: 100,
            block_size: 64,
        };

        let message = error.to_string();
        assert!(message.contains("100"));
        assert!(message.contains("64"));
    }

    #[test]
    fn backing_allocation_failed_mentions_capacity() {
        let error = Error::BackingAllocationFailed { capacity: 4096 };

        let result: Result<()> = Err(error);
        let message = result.unwrap_err().to_string();
        assert!(message.contains("4096"));
    }
}
