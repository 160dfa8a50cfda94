#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A region-based memory pool for many short-lived, variable-size allocations.
//!
//! This crate provides [`RegionPool`], which carves allocations out of large backing blocks
//! instead of asking the global allocator for each one individually. A block is handed back
//! to the global allocator in one step once every allocation carved from it has been freed.
//!
//! # Key Features
//!
//! - **Bump allocation**: Each request is served by advancing a cursor in the current block
//! - **Constant-time free**: A small header in front of every allocation leads straight back
//!   to the owning block, with no lookup table and no search
//! - **Whole-block reclamation**: Blocks are released as soon as their live count drops to zero
//! - **Word alignment**: Every returned pointer is aligned to the platform word size
//! - **Leak checking**: [`DropPolicy::MustNotDropItems`] turns forgotten allocations into a panic
//! - **Thread mobility**: The pool can be moved between threads (but not shared without
//!   synchronization)
//!
//! The pool does not resize, compact or reuse freed space within a block. Allocations larger
//! than the configured block size are rejected.
//!
//! # Example
//!
//! ```rust
//! use new_zealand::nz;
//! use region_pool::{DropPolicy, RegionPool};
//!
//! let mut pool = RegionPool::builder()
//!     .block_size(nz!(4096))
//!     .drop_policy(DropPolicy::MustNotDropItems)
//!     .build();
//!
//! let name = pool.alloc(20).unwrap();
//! let payload = pool.alloc(245).unwrap();
//! let flags = pool.alloc(3).unwrap();
//!
//! // All three fit into the first block.
//! assert_eq!(pool.block_count(), 1);
//!
//! // SAFETY: Every pointer came from this pool and is freed exactly once.
//! unsafe {
//!     pool.free(payload);
//!     pool.free(flags);
//!     pool.free(name);
//! }
//!
//! // The block was released together with its last allocation.
//! assert_eq!(pool.block_count(), 0);
//! ```
//!
//! # Errors
//!
//! Allocation failures are reported as [`Error`] values. Misuse such as freeing a pointer
//! twice or freeing it in the wrong pool is a violation of the safety contract of
//! [`RegionPool::free()`], caught by assertions only in debug builds.

mod block;
mod builder;
mod drop_policy;
mod error;
mod header;
mod pool;

pub(crate) use block::*;
pub use builder::*;
pub use drop_policy::*;
pub use error::Error;
pub(crate) use error::Result;
pub use pool::RegionPool;
pub(crate) use pool::DEFAULT_BLOCK_SIZE;
