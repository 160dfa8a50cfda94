/// Determines how outstanding allocations are treated when a pool or block is destroyed.
///
/// By default, the pool releases its blocks even if allocations carved from them were never freed.
///
/// # Examples
///
/// ```
/// use region_pool::{DropPolicy, RegionPool};
///
/// // The drop policy is set at pool creation time.
/// let pool = RegionPool::builder()
///     .drop_policy(DropPolicy::MustNotDropItems)
///     .build();
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum DropPolicy {
    /// Blocks are released when the pool is dropped, even if they still have live
    /// allocations. Any pointers into them become dangling. This is the default.
    #[default]
    MayDropItems,

    /// The pool will panic if any block still has live allocations when it is destroyed.
    ///
    /// This is the leak check used by tests and verification harnesses that expect every
    /// allocation to have been returned via [`RegionPool::free()`][crate::RegionPool::free].
    MustNotDropItems,
}
