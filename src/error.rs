//! Status outcomes surfaced by fallible operations.
//!
//! Programmer errors (out-of-range indices, zero buckets, an out-of-range
//! load factor) are never part of this enum — they are `assert!` failures,
//! per the reference design's error taxonomy.

use core::fmt;

/// One of the six allocator hooks a container's [`crate::alloc_hooks::Allocator`]
/// must provide. Used only to report a configuration error for that hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorHook {
    Allocate,
    AllocateZeroed,
    Reallocate,
    Deallocate,
    Fill,
    Relocate,
}

impl fmt::Display for AllocatorHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Allocate => "allocate",
            Self::AllocateZeroed => "allocate_zeroed",
            Self::Reallocate => "reallocate",
            Self::Deallocate => "deallocate",
            Self::Fill => "fill",
            Self::Relocate => "relocate",
        };
        f.write_str(name)
    }
}

/// Status returned by fallible operations on [`crate::Array`], [`crate::FlatMap`],
/// and [`crate::RobinHoodMap`].
///
/// `NOT_FOUND`/`ALREADY_EXISTS` from the reference design are expressed as
/// `Option`/`Result<Option<_>, _>` return types on the individual operations
/// rather than as variants here, since the reference design's own design
/// notes call for signalling absence structurally rather than through a
/// catch-all status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A backing-store (re)allocation failed.
    OutOfMemory,
    /// The requested capacity would overflow `usize`.
    CapacityOverflow,
    /// The configured allocator is missing or misbehaving for the named hook.
    Allocator(AllocatorHook),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => f.write_str("allocation failed"),
            Self::CapacityOverflow => f.write_str("requested capacity overflows usize"),
            Self::Allocator(hook) => write!(f, "allocator hook `{hook}` failed"),
        }
    }
}

impl std::error::Error for Error {}

/// Outcome of `add` on [`crate::FlatMap`]/[`crate::RobinHoodMap`]: unlike
/// `insert`, `add` never overwrites an existing key, so a rejected value
/// needs somewhere to go back to the caller instead of being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddError<V> {
    /// The key was already present; `value` is the value that was rejected
    /// (the map is unchanged, the existing value is left in place).
    AlreadyExists(V),
    /// Growing the backing storage failed.
    Failed(Error),
}
