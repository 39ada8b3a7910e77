//! The slot-state tag shared by `FlatMap` and `RobinHoodMap`.
//!
//! `Empty` is assigned discriminant `0` deliberately: both maps allocate
//! their slot-state arrays via `Allocator::allocate_zeroed`, and a zeroed
//! byte must already be a valid `Empty` tag without any further
//! initialization pass over the array.

/// Per-slot occupancy tag.
///
/// `Occupied` vs. `Collided` matters only to `FlatMap` (a bucket's slot 0
/// is `Occupied`, anything linear-probed past it is `Collided`); it's
/// informational only and doesn't affect lookup or deletion correctness.
/// `Deleted` (a tombstone) exists only under `FlatMap`'s tombstone erasure
/// policy — `RobinHoodMap` never produces it, since backward-shift deletion
/// is incompatible with tombstones.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty = 0,
    Occupied = 1,
    Collided = 2,
    Deleted = 3,
}

impl SlotState {
    #[inline]
    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }

    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Occupied | Self::Collided)
    }

    #[inline]
    pub fn is_deleted(self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Available to claim for a fresh insertion: either never occupied, or a
    /// reclaimable tombstone.
    #[inline]
    pub fn is_available(self) -> bool {
        matches!(self, Self::Empty | Self::Deleted)
    }
}
