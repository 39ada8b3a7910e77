//! A growable array and two open-addressing hash maps.
//!
//! - [`Array`] — a contiguous growable sequence with front/back/middle mutators.
//! - [`FlatMap`] — power-of-two buckets, linear probing within a bucket.
//! - [`RobinHoodMap`] — a single flat table with Robin Hood displacement.
//!
//! All three share the same allocator contract ([`alloc_hooks::Allocator`])
//! and slot-state tag ([`slot::SlotState`]), and are generic over the
//! backing allocator (default [`alloc_hooks::Global`]).

pub mod alloc_hooks;
pub mod array;
pub mod error;
pub mod flatmap;
pub mod hash;
pub mod rhmap;
pub mod slot;
pub mod util;

pub use alloc_hooks::{Allocator, Global};
pub use array::Array;
pub use error::{AddError, AllocatorHook, Error};
pub use flatmap::{ErasurePolicy, FlatMap, Tombstone, Zeroing};
pub use hash::{AHashBuilder, DefaultHashBuilder};
pub use rhmap::RobinHoodMap;
pub use slot::SlotState;

/// Shared round-trip/idempotence/miss properties exercised against both
/// [`FlatMap`] and [`RobinHoodMap`]: `$map` is the container's type path,
/// `$buckets` the method reading its current bucket/capacity count (used to
/// check that `remove`-then-reinsert leaves sizing untouched).
#[cfg(test)]
#[macro_export]
macro_rules! generate_map_tests {
    ($map:ident, $buckets:ident) => {
        #[test]
        fn drop_empty_map() {
            let _ = $map::<String, String>::new();
        }

        #[test]
        fn insert_then_get_round_trip() {
            let mut map = $map::new();
            for i in 0..1000 {
                map.insert(i, i).unwrap();
            }
            assert_eq!(map.len(), 1000);
            for i in 0..1000 {
                assert_eq!(map.get(&i), Some(&i));
            }
        }

        #[test]
        fn insert_twice_overwrites_value_not_size() {
            let mut map = $map::new();
            map.insert(1, "first").unwrap();
            assert_eq!(map.len(), 1);
            map.insert(1, "second").unwrap();
            assert_eq!(map.len(), 1);
            assert_eq!(map.get(&1), Some(&"second"));
        }

        #[test]
        fn add_twice_rejects_second_and_keeps_first() {
            let mut map = $map::new();
            map.add(1, "first").unwrap();
            let err = map.add(1, "second").unwrap_err();
            assert_eq!(err, $crate::AddError::AlreadyExists("second"));
            assert_eq!(map.get(&1), Some(&"first"));
            assert_eq!(map.len(), 1);
        }

        #[test]
        fn remove_then_get_misses() {
            let mut map = $map::new();
            map.insert(1, 10).unwrap();
            assert_eq!(map.remove(&1), Some(10));
            assert_eq!(map.get(&1), None);
            assert_eq!(map.len(), 0);
        }

        #[test]
        fn insert_nontrivial_drop() {
            let mut map = $map::new();
            for i in 0..1000 {
                map.insert(i.to_string(), i.to_string()).unwrap();
            }
            assert_eq!(map.len(), 1000);
        }

        #[test]
        fn miss_after_many_inserts() {
            let mut map = $map::new();
            for i in 0..1000 {
                map.insert(i, i).unwrap();
            }
            for i in 1000..2000 {
                assert!(map.get(&i).is_none());
            }
            assert_eq!(map.len(), 1000);
        }

        #[test]
        fn remove_and_reinsert_all() {
            let mut map = $map::new();
            let range = 0..1000;
            for i in range.clone() {
                map.insert(i, i).unwrap();
            }
            assert_eq!(map.len(), 1000);

            let buckets_before = map.$buckets();
            for i in range.clone() {
                assert_eq!(map.remove(&i), Some(i));
            }
            assert_eq!(map.len(), 0);
            assert_eq!(buckets_before, map.$buckets());

            for i in range {
                map.insert(i, i).unwrap();
            }
            assert_eq!(map.len(), 1000);
        }

        #[test]
        fn arbitrary_insertion_order_preserves_all_pairs() {
            let mut order: Vec<i32> = (0..500).collect();
            // A fixed, non-trivial permutation rather than a sequential
            // run, so insertion order isn't bucket/home-aligned.
            order.rotate_left(173);
            let mut map = $map::new();
            for &k in &order {
                map.insert(k, k * 2).unwrap();
            }
            assert_eq!(map.len(), 500);
            for k in 0..500 {
                assert_eq!(map.get(&k), Some(&(k * 2)));
            }
        }
    };
}
