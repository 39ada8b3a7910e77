//! `FLATMAP<K, V>` — a bucketed open-addressing map.
//!
//! The backing storage is `num_buckets` fixed-width buckets of
//! `bucket_max = log2(num_buckets)` slots each; a key's home bucket is
//! `hash(key) & slot_mask`, and a lookup only ever linear-probes within that
//! one bucket. An entry is never displaced into a different bucket — growth
//! is what keeps buckets from overflowing.

use std::alloc::Layout;
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::alloc_hooks::{Allocator, Global};
use crate::error::{AddError, Error};
use crate::hash::{make_hash, DefaultHashBuilder};
use crate::slot::SlotState;
use crate::util::{fast_rem, log2_floor, next_power_of_two};

const DEFAULT_NUM_BUCKETS: usize = 8;
const DEFAULT_LOAD_FACTOR: u8 = 70;

fn debug_fill_byte() -> u8 {
    if cfg!(debug_assertions) {
        0x45
    } else {
        0x00
    }
}

fn info_layout(capacity: usize) -> Result<Layout, Error> {
    Layout::array::<SlotState>(capacity).map_err(|_| Error::CapacityOverflow)
}

fn nodes_layout<K, V>(capacity: usize) -> Result<Layout, Error> {
    Layout::array::<(K, V)>(capacity).map_err(|_| Error::CapacityOverflow)
}

/// Scan a bucket (`bucket_base .. bucket_base + bucket_max`) for the first
/// slot tagged `Empty`, without reference to any erasure policy. Used during
/// rehash, where the destination bucket is always freshly zeroed.
unsafe fn probe_open_raw(info: *const SlotState, bucket_base: usize, bucket_max: usize) -> Option<usize> {
    for offset in 0..bucket_max {
        let idx = bucket_base + offset;
        // SAFETY: forwarded from caller; `idx` stays within the bucket.
        if unsafe { (*info.add(idx)).is_empty() } {
            return Some(idx);
        }
    }
    None
}

/// The erasure discipline a `FlatMap` is configured with. Exactly one policy
/// applies per monomorphization — they are mutually exclusive, per the
/// reference design.
pub trait ErasurePolicy {
    /// Whether `Deleted` tombstones are produced by `remove`/`erase` and
    /// recognized by probing.
    const TOMBSTONES: bool;
}

/// Default policy: `remove` compacts the bucket by swapping in its last live
/// slot and zeroing the freed tail slot. Probes terminate on `Empty`.
pub struct Zeroing;
impl ErasurePolicy for Zeroing {
    const TOMBSTONES: bool = false;
}

/// `remove` tags the slot `Deleted` without moving anything. Probes continue
/// past `Deleted` and may reclaim it on insert.
pub struct Tombstone;
impl ErasurePolicy for Tombstone {
    const TOMBSTONES: bool = true;
}

enum ProbeKey {
    Found(usize),
    NotFound(usize),
    Full,
}

/// A bucketed open-addressing hash map.
pub struct FlatMap<K, V, S = DefaultHashBuilder, P = Zeroing, A = Global>
where
    P: ErasurePolicy,
    A: Allocator + Clone,
{
    hasher: S,
    allocator: A,
    n_items: usize,
    num_buckets: usize,
    bucket_max: usize,
    load_factor: u8,
    /// SAFETY: `info`/`nodes` each point to `num_buckets * bucket_max`
    /// slots; `nodes[i]` is initialized iff `info[i]` is `Occupied` or
    /// `Collided`.
    info: NonNull<SlotState>,
    nodes: NonNull<MaybeUninit<(K, V)>>,
    _policy: PhantomData<P>,
}

unsafe impl<K: Send, V: Send, S: Send, P: ErasurePolicy, A: Allocator + Clone + Send> Send
    for FlatMap<K, V, S, P, A>
{
}
unsafe impl<K: Sync, V: Sync, S: Sync, P: ErasurePolicy, A: Allocator + Clone + Sync> Sync
    for FlatMap<K, V, S, P, A>
{
}

impl<K, V, S, P, A> FlatMap<K, V, S, P, A>
where
    S: BuildHasher + Default,
    P: ErasurePolicy,
    A: Allocator + Clone + Default,
{
    pub fn new() -> Self {
        Self::with_capacity_and_load_factor(DEFAULT_NUM_BUCKETS, DEFAULT_LOAD_FACTOR)
            .expect("default construction never fails")
    }

    pub fn with_capacity(num_buckets: usize) -> Result<Self, Error> {
        Self::with_capacity_and_load_factor(num_buckets, DEFAULT_LOAD_FACTOR)
    }

    pub fn with_capacity_and_load_factor(num_buckets: usize, load_factor: u8) -> Result<Self, Error> {
        Self::with_capacity_and_load_factor_in(num_buckets, load_factor, S::default(), A::default())
    }
}

impl<K, V, S, P, A> Default for FlatMap<K, V, S, P, A>
where
    S: BuildHasher + Default,
    P: ErasurePolicy,
    A: Allocator + Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, P, A> FlatMap<K, V, S, P, A>
where
    S: BuildHasher,
    P: ErasurePolicy,
    A: Allocator + Clone,
{
    pub fn with_capacity_and_load_factor_in(
        num_buckets: usize,
        load_factor: u8,
        hasher: S,
        allocator: A,
    ) -> Result<Self, Error> {
        debug_assert!(
            (1..=100).contains(&load_factor),
            "load_factor must be in [1, 100], got {load_factor}"
        );
        let num_buckets = next_power_of_two(num_buckets);
        let bucket_max = log2_floor(num_buckets) as usize;
        let capacity = num_buckets * bucket_max;

        let info = allocator.allocate_zeroed(info_layout(capacity)?)?.cast();
        let nodes = allocator.allocate(nodes_layout::<K, V>(capacity)?)?.cast();

        Ok(Self {
            hasher,
            allocator,
            n_items: 0,
            num_buckets,
            bucket_max,
            load_factor,
            info,
            nodes,
            _policy: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.n_items
    }

    pub fn is_empty(&self) -> bool {
        self.n_items == 0
    }

    pub fn num_buckets(&self) -> usize {
        self.num_buckets
    }

    pub fn bucket_max(&self) -> usize {
        self.bucket_max
    }

    pub fn capacity(&self) -> usize {
        self.num_buckets * self.bucket_max
    }

    pub fn load_max(&self) -> usize {
        (self.capacity() * self.load_factor as usize) / 100
    }

    fn home_bucket<Q>(&self, key: &Q) -> usize
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + ?Sized,
    {
        fast_rem(make_hash(&self.hasher, key) as usize, self.num_buckets)
    }

    /// Bucket-local linear probe for `key`, per the reference design's
    /// `probe_key` primitive.
    fn probe_key<Q>(&self, bucket_base: usize, key: &Q) -> ProbeKey
    where
        K: std::borrow::Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        let mut reclaimable: Option<usize> = None;
        for offset in 0..self.bucket_max {
            let idx = bucket_base + offset;
            // SAFETY: `idx` stays within `[0, capacity())`.
            let state = unsafe { *self.info.as_ptr().add(idx) };
            match state {
                SlotState::Empty => {
                    return ProbeKey::NotFound(reclaimable.unwrap_or(idx));
                }
                SlotState::Deleted if P::TOMBSTONES => {
                    if reclaimable.is_none() {
                        reclaimable = Some(idx);
                    }
                }
                SlotState::Occupied | SlotState::Collided => {
                    // SAFETY: this slot is live per the invariant above.
                    let (kk, _) = unsafe { (*self.nodes.as_ptr().add(idx)).assume_init_ref() };
                    if kk.borrow() == key {
                        return ProbeKey::Found(idx);
                    }
                }
                SlotState::Deleted => {}
            }
        }
        match reclaimable {
            Some(idx) => ProbeKey::NotFound(idx),
            None => ProbeKey::Full,
        }
    }

    fn place_new(&mut self, idx: usize, bucket_base: usize, key: K, value: V) {
        let tag = if idx == bucket_base {
            SlotState::Occupied
        } else {
            SlotState::Collided
        };
        // SAFETY: `idx` was returned by `probe_key`/`probe_open_raw` as an
        // available slot in this bucket.
        unsafe {
            *self.info.as_ptr().add(idx) = tag;
            (*self.nodes.as_ptr().add(idx)).write((key, value));
        }
        self.n_items += 1;
    }

    fn probe_for_insert<Q>(&mut self, key: &Q) -> Result<ProbeKey, Error>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + PartialEq + ?Sized,
    {
        if self.n_items >= self.load_max() {
            self.grow()?;
        }
        loop {
            let bucket = self.home_bucket(key);
            let bucket_base = bucket * self.bucket_max;
            match self.probe_key(bucket_base, key) {
                ProbeKey::Full => self.grow()?,
                other => return Ok(other),
            }
        }
    }
}

impl<K, V, S, P, A> FlatMap<K, V, S, P, A>
where
    K: PartialEq + Eq + Hash,
    S: BuildHasher,
    P: ErasurePolicy,
    A: Allocator + Clone,
{
    /// Insert `key`/`value` only if `key` is absent. Returns the rejected
    /// `value` if `key` was already present, leaving the map unchanged.
    pub fn add(&mut self, key: K, value: V) -> Result<(), AddError<V>> {
        let probe = self.probe_for_insert(&key).map_err(AddError::Failed)?;
        match probe {
            ProbeKey::Found(_) => Err(AddError::AlreadyExists(value)),
            ProbeKey::NotFound(idx) => {
                let bucket_base = self.home_bucket(&key) * self.bucket_max;
                self.place_new(idx, bucket_base, key, value);
                Ok(())
            }
            ProbeKey::Full => unreachable!("probe_for_insert always grows past a full bucket"),
        }
    }

    /// Insert `key`/`value`, overwriting any existing value. Returns the
    /// previous value, if any.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, Error> {
        match self.probe_for_insert(&key)? {
            ProbeKey::Found(idx) => {
                // SAFETY: `Found` implies a live `(K, V)` at `idx`.
                let (_, vv) = unsafe { (*self.nodes.as_ptr().add(idx)).assume_init_mut() };
                Ok(Some(std::mem::replace(vv, value)))
            }
            ProbeKey::NotFound(idx) => {
                let bucket_base = self.home_bucket(&key) * self.bucket_max;
                self.place_new(idx, bucket_base, key, value);
                Ok(None)
            }
            ProbeKey::Full => unreachable!("probe_for_insert always grows past a full bucket"),
        }
    }

    fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + PartialEq + ?Sized,
    {
        let bucket_base = self.home_bucket(key) * self.bucket_max;
        match self.probe_key(bucket_base, key) {
            ProbeKey::Found(idx) => Some(idx),
            _ => None,
        }
    }

    /// Preferred lookup: `None` on a miss, rather than a zero-filled value.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + PartialEq + ?Sized,
    {
        let idx = self.find(key)?;
        // SAFETY: `find` only returns indices of live slots.
        let (_, v) = unsafe { (*self.nodes.as_ptr().add(idx)).assume_init_ref() };
        Some(v)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + PartialEq + ?Sized,
    {
        let idx = self.find(key)?;
        // SAFETY: `find` only returns indices of live slots.
        let (_, v) = unsafe { (*self.nodes.as_ptr().add(idx)).assume_init_mut() };
        Some(v)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + PartialEq + ?Sized,
    {
        self.find(key).is_some()
    }

    /// The reference design's literal `get`: a zero-filled value on miss.
    /// This is a footgun whenever `V::default()` is a valid stored value —
    /// prefer [`Self::get`].
    pub fn get_or_default<Q>(&self, key: &Q) -> V
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + PartialEq + ?Sized,
        V: Default + Clone,
    {
        self.get(key).cloned().unwrap_or_default()
    }

    fn last_live_slot_in_bucket(&self, bucket_base: usize) -> usize {
        let mut last = bucket_base;
        for offset in 0..self.bucket_max {
            let idx = bucket_base + offset;
            // SAFETY: `idx` stays within `[0, capacity())`.
            let state = unsafe { *self.info.as_ptr().add(idx) };
            if state.is_live() {
                last = idx;
            } else {
                break;
            }
        }
        last
    }

    /// Remove `key`, returning its value if present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + PartialEq + ?Sized,
    {
        let bucket_base = self.home_bucket(key) * self.bucket_max;
        let idx = match self.probe_key(bucket_base, key) {
            ProbeKey::Found(idx) => idx,
            _ => return None,
        };

        if P::TOMBSTONES {
            // SAFETY: `idx` is a live slot per `ProbeKey::Found`.
            let (_, v) = unsafe { std::ptr::read(self.nodes.as_ptr().add(idx)).assume_init() };
            // SAFETY: `idx` stays within `[0, capacity())`.
            unsafe { *self.info.as_ptr().add(idx) = SlotState::Deleted };
            self.n_items -= 1;
            Some(v)
        } else {
            let last_live = self.last_live_slot_in_bucket(bucket_base);
            // SAFETY: `idx` is a live slot per `ProbeKey::Found`.
            let (_, removed_value) =
                unsafe { std::ptr::read(self.nodes.as_ptr().add(idx)).assume_init() };
            if last_live != idx {
                // SAFETY: `last_live` and `idx` are distinct live slots within
                // `[0, capacity())`; routed through the allocator's `relocate`
                // hook per the reference design's allocator contract.
                unsafe {
                    self.allocator.relocate(
                        NonNull::new_unchecked(self.nodes.as_ptr().add(last_live).cast::<u8>()),
                        NonNull::new_unchecked(self.nodes.as_ptr().add(idx).cast::<u8>()),
                        std::mem::size_of::<(K, V)>(),
                    );
                }
            }
            // SAFETY: `last_live` stays within `[0, capacity())`; its node
            // storage was just vacated (either it was `idx` itself, or its
            // contents were just moved into `idx` above).
            unsafe {
                *self.info.as_ptr().add(last_live) = SlotState::Empty;
                let byte_ptr = self.nodes.as_ptr().add(last_live).cast::<u8>();
                self.allocator.fill(
                    NonNull::new_unchecked(byte_ptr),
                    std::mem::size_of::<(K, V)>(),
                    debug_fill_byte(),
                );
            }
            self.n_items -= 1;
            Some(removed_value)
        }
    }

    /// Remove `key`, discarding its value. Returns whether a value was removed.
    pub fn erase<Q>(&mut self, key: &Q) -> bool
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + PartialEq + ?Sized,
    {
        self.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        if std::mem::needs_drop::<(K, V)>() {
            for idx in 0..self.capacity() {
                // SAFETY: `idx` stays within `[0, capacity())`.
                let state = unsafe { *self.info.as_ptr().add(idx) };
                if state.is_live() {
                    // SAFETY: live slots hold an initialized `(K, V)`.
                    unsafe { std::ptr::drop_in_place((*self.nodes.as_ptr().add(idx)).as_mut_ptr()) };
                }
            }
        }
        // SAFETY: `Empty` is discriminant 0; zeroing the whole array is
        // equivalent to writing `Empty` to every slot.
        unsafe { std::ptr::write_bytes(self.info.as_ptr(), 0u8, self.capacity()) };
        self.n_items = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        (0..self.capacity()).filter_map(move |idx| {
            // SAFETY: `idx` stays within `[0, capacity())`.
            let state = unsafe { *self.info.as_ptr().add(idx) };
            if state.is_live() {
                // SAFETY: live slots hold an initialized `(K, V)`.
                let (k, v) = unsafe { (*self.nodes.as_ptr().add(idx)).assume_init_ref() };
                Some((k, v))
            } else {
                None
            }
        })
    }

    /// No ordering guarantee across mutations, same as [`Self::iter`].
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut V)> {
        let info = self.info;
        let nodes = self.nodes;
        (0..self.capacity()).filter_map(move |idx| {
            // SAFETY: `idx` stays within `[0, capacity())`.
            let state = unsafe { *info.as_ptr().add(idx) };
            if state.is_live() {
                // SAFETY: live slots hold an initialized `(K, V)`; each
                // `idx` is visited once, so the `&mut V` aliases nothing.
                let (k, v) = unsafe { (*nodes.as_ptr().add(idx)).assume_init_mut() };
                Some((&*k, v))
            } else {
                None
            }
        })
    }

    /// Grow the map so it can hold `additional` more entries without a
    /// further grow, if it can't already.
    pub fn reserve(&mut self, additional: usize) -> Result<(), Error> {
        while self.load_max().saturating_sub(self.n_items) < additional {
            self.grow()?;
        }
        Ok(())
    }

    /// Double `num_buckets` and rehash every live entry, growing further if
    /// the new bucket count still can't fit every entry in its home bucket
    /// (a pathological-hash edge case, exercised so that two consecutive
    /// grows both happen when one isn't enough).
    fn grow(&mut self) -> Result<(), Error> {
        let old_capacity = self.capacity();
        let old_info = self.info;
        let old_nodes = self.nodes;

        let mut drained: Vec<(K, V)> = Vec::with_capacity(self.n_items);
        for idx in 0..old_capacity {
            // SAFETY: `idx` stays within `[0, old_capacity)`.
            let state = unsafe { *old_info.as_ptr().add(idx) };
            if state.is_live() {
                // SAFETY: live slots hold an initialized `(K, V)`.
                let kv = unsafe { std::ptr::read(old_nodes.as_ptr().add(idx)).assume_init() };
                drained.push(kv);
            }
        }
        if old_capacity > 0 {
            // SAFETY: `old_info`/`old_nodes` were allocated from
            // `self.allocator` with these layouts.
            unsafe {
                self.allocator.deallocate(old_info.cast(), info_layout(old_capacity)?);
                self.allocator
                    .deallocate(old_nodes.cast(), nodes_layout::<K, V>(old_capacity)?);
            }
        }

        let mut new_num_buckets = self.num_buckets * 2;
        let (new_bucket_max, homes) = loop {
            let bucket_max = log2_floor(new_num_buckets) as usize;
            let mut occupancy = vec![0usize; new_num_buckets];
            let mut homes = Vec::with_capacity(drained.len());
            let mut fits = true;
            for (k, _) in &drained {
                let bucket = fast_rem(make_hash(&self.hasher, k) as usize, new_num_buckets);
                occupancy[bucket] += 1;
                if occupancy[bucket] > bucket_max {
                    fits = false;
                    break;
                }
                homes.push(bucket);
            }
            if fits {
                break (bucket_max, homes);
            }
            new_num_buckets *= 2;
        };

        let new_capacity = new_num_buckets * new_bucket_max;
        let new_info = self.allocator.allocate_zeroed(info_layout(new_capacity)?)?.cast();
        let new_nodes = self
            .allocator
            .allocate(nodes_layout::<K, V>(new_capacity)?)?
            .cast();

        self.info = new_info;
        self.nodes = new_nodes;
        self.num_buckets = new_num_buckets;
        self.bucket_max = new_bucket_max;
        self.n_items = 0;

        for (bucket, (k, v)) in homes.into_iter().zip(drained) {
            let bucket_base = bucket * new_bucket_max;
            // SAFETY: the dry run above proved this bucket has room.
            let idx = unsafe { probe_open_raw(self.info.as_ptr(), bucket_base, new_bucket_max) }
                .expect("dry run above guaranteed room in this bucket");
            self.place_new(idx, bucket_base, k, v);
        }
        Ok(())
    }
}

impl<K, V, S, P, A> Clone for FlatMap<K, V, S, P, A>
where
    K: Clone + PartialEq + Eq + Hash,
    V: Clone,
    S: BuildHasher + Clone,
    P: ErasurePolicy,
    A: Allocator + Clone,
{
    fn clone(&self) -> Self {
        let capacity = self.capacity();
        let info = self
            .allocator
            .allocate_zeroed(info_layout(capacity).expect("capacity was already valid"))
            .expect("clone: allocation failed")
            .cast();
        let nodes = self
            .allocator
            .allocate(nodes_layout::<K, V>(capacity).expect("capacity was already valid"))
            .expect("clone: allocation failed")
            .cast();

        let mut other = Self {
            hasher: self.hasher.clone(),
            allocator: self.allocator.clone(),
            n_items: 0,
            num_buckets: self.num_buckets,
            bucket_max: self.bucket_max,
            load_factor: self.load_factor,
            info,
            nodes,
            _policy: PhantomData,
        };

        for idx in 0..capacity {
            // SAFETY: `idx` stays within `[0, capacity())`.
            let state = unsafe { *self.info.as_ptr().add(idx) };
            if state.is_live() {
                // SAFETY: live slots hold an initialized `(K, V)`.
                let (k, v) = unsafe { (*self.nodes.as_ptr().add(idx)).assume_init_ref() };
                // SAFETY: `idx` is the same slot in both tables, which share
                // layout, so writing it directly preserves bucket locality.
                unsafe {
                    *other.info.as_ptr().add(idx) = state;
                    (*other.nodes.as_ptr().add(idx)).write((k.clone(), v.clone()));
                }
                other.n_items += 1;
            }
        }
        other
    }
}

impl<K, V, S, P, A> Drop for FlatMap<K, V, S, P, A>
where
    P: ErasurePolicy,
    A: Allocator + Clone,
{
    fn drop(&mut self) {
        if std::mem::needs_drop::<(K, V)>() {
            for idx in 0..self.capacity() {
                // SAFETY: `idx` stays within `[0, capacity())`.
                let state = unsafe { *self.info.as_ptr().add(idx) };
                if state.is_live() {
                    // SAFETY: live slots hold an initialized `(K, V)`.
                    unsafe { std::ptr::drop_in_place((*self.nodes.as_ptr().add(idx)).as_mut_ptr()) };
                }
            }
        }
        let capacity = self.capacity();
        if capacity > 0 {
            if let (Ok(il), Ok(nl)) = (info_layout(capacity), nodes_layout::<K, V>(capacity)) {
                // SAFETY: `self.info`/`self.nodes` were allocated from
                // `self.allocator` with these layouts.
                unsafe {
                    self.allocator.deallocate(self.info.cast(), il);
                    self.allocator.deallocate(self.nodes.cast(), nl);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_default() -> FlatMap<i32, i32> {
        FlatMap::new()
    }

    #[test]
    fn default_sizing_matches_scenario_defaults() {
        let map = new_default();
        assert_eq!(map.num_buckets(), 8);
        assert_eq!(map.bucket_max(), 3);
        assert_eq!(map.capacity(), 24);
        assert_eq!(map.load_max(), 16);
    }

    #[test]
    fn add_get_remove_round_trip() {
        let mut map = new_default();
        map.add(1, 10).unwrap();
        assert_eq!(map.get(&1), Some(&10));
        assert_eq!(map.remove(&1), Some(10));
        assert_eq!(map.get(&1), None);
    }

    #[test]
    fn insert_overwrites_and_keeps_size() {
        let mut map = new_default();
        assert_eq!(map.insert(1, 10).unwrap(), None);
        assert_eq!(map.insert(1, 20).unwrap(), Some(10));
        assert_eq!(map.get(&1), Some(&20));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn add_existing_key_rejects_without_modifying() {
        let mut map = new_default();
        map.add(1, 10).unwrap();
        match map.add(1, 20) {
            Err(AddError::AlreadyExists(20)) => {}
            other => panic!("expected AlreadyExists(20), got {other:?}"),
        }
        assert_eq!(map.get(&1), Some(&10));
    }

    #[test]
    fn scenario_1_places_key_at_flat_index_3() {
        // spec.md §8 scenario 1: 1952805748 & 7 == 1, bucket_max == 3, so
        // the home bucket is 1 and the flat index is 1 * 3 == 3.
        let mut map: FlatMap<i32, i32> = FlatMap::new();
        map.add(1952805748, 1).unwrap();
        assert_eq!(map.len(), 1);
        let idx = map.find(&1952805748).unwrap();
        assert_eq!(idx, 3);
    }

    #[test]
    fn grow_on_bucket_overflow_finds_all_four_keys() {
        // Four keys that collide into the same bucket of a tiny table
        // (num_buckets = 2 initially) force a bucket-overflow grow rather
        // than a load-factor grow.
        let mut map: FlatMap<u64, u64, DefaultHashBuilder> = FlatMap::with_capacity(2).unwrap();
        let mut inserted = Vec::new();
        let mut candidate = 0u64;
        while inserted.len() < 4 {
            let bucket = map.home_bucket(&candidate);
            if bucket == 0 {
                map.insert(candidate, candidate).unwrap();
                inserted.push(candidate);
            }
            candidate += 1;
        }
        for key in inserted {
            assert_eq!(map.get(&key), Some(&key));
        }
    }

    #[test]
    fn grow_on_load_factor_reaches_size_17() {
        let mut map: FlatMap<i32, i32> = FlatMap::new();
        for i in 0..16 {
            map.add(i, i).unwrap();
        }
        assert_eq!(map.len(), 16);
        assert_eq!(map.num_buckets(), 8);
        map.add(16, 16).unwrap();
        assert_eq!(map.len(), 17);
        assert_eq!(map.num_buckets(), 16);
        assert_eq!(map.load_max(), 44);
    }

    #[test]
    fn zeroing_erase_compacts_bucket() {
        let mut map: FlatMap<u64, u64, DefaultHashBuilder, Zeroing> = FlatMap::with_capacity(2).unwrap();
        let mut same_bucket = Vec::new();
        let mut candidate = 0u64;
        while same_bucket.len() < 3 {
            if map.home_bucket(&candidate) == 0 {
                same_bucket.push(candidate);
            }
            candidate += 1;
        }
        for &k in &same_bucket {
            map.add(k, k * 10).unwrap();
        }
        let middle = same_bucket[1];
        let last = same_bucket[2];
        assert_eq!(map.remove(&middle), Some(middle * 10));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&same_bucket[0]), Some(&(same_bucket[0] * 10)));
        assert_eq!(map.get(&last), Some(&(last * 10)));
    }

    #[test]
    fn tombstone_policy_reclaims_deleted_slots() {
        let mut map: FlatMap<i32, i32, DefaultHashBuilder, Tombstone> = FlatMap::new();
        map.add(1, 1).unwrap();
        assert_eq!(map.remove(&1), Some(1));
        assert_eq!(map.get(&1), None);
        map.add(1, 2).unwrap();
        assert_eq!(map.get(&1), Some(&2));
    }

    #[test]
    fn bucket_locality_invariant_holds_after_many_inserts() {
        let mut map: FlatMap<i32, i32> = FlatMap::new();
        for i in 0..500 {
            map.insert(i, i).unwrap();
        }
        for idx in 0..map.capacity() {
            // SAFETY: test-only direct inspection of the invariant.
            let state = unsafe { *map.info.as_ptr().add(idx) };
            if state.is_live() {
                let (k, _) = unsafe { (*map.nodes.as_ptr().add(idx)).assume_init_ref() };
                let expected_bucket = map.home_bucket(k);
                assert_eq!(idx / map.bucket_max(), expected_bucket);
            }
        }
    }

    #[test]
    fn clear_resets_size_and_drops_values() {
        use std::rc::Rc;
        let counter = Rc::new(());
        let mut map: FlatMap<i32, Rc<()>> = FlatMap::new();
        for i in 0..5 {
            map.insert(i, counter.clone()).unwrap();
        }
        assert_eq!(Rc::strong_count(&counter), 6);
        map.clear();
        assert_eq!(map.len(), 0);
        assert_eq!(Rc::strong_count(&counter), 1);
    }

    #[test]
    fn clone_is_independent() {
        let mut map: FlatMap<i32, i32> = FlatMap::new();
        map.insert(1, 1).unwrap();
        let mut other = map.clone();
        other.insert(2, 2).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(other.len(), 2);
    }

    #[test]
    fn miss_after_many_inserts() {
        let mut map: FlatMap<i32, i32> = FlatMap::new();
        for i in 0..1000 {
            map.insert(i, i).unwrap();
        }
        for i in 1000..2000 {
            assert!(map.get(&i).is_none());
        }
        assert_eq!(map.len(), 1000);
    }

    #[test]
    fn remove_and_reinsert_keeps_bucket_count() {
        let mut map: FlatMap<i32, i32> = FlatMap::new();
        for i in 0..1000 {
            map.insert(i, i).unwrap();
        }
        let buckets = map.num_buckets();
        for i in 0..1000 {
            assert_eq!(map.remove(&i), Some(i));
        }
        assert_eq!(map.len(), 0);
        assert_eq!(buckets, map.num_buckets());
    }
}
