//! `RHMAP<K, V>` — a single flat table using Robin Hood displacement.
//!
//! Unlike `FlatMap`, an entry is not pinned to its home bucket: insertion
//! walks forward from `home`, displacing any resident whose probe sequence
//! length (`psl`) is shorter than the candidate's, so that no key ever sits
//! further from its home than necessary relative to its neighbors. The
//! array is padded by `max_psl` slots so a probe starting anywhere in
//! `[0, capacity)` can read `home + psl` without wrapping.

use std::alloc::Layout;
use std::hash::{BuildHasher, Hash};
use std::mem::MaybeUninit;
use std::ptr::NonNull;

use crate::alloc_hooks::{Allocator, Global};
use crate::error::{AddError, Error};
use crate::hash::{make_hash, DefaultHashBuilder};
use crate::slot::SlotState;
use crate::util::{fast_rem, log2_floor, next_power_of_two};

const DEFAULT_CAPACITY: usize = 16;
const DEFAULT_LOAD_FACTOR: u8 = 70;

fn debug_fill_byte() -> u8 {
    if cfg!(debug_assertions) {
        0x45
    } else {
        0x00
    }
}

fn max_psl_for(capacity: usize) -> usize {
    2 * log2_floor(capacity) as usize
}

fn info_layout(len: usize) -> Result<Layout, Error> {
    Layout::array::<SlotState>(len).map_err(|_| Error::CapacityOverflow)
}

fn psl_layout(len: usize) -> Result<Layout, Error> {
    Layout::array::<u32>(len).map_err(|_| Error::CapacityOverflow)
}

fn nodes_layout<K, V>(len: usize) -> Result<Layout, Error> {
    Layout::array::<(K, V)>(len).map_err(|_| Error::CapacityOverflow)
}

enum ProbeKey {
    Found(usize),
    /// Key absent; insertion should start its displacement walk at `home`.
    NotFound,
}

/// A single-table Robin Hood hash map.
///
/// Deliberately does not offer a tombstone erasure policy: backward-shift
/// deletion (§4.3) is incompatible with tombstones, so this map always
/// shrinks its probe chains physically on removal.
pub struct RobinHoodMap<K, V, S = DefaultHashBuilder, A = Global>
where
    A: Allocator + Clone,
{
    hasher: S,
    allocator: A,
    n_items: usize,
    capacity: usize,
    max_psl: usize,
    load_factor: u8,
    /// SAFETY: `info`/`psl`/`nodes` each point to `capacity + max_psl`
    /// slots; `nodes[i]` is initialized iff `info[i] == Occupied`. Padding
    /// slots (index `>= capacity`) are always `Empty` and never a home.
    info: NonNull<SlotState>,
    psl: NonNull<u32>,
    nodes: NonNull<MaybeUninit<(K, V)>>,
}

unsafe impl<K: Send, V: Send, S: Send, A: Allocator + Clone + Send> Send for RobinHoodMap<K, V, S, A> {}
unsafe impl<K: Sync, V: Sync, S: Sync, A: Allocator + Clone + Sync> Sync for RobinHoodMap<K, V, S, A> {}

impl<K, V, S, A> RobinHoodMap<K, V, S, A>
where
    S: BuildHasher + Default,
    A: Allocator + Clone + Default,
{
    pub fn new() -> Self {
        Self::with_capacity_and_load_factor(DEFAULT_CAPACITY, DEFAULT_LOAD_FACTOR)
            .expect("default construction never fails")
    }

    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        Self::with_capacity_and_load_factor(capacity, DEFAULT_LOAD_FACTOR)
    }

    pub fn with_capacity_and_load_factor(capacity: usize, load_factor: u8) -> Result<Self, Error> {
        Self::with_capacity_and_load_factor_in(capacity, load_factor, S::default(), A::default())
    }
}

impl<K, V, S, A> Default for RobinHoodMap<K, V, S, A>
where
    S: BuildHasher + Default,
    A: Allocator + Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, A> RobinHoodMap<K, V, S, A>
where
    S: BuildHasher,
    A: Allocator + Clone,
{
    pub fn with_capacity_and_load_factor_in(
        capacity: usize,
        load_factor: u8,
        hasher: S,
        allocator: A,
    ) -> Result<Self, Error> {
        debug_assert!(
            (1..=100).contains(&load_factor),
            "load_factor must be in [1, 100], got {load_factor}"
        );
        let capacity = next_power_of_two(capacity);
        let max_psl = max_psl_for(capacity);
        let len = capacity + max_psl;

        let info = allocator.allocate_zeroed(info_layout(len)?)?.cast();
        let psl = allocator.allocate_zeroed(psl_layout(len)?)?.cast();
        let nodes = allocator.allocate(nodes_layout::<K, V>(len)?)?.cast();

        Ok(Self {
            hasher,
            allocator,
            n_items: 0,
            capacity,
            max_psl,
            load_factor,
            info,
            psl,
            nodes,
        })
    }

    pub fn len(&self) -> usize {
        self.n_items
    }

    pub fn is_empty(&self) -> bool {
        self.n_items == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_psl(&self) -> usize {
        self.max_psl
    }

    pub fn load_max(&self) -> usize {
        (self.capacity * self.load_factor as usize) / 100
    }

    fn len_with_padding(&self) -> usize {
        self.capacity + self.max_psl
    }

    fn home<Q>(&self, key: &Q) -> usize
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + ?Sized,
    {
        fast_rem(make_hash(&self.hasher, key) as usize, self.capacity)
    }

    fn probe_key<Q>(&self, home: usize, key: &Q) -> ProbeKey
    where
        K: std::borrow::Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        for step in 0..self.max_psl {
            let idx = home + step;
            // SAFETY: `idx < home + max_psl <= capacity - 1 + max_psl`,
            // within the padded array.
            let state = unsafe { *self.info.as_ptr().add(idx) };
            if state.is_empty() {
                return ProbeKey::NotFound;
            }
            // SAFETY: padding slots are always `Empty`; a live slot here
            // means `idx` is within the node storage.
            let resident_psl = unsafe { *self.psl.as_ptr().add(idx) } as usize;
            if resident_psl < step {
                // Robin-Hood invariant: if `key` were present it would have
                // displaced this resident by now.
                return ProbeKey::NotFound;
            }
            // SAFETY: slot is live.
            let (kk, _) = unsafe { (*self.nodes.as_ptr().add(idx)).assume_init_ref() };
            if kk.borrow() == key {
                return ProbeKey::Found(idx);
            }
        }
        ProbeKey::NotFound
    }

    /// Walk forward from `home`, displacing residents with a shorter `psl`
    /// than the candidate, per §4.3's insertion algorithm. Returns `Ok(())`
    /// once the candidate (or its final displaced form) lands in an `Empty`
    /// slot, or `Err(())` if `max_psl` was exhausted and a grow is needed.
    fn place(&mut self, home: usize, mut key: K, mut value: V) -> Result<(), (K, V)> {
        let mut candidate_psl: u32 = 0;
        let mut idx = home;
        loop {
            // SAFETY: `idx` stays within the padded array for the duration
            // of this walk, bounded by the `max_psl` check below.
            let state = unsafe { *self.info.as_ptr().add(idx) };
            if state.is_empty() {
                // SAFETY: `idx` designates an empty, writable slot.
                unsafe {
                    *self.info.as_ptr().add(idx) = SlotState::Occupied;
                    *self.psl.as_ptr().add(idx) = candidate_psl;
                    (*self.nodes.as_ptr().add(idx)).write((key, value));
                }
                self.n_items += 1;
                return Ok(());
            }
            // SAFETY: slot is live.
            let resident_psl = unsafe { *self.psl.as_ptr().add(idx) };
            if resident_psl < candidate_psl {
                // SAFETY: slot is live; swap candidate with the resident and
                // keep walking with the displaced resident as the new candidate.
                unsafe {
                    let resident = std::ptr::read(self.nodes.as_ptr().add(idx)).assume_init();
                    (*self.nodes.as_ptr().add(idx)).write((key, value));
                    *self.psl.as_ptr().add(idx) = candidate_psl;
                    key = resident.0;
                    value = resident.1;
                }
                candidate_psl = resident_psl;
            }
            candidate_psl += 1;
            idx += 1;
            if candidate_psl as usize >= self.max_psl {
                return Err((key, value));
            }
        }
    }
}

impl<K, V, S, A> RobinHoodMap<K, V, S, A>
where
    K: PartialEq + Eq + Hash,
    S: BuildHasher,
    A: Allocator + Clone,
{
    /// Insert `key`/`value` only if `key` is absent. Returns the rejected
    /// `value` if `key` was already present.
    pub fn add(&mut self, key: K, value: V) -> Result<(), AddError<V>> {
        if self.n_items >= self.load_max() {
            self.grow().map_err(AddError::Failed)?;
        }
        let home = self.home(&key);
        if let ProbeKey::Found(_) = self.probe_key(home, &key) {
            return Err(AddError::AlreadyExists(value));
        }
        let mut key = key;
        let mut value = value;
        loop {
            let home = self.home(&key);
            match self.place(home, key, value) {
                Ok(()) => return Ok(()),
                Err((k, v)) => {
                    self.grow().map_err(AddError::Failed)?;
                    key = k;
                    value = v;
                }
            }
        }
    }

    /// Insert `key`/`value`, overwriting any existing value. Returns the
    /// previous value, if any.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, Error> {
        if self.n_items >= self.load_max() {
            self.grow()?;
        }
        let home = self.home(&key);
        if let ProbeKey::Found(idx) = self.probe_key(home, &key) {
            // SAFETY: `Found` implies a live `(K, V)` at `idx`.
            let (_, vv) = unsafe { (*self.nodes.as_ptr().add(idx)).assume_init_mut() };
            return Ok(Some(std::mem::replace(vv, value)));
        }
        let mut key = key;
        let mut value = value;
        loop {
            let home = self.home(&key);
            match self.place(home, key, value) {
                Ok(()) => return Ok(None),
                Err((k, v)) => {
                    self.grow()?;
                    key = k;
                    value = v;
                }
            }
        }
    }

    fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + PartialEq + ?Sized,
    {
        let home = self.home(key);
        match self.probe_key(home, key) {
            ProbeKey::Found(idx) => Some(idx),
            ProbeKey::NotFound => None,
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

    /// Remove `key`, returning its value if present. Backward-shift
    /// deletion: each subsequent slot with a nonzero `psl` moves back one
    /// slot, decrementing its `psl`, until an `Empty` slot or a `psl == 0`
    /// resident (a different key's home) is reached.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Hash + PartialEq + ?Sized,
    {
        let home = self.home(key);
        let idx = match self.probe_key(home, key) {
            ProbeKey::Found(idx) => idx,
            ProbeKey::NotFound => return None,
        };

        // SAFETY: `idx` is a live slot per `ProbeKey::Found`.
        let (_, removed_value) = unsafe { std::ptr::read(self.nodes.as_ptr().add(idx)).assume_init() };

        let mut hole = idx;
        loop {
            let next = hole + 1;
            if next >= self.len_with_padding() {
                break;
            }
            // SAFETY: `next` stays within the padded array.
            let state = unsafe { *self.info.as_ptr().add(next) };
            if !state.is_live() {
                break;
            }
            // SAFETY: slot is live.
            let next_psl = unsafe { *self.psl.as_ptr().add(next) };
            if next_psl == 0 {
                break;
            }
            // SAFETY: `next` and `hole` are distinct live/vacated slots;
            // move it back one slot and shrink its `psl` by one to reflect
            // the shorter distance from home, routed through the allocator's
            // `relocate` hook per the reference design's allocator contract.
            unsafe {
                self.allocator.relocate(
                    NonNull::new_unchecked(self.nodes.as_ptr().add(next).cast::<u8>()),
                    NonNull::new_unchecked(self.nodes.as_ptr().add(hole).cast::<u8>()),
                    std::mem::size_of::<(K, V)>(),
                );
                *self.psl.as_ptr().add(hole) = next_psl - 1;
                *self.info.as_ptr().add(hole) = SlotState::Occupied;
            }
            hole = next;
        }

        // SAFETY: `hole` stays within the padded array; its node storage
        // was just vacated (either it was `idx` itself, or its contents
        // were just shifted forward above).
        unsafe {
            *self.info.as_ptr().add(hole) = SlotState::Empty;
            *self.psl.as_ptr().add(hole) = 0;
            let byte_ptr = self.nodes.as_ptr().add(hole).cast::<u8>();
            self.allocator
                .fill(NonNull::new_unchecked(byte_ptr), std::mem::size_of::<(K, V)>(), debug_fill_byte());
        }
        self.n_items -= 1;
        Some(removed_value)
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
        let len = self.len_with_padding();
        if std::mem::needs_drop::<(K, V)>() {
            for idx in 0..len {
                // SAFETY: `idx` stays within `[0, len)`, which covers the
                // padding tail a live entry's probe chain may run into.
                let state = unsafe { *self.info.as_ptr().add(idx) };
                if state.is_live() {
                    // SAFETY: live slots hold an initialized `(K, V)`.
                    unsafe { std::ptr::drop_in_place((*self.nodes.as_ptr().add(idx)).as_mut_ptr()) };
                }
            }
        }
        // SAFETY: `Empty` is discriminant 0; zeroing the whole array is
        // equivalent to writing `Empty` to every slot.
        unsafe {
            std::ptr::write_bytes(self.info.as_ptr(), 0u8, len);
            std::ptr::write_bytes(self.psl.as_ptr(), 0u8, len);
        }
        self.n_items = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        let len = self.len_with_padding();
        (0..len).filter_map(move |idx| {
            // SAFETY: `idx` stays within `[0, len)`, which covers the
            // padding tail a live entry's probe chain may run into.
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
        let len = self.len_with_padding();
        (0..len).filter_map(move |idx| {
            // SAFETY: `idx` stays within `[0, len)`, which covers the
            // padding tail a live entry's probe chain may run into.
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

    /// Double `capacity`, recompute `max_psl`, and reinsert every live
    /// entry from scratch (old `psl`s are not preserved). Retries with a
    /// further doubling if `max_psl` is exhausted again mid-reinsert, so
    /// two consecutive grows happen when one isn't enough.
    fn grow(&mut self) -> Result<(), Error> {
        let old_len = self.len_with_padding();
        let old_info = self.info;
        let old_psl = self.psl;
        let old_nodes = self.nodes;
        let old_capacity = self.capacity;

        let mut drained: Vec<(K, V)> = Vec::with_capacity(self.n_items);
        for idx in 0..old_len {
            // SAFETY: `idx` stays within `[0, old_len)`, which covers the
            // padding tail — a live entry can sit there too, since a probe
            // chain started near the end of `[0, old_capacity)` may run on
            // into the padding.
            let state = unsafe { *old_info.as_ptr().add(idx) };
            if state.is_live() {
                // SAFETY: live slots hold an initialized `(K, V)`.
                let kv = unsafe { std::ptr::read(old_nodes.as_ptr().add(idx)).assume_init() };
                drained.push(kv);
            }
        }
        if old_len > 0 {
            // SAFETY: `old_info`/`old_psl`/`old_nodes` were allocated from
            // `self.allocator` with these layouts.
            unsafe {
                self.allocator.deallocate(old_info.cast(), info_layout(old_len)?);
                self.allocator.deallocate(old_psl.cast(), psl_layout(old_len)?);
                self.allocator
                    .deallocate(old_nodes.cast(), nodes_layout::<K, V>(old_len)?);
            }
        }

        let mut new_capacity = old_capacity * 2;
        loop {
            let new_max_psl = max_psl_for(new_capacity);
            let new_len = new_capacity + new_max_psl;

            let new_info = self.allocator.allocate_zeroed(info_layout(new_len)?)?.cast();
            let new_psl = self.allocator.allocate_zeroed(psl_layout(new_len)?)?.cast();
            let new_nodes = self
                .allocator
                .allocate(nodes_layout::<K, V>(new_len)?)?
                .cast();

            self.info = new_info;
            self.psl = new_psl;
            self.nodes = new_nodes;
            self.capacity = new_capacity;
            self.max_psl = new_max_psl;
            self.n_items = 0;

            let mut leftover = None;
            for (i, (k, v)) in drained.drain(..).enumerate() {
                let home = self.home(&k);
                if let Err(kv) = self.place(home, k, v) {
                    leftover = Some((i, kv));
                    break;
                }
            }

            match leftover {
                None => return Ok(()),
                Some((consumed, kv)) => {
                    // This table size can't fit every entry; drop it and
                    // retry at double the size, re-seeding `drained` with
                    // the not-yet-placed tail (the successfully placed
                    // prefix is re-derived as a fresh drain next pass).
                    let placed_so_far = self.drain_back_into(consumed + 1);
                    drained = placed_so_far;
                    drained.push(kv);
                    // SAFETY: just allocated above with these layouts.
                    unsafe {
                        self.allocator.deallocate(self.info.cast(), info_layout(new_len)?);
                        self.allocator.deallocate(self.psl.cast(), psl_layout(new_len)?);
                        self.allocator
                            .deallocate(self.nodes.cast(), nodes_layout::<K, V>(new_len)?);
                    }
                    new_capacity *= 2;
                }
            }
        }
    }

    /// Pull every placed entry back out of the current (about to be
    /// discarded) table as owned values, used when a grow attempt itself
    /// turns out too small and must be retried at a larger size.
    fn drain_back_into(&mut self, _consumed_hint: usize) -> Vec<(K, V)> {
        let mut out = Vec::with_capacity(self.n_items);
        let len = self.len_with_padding();
        for idx in 0..len {
            // SAFETY: `idx` stays within `[0, len)`, which covers the
            // padding tail a live entry's probe chain may run into.
            let state = unsafe { *self.info.as_ptr().add(idx) };
            if state.is_live() {
                // SAFETY: live slots hold an initialized `(K, V)`.
                let kv = unsafe { std::ptr::read(self.nodes.as_ptr().add(idx)).assume_init() };
                out.push(kv);
            }
        }
        out
    }
}

impl<K, V, S, A> Clone for RobinHoodMap<K, V, S, A>
where
    K: Clone + PartialEq + Eq + Hash,
    V: Clone,
    S: BuildHasher + Clone,
    A: Allocator + Clone,
{
    fn clone(&self) -> Self {
        let len = self.len_with_padding();
        let info = self
            .allocator
            .allocate_zeroed(info_layout(len).expect("capacity was already valid"))
            .expect("clone: allocation failed")
            .cast();
        let psl = self
            .allocator
            .allocate_zeroed(psl_layout(len).expect("capacity was already valid"))
            .expect("clone: allocation failed")
            .cast();
        let nodes = self
            .allocator
            .allocate(nodes_layout::<K, V>(len).expect("capacity was already valid"))
            .expect("clone: allocation failed")
            .cast();

        let mut other = Self {
            hasher: self.hasher.clone(),
            allocator: self.allocator.clone(),
            n_items: 0,
            capacity: self.capacity,
            max_psl: self.max_psl,
            load_factor: self.load_factor,
            info,
            psl,
            nodes,
        };

        for idx in 0..len {
            // SAFETY: `idx` stays within `[0, len)`, which covers the
            // padding tail a live entry's probe chain may run into.
            let state = unsafe { *self.info.as_ptr().add(idx) };
            if state.is_live() {
                // SAFETY: live slots hold an initialized `(K, V)`.
                let (k, v) = unsafe { (*self.nodes.as_ptr().add(idx)).assume_init_ref() };
                let p = unsafe { *self.psl.as_ptr().add(idx) };
                // SAFETY: `idx` is the same slot in both tables, which
                // share layout.
                unsafe {
                    *other.info.as_ptr().add(idx) = state;
                    *other.psl.as_ptr().add(idx) = p;
                    (*other.nodes.as_ptr().add(idx)).write((k.clone(), v.clone()));
                }
                other.n_items += 1;
            }
        }
        other
    }
}

impl<K, V, S, A> Drop for RobinHoodMap<K, V, S, A>
where
    A: Allocator + Clone,
{
    fn drop(&mut self) {
        let len = self.len_with_padding();
        if std::mem::needs_drop::<(K, V)>() {
            for idx in 0..len {
                // SAFETY: `idx` stays within `[0, len)`, which covers the
                // padding tail a live entry's probe chain may run into.
                let state = unsafe { *self.info.as_ptr().add(idx) };
                if state.is_live() {
                    // SAFETY: live slots hold an initialized `(K, V)`.
                    unsafe { std::ptr::drop_in_place((*self.nodes.as_ptr().add(idx)).as_mut_ptr()) };
                }
            }
        }
        if len > 0 {
            if let (Ok(il), Ok(pl), Ok(nl)) = (info_layout(len), psl_layout(len), nodes_layout::<K, V>(len)) {
                // SAFETY: these were allocated from `self.allocator` with
                // these layouts.
                unsafe {
                    self.allocator.deallocate(self.info.cast(), il);
                    self.allocator.deallocate(self.psl.cast(), pl);
                    self.allocator.deallocate(self.nodes.cast(), nl);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_default() -> RobinHoodMap<i32, i32> {
        RobinHoodMap::new()
    }

    #[test]
    fn default_sizing() {
        let map = new_default();
        assert_eq!(map.capacity(), 16);
        assert_eq!(map.max_psl(), 8);
        assert_eq!(map.load_max(), 11);
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
    fn displacement_invariant_holds_after_many_inserts() {
        let mut map: RobinHoodMap<i32, i32> = RobinHoodMap::with_capacity(16).unwrap();
        for i in 0..200 {
            map.insert(i, i).unwrap();
        }
        for idx in 0..map.capacity() {
            // SAFETY: test-only direct inspection of the invariant.
            let state = unsafe { *map.info.as_ptr().add(idx) };
            if state.is_live() {
                let (k, _) = unsafe { (*map.nodes.as_ptr().add(idx)).assume_init_ref() };
                let p = unsafe { *map.psl.as_ptr().add(idx) } as usize;
                let home = map.home(k);
                assert_eq!(idx - home, p);
                assert!(p < map.max_psl());
            }
        }
    }

    #[test]
    fn scenario_5_thousand_random_keys() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(42);
        let mut keys: Vec<i64> = (0..100_000).collect();
        keys.shuffle(&mut rng);
        keys.truncate(1000);

        let mut map: RobinHoodMap<i64, i64> = RobinHoodMap::with_capacity(16).unwrap();
        for &k in &keys {
            map.insert(k, k * 2).unwrap();
        }
        for &k in &keys {
            assert_eq!(map.get(&k), Some(&(k * 2)));
        }
        for idx in 0..map.capacity() {
            // SAFETY: test-only direct inspection of the invariant.
            let state = unsafe { *map.info.as_ptr().add(idx) };
            if state.is_live() {
                let (k, _) = unsafe { (*map.nodes.as_ptr().add(idx)).assume_init_ref() };
                let home = map.home(k);
                assert!(idx - home < map.max_psl());
            }
        }
    }

    #[test]
    fn backward_shift_deletion_preserves_invariant() {
        let mut map: RobinHoodMap<i32, i32> = RobinHoodMap::with_capacity(16).unwrap();
        for i in 0..12 {
            map.insert(i, i).unwrap();
        }
        for i in (0..12).step_by(2) {
            map.remove(&i);
        }
        for i in (1..12).step_by(2) {
            assert_eq!(map.get(&i), Some(&i));
        }
        for idx in 0..map.capacity() {
            // SAFETY: test-only direct inspection of the invariant.
            let state = unsafe { *map.info.as_ptr().add(idx) };
            if state.is_live() {
                let (k, _) = unsafe { (*map.nodes.as_ptr().add(idx)).assume_init_ref() };
                let p = unsafe { *map.psl.as_ptr().add(idx) } as usize;
                let home = map.home(k);
                assert_eq!(idx - home, p);
            }
        }
    }

    #[test]
    fn clear_resets_size_and_drops_values() {
        use std::rc::Rc;
        let counter = Rc::new(());
        let mut map: RobinHoodMap<i32, Rc<()>> = RobinHoodMap::new();
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
        let mut map: RobinHoodMap<i32, i32> = RobinHoodMap::new();
        map.insert(1, 1).unwrap();
        let mut other = map.clone();
        other.insert(2, 2).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(other.len(), 2);
    }

    #[test]
    fn grow_on_load_factor() {
        let mut map: RobinHoodMap<i32, i32> = RobinHoodMap::with_capacity(16).unwrap();
        for i in 0..11 {
            map.add(i, i).unwrap();
        }
        assert_eq!(map.capacity(), 16);
        map.add(11, 11).unwrap();
        assert_eq!(map.capacity(), 32);
        for i in 0..12 {
            assert_eq!(map.get(&i), Some(&i));
        }
    }
}
