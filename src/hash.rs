//! FNV-1a hashing, the built-in pluggable hash for both maps.
//!
//! The reference design specifies FNV-1a over either a fixed-width key or a
//! null-terminated byte string, selected by pointer width. `Hasher::write`
//! already generalizes over both: it receives a byte slice regardless of
//! whether those bytes came from a `#[repr(C)]`-style fixed-width key or from
//! a string's byte representation, so one `Hasher` impl per width covers both
//! cases described in the reference design.

use core::hash::{BuildHasherDefault, Hasher};

const OFFSET_32: u32 = 0x811c_9dc5;
const PRIME_32: u32 = 0x0100_0193;
const OFFSET_64: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME_64: u64 = 0x0000_0100_0000_01b3;

/// 32-bit FNV-1a.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a32(u32);

impl Default for Fnv1a32 {
    fn default() -> Self {
        Self(OFFSET_32)
    }
}

impl Hasher for Fnv1a32 {
    fn write(&mut self, bytes: &[u8]) {
        let mut hash = self.0;
        for &byte in bytes {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(PRIME_32);
        }
        self.0 = hash;
    }

    fn finish(&self) -> u64 {
        self.0 as u64
    }
}

/// 64-bit FNV-1a.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a64(u64);

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self(OFFSET_64)
    }
}

impl Hasher for Fnv1a64 {
    fn write(&mut self, bytes: &[u8]) {
        let mut hash = self.0;
        for &byte in bytes {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(PRIME_64);
        }
        self.0 = hash;
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// FNV-1a sized to the host pointer width, matching the reference design's
/// "constants selected by pointer width" rule.
#[cfg(target_pointer_width = "64")]
pub type DefaultHashBuilder = BuildHasherDefault<Fnv1a64>;

#[cfg(not(target_pointer_width = "64"))]
pub type DefaultHashBuilder = BuildHasherDefault<Fnv1a32>;

/// A fast non-cryptographic alternative `BuildHasher`, opt-in via the
/// generic `S` parameter on both maps.
pub type AHashBuilder = ahash::RandomState;

/// Drive `build_hasher` over `key` and return the resulting hash.
pub fn make_hash<S, K>(build_hasher: &S, key: &K) -> u64
where
    S: core::hash::BuildHasher,
    K: core::hash::Hash + ?Sized,
{
    let mut hasher = build_hasher.build_hasher();
    key.hash(&mut hasher);
    hasher.finish()
}
