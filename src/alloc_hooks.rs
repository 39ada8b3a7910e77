//! The injectable allocator policy: six hooks (allocate, allocate-zeroed,
//! reallocate, deallocate, fill, relocate), as required by the reference
//! design's allocator contract. `Array`, `FlatMap`, and `RobinHoodMap` are
//! all generic over `A: Allocator + Clone`, defaulting to [`Global`].
//!
//! This is built on the *stable* `std::alloc` free functions rather than the
//! nightly `std::alloc::Allocator` trait, so that this crate doesn't require
//! a nightly toolchain to build.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::error::{AllocatorHook, Error};

/// Injectable allocator policy backing a container's storage.
///
/// # Safety
///
/// Implementations must uphold the usual `std::alloc` contracts: pointers
/// returned from `allocate`/`allocate_zeroed`/`reallocate` must be valid for
/// `layout`, `deallocate` must be called with the same layout the matching
/// allocation was made with, and `fill`/`relocate` must not read or write
/// outside the byte range they're given.
pub unsafe trait Allocator {
    /// Allocate storage for `layout`, uninitialized.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, Error>;

    /// Allocate storage for `layout`, zero-filled. Hash-map backing arrays
    /// require this so that slot-state bytes start out `EMPTY = 0`.
    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<u8>, Error>;

    /// Grow or shrink a previous allocation in place where possible,
    /// otherwise allocate-copy-deallocate. `ptr` must have been obtained from
    /// this allocator with `old_layout`.
    ///
    /// # Safety
    /// `ptr` must be a live allocation from this allocator made with `old_layout`.
    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<u8>, Error>;

    /// Release a previous allocation.
    ///
    /// # Safety
    /// `ptr` must be a live allocation from this allocator made with `layout`.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);

    /// Fill `len` bytes starting at `ptr` with `byte`.
    ///
    /// # Safety
    /// `ptr` must be valid for writes of `len` bytes.
    unsafe fn fill(&self, ptr: NonNull<u8>, len: usize, byte: u8);

    /// Move `count` bytes from `src` to `dst`. Ranges must not overlap.
    ///
    /// # Safety
    /// `src` and `dst` must each be valid for `count` bytes and non-overlapping.
    unsafe fn relocate(&self, src: NonNull<u8>, dst: NonNull<u8>, count: usize);
}

/// The process's global allocator, reached through the stable `std::alloc`
/// free functions.
#[derive(Debug, Default, Clone, Copy)]
pub struct Global;

unsafe impl Allocator for Global {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, Error> {
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        // SAFETY: layout has nonzero size, checked above.
        let ptr = unsafe { alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(Error::Allocator(AllocatorHook::Allocate))
    }

    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<u8>, Error> {
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        // SAFETY: layout has nonzero size, checked above.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or(Error::Allocator(AllocatorHook::AllocateZeroed))
    }

    unsafe fn reallocate(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_layout: Layout,
    ) -> Result<NonNull<u8>, Error> {
        if old_layout.size() == 0 {
            return self.allocate(new_layout);
        }
        if new_layout.size() == 0 {
            // SAFETY: forwarded from caller's contract.
            unsafe { self.deallocate(ptr, old_layout) };
            return Ok(NonNull::dangling());
        }
        // SAFETY: forwarded from caller's contract; alignment is unchanged
        // between old and new layout for every call site in this crate.
        let raw = unsafe { alloc::realloc(ptr.as_ptr(), old_layout, new_layout.size()) };
        NonNull::new(raw).ok_or(Error::Allocator(AllocatorHook::Reallocate))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        // SAFETY: forwarded from caller's contract.
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }

    unsafe fn fill(&self, ptr: NonNull<u8>, len: usize, byte: u8) {
        // SAFETY: forwarded from caller's contract.
        unsafe { ptr.as_ptr().write_bytes(byte, len) };
    }

    unsafe fn relocate(&self, src: NonNull<u8>, dst: NonNull<u8>, count: usize) {
        // SAFETY: forwarded from caller's contract.
        unsafe { std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), count) };
    }
}
