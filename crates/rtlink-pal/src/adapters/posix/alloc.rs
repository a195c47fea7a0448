//! Native allocator pass-through.

use std::ffi::c_void;
use std::ptr::NonNull;

use crate::domain::PalConfig;
use crate::ports::Allocator;

/// Direct `malloc`/`realloc`/`free` pass-through.
///
/// No pooling, no arenas, no bookkeeping of its own; the upper stack owns
/// every block it requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl SystemAllocator {
    /// Construct the allocator backend.
    #[must_use]
    pub fn new(_config: &PalConfig) -> Self {
        Self
    }
}

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<NonNull<u8>> {
        // malloc(0) may legally return null; promote to a 1-byte block so a
        // successful zero-size allocation still has a matching release.
        let ptr = unsafe { libc::malloc(size.max(1)) };
        NonNull::new(ptr.cast::<u8>())
    }

    fn allocate_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        let ptr = unsafe { libc::calloc(size.max(1), 1) };
        NonNull::new(ptr.cast::<u8>())
    }

    unsafe fn reallocate(&self, ptr: NonNull<u8>, new_size: usize) -> Option<NonNull<u8>> {
        let moved = libc::realloc(ptr.as_ptr().cast::<c_void>(), new_size.max(1));
        NonNull::new(moved.cast::<u8>())
    }

    unsafe fn release(&self, ptr: NonNull<u8>) {
        libc::free(ptr.as_ptr().cast::<c_void>());
    }
}
