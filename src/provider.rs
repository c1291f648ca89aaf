//! Raw memory providers.

use std::ptr::NonNull;

use libc::{c_void, calloc, free, malloc, realloc};

/// Source of the raw blocks that back every chunk.
///
/// # Safety
///
/// Implementors must guarantee that:
///
/// - every block returned is aligned to at least [`BLOCK_ALIGN`] bytes and
///   is valid for reads and writes of the requested size;
/// - a failed [`resize`](Provider::resize) leaves the original block valid
///   and unchanged;
/// - [`resize`](Provider::resize) only ever moves the block it was given.
///   The tree repairs links of the resized chunk's direct neighbours, so a
///   provider relocating other blocks behind its back corrupts the forest.
///
/// [`BLOCK_ALIGN`]: crate::BLOCK_ALIGN
pub unsafe trait Provider {
  /// Acquires `size` uninitialized bytes.
  fn acquire(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>>;

  /// Acquires `size` zeroed bytes.
  fn acquire_zeroed(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>>;

  /// Resizes `block` to `size` bytes, preserving its common prefix.
  ///
  /// # Safety
  ///
  /// `block` must have been returned by this provider and not released.
  unsafe fn resize(
    &mut self,
    block: NonNull<u8>,
    size: usize,
  ) -> Option<NonNull<u8>>;

  /// Returns `block` to the provider.
  ///
  /// # Safety
  ///
  /// `block` must have been returned by this provider and not released.
  unsafe fn release(
    &mut self,
    block: NonNull<u8>,
  );
}

/// The C library allocator: `malloc`, `calloc`, `realloc` and `free`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibcProvider;

unsafe impl Provider for LibcProvider {
  fn acquire(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { malloc(size) } as *mut u8)
  }

  fn acquire_zeroed(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { calloc(1, size) } as *mut u8)
  }

  unsafe fn resize(
    &mut self,
    block: NonNull<u8>,
    size: usize,
  ) -> Option<NonNull<u8>> {
    NonNull::new(unsafe { realloc(block.as_ptr() as *mut c_void, size) } as *mut u8)
  }

  unsafe fn release(
    &mut self,
    block: NonNull<u8>,
  ) {
    unsafe { free(block.as_ptr() as *mut c_void) }
  }
}
