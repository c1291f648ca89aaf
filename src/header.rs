//! Chunk header layout and link accessors.
//!
//! Every link stored in a header is a *user* pointer (the address handed to
//! callers), or null for "none". Headers are only ever reached through the
//! user pointer, so all accessors take one.

use std::{mem, ptr};

use crate::align_to;

/// Alignment every provider block must satisfy, and therefore the alignment
/// of every user pointer.
pub const BLOCK_ALIGN: usize = 2 * mem::size_of::<usize>();

/// Bytes reserved in front of every payload. The three link words sit at the
/// end of this region, right before the user pointer.
pub const HEADER_SIZE: usize = align_to!(mem::size_of::<Header>(), BLOCK_ALIGN);

/// Written into the next-sibling slot of a chunk just before its block goes
/// back to the provider. The first two words of a freed malloc block hold
/// the allocator's own free-list links; the next-sibling slot sits past them.
pub(crate) const RELEASED: *mut u8 = usize::MAX as *mut u8;

#[repr(C)]
pub(crate) struct Header {
  pub child: *mut u8,
  pub next: *mut u8,
  /// Previous sibling, or the parent when this chunk is a first child.
  pub prev: *mut u8,
}

impl Header {
  pub const EMPTY: Header = Header {
    child: ptr::null_mut(),
    next: ptr::null_mut(),
    prev: ptr::null_mut(),
  };
}

#[inline]
unsafe fn header(usr: *mut u8) -> *mut Header {
  unsafe { usr.sub(mem::size_of::<Header>()) as *mut Header }
}

#[inline]
pub(crate) unsafe fn raw_to_user(raw: *mut u8) -> *mut u8 {
  unsafe { raw.add(HEADER_SIZE) }
}

#[inline]
pub(crate) unsafe fn user_to_raw(usr: *mut u8) -> *mut u8 {
  unsafe { usr.sub(HEADER_SIZE) }
}

/// Resets the links of a freshly acquired block.
#[inline]
pub(crate) unsafe fn init(usr: *mut u8) {
  unsafe { header(usr).write(Header::EMPTY) }
}

#[inline]
pub(crate) unsafe fn child(usr: *mut u8) -> *mut u8 {
  unsafe { (*header(usr)).child }
}

#[inline]
pub(crate) unsafe fn next(usr: *mut u8) -> *mut u8 {
  unsafe { (*header(usr)).next }
}

#[inline]
pub(crate) unsafe fn prev(usr: *mut u8) -> *mut u8 {
  unsafe { (*header(usr)).prev }
}

#[inline]
pub(crate) unsafe fn set_child(
  usr: *mut u8,
  child: *mut u8,
) {
  unsafe { (*header(usr)).child = child }
}

#[inline]
pub(crate) unsafe fn set_next(
  usr: *mut u8,
  next: *mut u8,
) {
  unsafe { (*header(usr)).next = next }
}

#[inline]
pub(crate) unsafe fn set_prev(
  usr: *mut u8,
  prev: *mut u8,
) {
  unsafe { (*header(usr)).prev = prev }
}

#[inline]
pub(crate) unsafe fn is_root(usr: *mut u8) -> bool {
  unsafe { prev(usr).is_null() }
}

/// Whether the overlapping slot of `usr` holds its parent.
///
/// A previous sibling always points forward at `usr`; a parent's forward
/// link points at one of the parent's own siblings, never at its child.
/// Only valid when `usr` is not a root.
#[inline]
pub(crate) unsafe fn is_first(usr: *mut u8) -> bool {
  unsafe { next(prev(usr)) != usr }
}
