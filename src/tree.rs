use std::{
  fmt,
  iter::FusedIterator,
  marker::PhantomData,
  process,
  ptr::{self, NonNull},
};

use tracing::{debug, error, trace};

use crate::{
  config::Config,
  error::{Error, Result},
  header::{self, HEADER_SIZE, RELEASED},
  provider::{LibcProvider, Provider},
};

/// Handle to a live chunk: the address of its payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chunk(NonNull<u8>);

impl Chunk {
  /// Wraps a user pointer previously obtained from [`Chunk::as_ptr`].
  /// Returns `None` for null.
  pub fn from_ptr(ptr: *mut u8) -> Option<Self> {
    NonNull::new(ptr).map(Chunk)
  }

  pub fn as_ptr(self) -> *mut u8 {
    self.0.as_ptr()
  }

  pub fn cast<T>(self) -> *mut T {
    self.0.as_ptr() as *mut T
  }
}

impl fmt::Debug for Chunk {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "Chunk({:p})", self.0)
  }
}

/// Structure aware allocator.
///
/// Every chunk may depend on a parent chunk. Releasing a chunk releases all
/// of its descendants with it; its siblings and ancestors are untouched.
///
/// All tree operations are `unsafe`: every [`Chunk`] passed in must be live
/// and must have been produced by this allocator. Operations on one tree must
/// not run concurrently.
pub struct TreeAllocator<P: Provider = LibcProvider> {
  provider: P,
  config: Config,
}

impl TreeAllocator {
  pub fn new() -> Self {
    Self::with_provider(LibcProvider, Config::default())
  }
}

impl Default for TreeAllocator {
  fn default() -> Self {
    Self::new()
  }
}

impl<P: Provider> TreeAllocator<P> {
  pub fn with_provider(
    provider: P,
    config: Config,
  ) -> Self {
    Self { provider, config }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }

  pub fn provider_mut(&mut self) -> &mut P {
    &mut self.provider
  }

  /// Allocates `size` uninitialized bytes depending on `parent`.
  ///
  /// The new chunk becomes the first child of `parent`.
  pub unsafe fn allocate(
    &mut self,
    size: usize,
    parent: Option<Chunk>,
  ) -> Result<Chunk> {
    let block = self
      .provider
      .acquire(block_size(size)?)
      .ok_or_else(|| out_of_memory(size))?;

    Ok(unsafe { self.init(block, size, parent) })
  }

  /// Like [`allocate`](Self::allocate), with the payload zeroed.
  pub unsafe fn allocate_zeroed(
    &mut self,
    size: usize,
    parent: Option<Chunk>,
  ) -> Result<Chunk> {
    let block = self
      .provider
      .acquire_zeroed(block_size(size)?)
      .ok_or_else(|| out_of_memory(size))?;

    Ok(unsafe { self.init(block, size, parent) })
  }

  unsafe fn init(
    &mut self,
    block: NonNull<u8>,
    size: usize,
    parent: Option<Chunk>,
  ) -> Chunk {
    unsafe {
      let usr = header::raw_to_user(block.as_ptr());
      header::init(usr);

      if let Some(parent) = parent {
        attach(usr, parent.as_ptr());
      }

      let chunk = Chunk(NonNull::new_unchecked(usr));
      trace!(?chunk, size, ?parent, "allocated chunk");
      chunk
    }
  }

  /// Resizes `chunk` to `size` bytes, keeping its place in the tree.
  ///
  /// A `None` chunk is allocated as a new root. On failure the original
  /// chunk is left valid and unchanged. The returned handle replaces `chunk`.
  pub unsafe fn resize(
    &mut self,
    chunk: Option<Chunk>,
    size: usize,
  ) -> Result<Chunk> {
    let Some(chunk) = chunk else {
      return unsafe { self.allocate(size, None) };
    };

    let total = block_size(size)?;
    let old = chunk.as_ptr();

    unsafe {
      let block = NonNull::new_unchecked(header::user_to_raw(old));
      let block = self
        .provider
        .resize(block, total)
        .ok_or_else(|| out_of_memory(size))?;

      let usr = header::raw_to_user(block.as_ptr());
      let moved = usr != old;

      if moved {
        relink(old, usr);
      }

      let resized = Chunk(NonNull::new_unchecked(usr));
      trace!(from = ?chunk, to = ?resized, size, moved, "resized chunk");
      Ok(resized)
    }
  }

  /// Releases `chunk` and all of its descendants. Always returns `None`, so
  /// callers can overwrite the released handle with the result.
  ///
  /// Aborts the process if the tree turns out to be cyclic or `chunk` was
  /// already released.
  pub unsafe fn release(
    &mut self,
    chunk: Option<Chunk>,
  ) -> Option<Chunk> {
    let chunk = chunk?;
    let usr = chunk.as_ptr();

    unsafe {
      if header::next(usr) == RELEASED {
        corrupted(usr);
      }

      detach(usr);
      self.release_siblings(header::child(usr));
      self.free(usr);
    }

    trace!(?chunk, "released chunk");
    None
  }

  /// Releases `first`, every sibling following it and all their descendants.
  ///
  /// The whole sibling chain is marked (parent slot cleared) before any of
  /// it goes back to the provider, so a chain looping on itself is caught
  /// while its headers are still readable.
  unsafe fn release_siblings(
    &mut self,
    first: *mut u8,
  ) {
    unsafe {
      let mut usr = first;

      while !usr.is_null() {
        if header::is_root(usr) {
          corrupted(usr);
        }

        header::set_prev(usr, ptr::null_mut());
        self.release_siblings(header::child(usr));
        usr = header::next(usr);
      }

      let mut usr = first;

      while !usr.is_null() {
        let next = header::next(usr);
        self.free(usr);
        usr = next;
      }
    }
  }

  unsafe fn free(
    &mut self,
    usr: *mut u8,
  ) {
    unsafe {
      header::set_next(usr, RELEASED);
      let block = NonNull::new_unchecked(header::user_to_raw(usr));
      self.provider.release(block);
    }
  }

  /// Returns the chunk `chunk` depends on, or `None` for roots.
  ///
  /// Walks back over every preceding sibling.
  pub unsafe fn parent(
    &self,
    chunk: Option<Chunk>,
  ) -> Option<Chunk> {
    let mut usr = chunk?.as_ptr();

    unsafe {
      if header::is_root(usr) {
        return None;
      }

      while !header::is_first(usr) {
        usr = header::prev(usr);
      }

      Chunk::from_ptr(header::prev(usr))
    }
  }

  /// Makes `chunk` (with its whole subtree) depend on `parent`, or turns it
  /// into a root when `parent` is `None`.
  ///
  /// Fails with [`Error::Cycle`] if `parent` is `chunk` itself or, when
  /// [`Config::check_cycles`] is set, one of its descendants.
  pub unsafe fn set_parent(
    &mut self,
    chunk: Option<Chunk>,
    parent: Option<Chunk>,
  ) -> Result<()> {
    let Some(chunk) = chunk else {
      return Ok(());
    };

    unsafe {
      if let Some(parent) = parent {
        self.check_cycle(chunk, parent)?;
      }

      detach(chunk.as_ptr());

      if let Some(parent) = parent {
        attach(chunk.as_ptr(), parent.as_ptr());
      }
    }

    trace!(?chunk, ?parent, "set parent");
    Ok(())
  }

  /// Detaches `chunk` from its tree and hands its children over to `parent`,
  /// ahead of the children `parent` already has. With no `parent` every
  /// former child becomes a root of its own.
  ///
  /// `chunk` is left childless and parentless.
  pub unsafe fn cut(
    &mut self,
    chunk: Option<Chunk>,
    parent: Option<Chunk>,
  ) -> Result<()> {
    let Some(chunk) = chunk else {
      return Ok(());
    };

    let usr = chunk.as_ptr();

    unsafe {
      if let Some(parent) = parent {
        self.check_cycle(chunk, parent)?;
      }

      detach(usr);

      let first = header::child(usr);
      header::set_child(usr, ptr::null_mut());

      if !first.is_null() {
        match parent {
          Some(parent) => splice(first, parent.as_ptr()),
          None => scatter(first),
        }
      }
    }

    trace!(?chunk, ?parent, "cut chunk");
    Ok(())
  }

  /// Iterates over the children of `chunk`, newest first.
  pub unsafe fn children(
    &self,
    chunk: Chunk,
  ) -> Children<'_> {
    Children {
      next: unsafe { header::child(chunk.as_ptr()) },
      _tree: PhantomData,
    }
  }

  pub unsafe fn first_child(
    &self,
    chunk: Chunk,
  ) -> Option<Chunk> {
    Chunk::from_ptr(unsafe { header::child(chunk.as_ptr()) })
  }

  pub unsafe fn is_root(
    &self,
    chunk: Chunk,
  ) -> bool {
    unsafe { header::is_root(chunk.as_ptr()) }
  }

  unsafe fn check_cycle(
    &self,
    chunk: Chunk,
    parent: Chunk,
  ) -> Result<()> {
    let closes_cycle = parent == chunk || (self.config.check_cycles && unsafe { self.is_ancestor(chunk, parent) });

    if closes_cycle {
      debug!(?chunk, ?parent, "rejected cyclic parent");
      return Err(Error::Cycle { chunk, parent });
    }

    Ok(())
  }

  unsafe fn is_ancestor(
    &self,
    ancestor: Chunk,
    chunk: Chunk,
  ) -> bool {
    let mut current = Some(chunk);

    while let Some(chunk) = current {
      if chunk == ancestor {
        return true;
      }
      current = unsafe { self.parent(Some(chunk)) };
    }

    false
  }
}

/// Iterator over the children of a chunk.
pub struct Children<'a> {
  next: *mut u8,
  _tree: PhantomData<&'a ()>,
}

impl Iterator for Children<'_> {
  type Item = Chunk;

  fn next(&mut self) -> Option<Chunk> {
    let chunk = Chunk::from_ptr(self.next)?;
    self.next = unsafe { header::next(chunk.as_ptr()) };
    Some(chunk)
  }
}

impl FusedIterator for Children<'_> {}

fn block_size(size: usize) -> Result<usize> {
  size
    .checked_add(HEADER_SIZE)
    .ok_or(Error::CapacityOverflow { size })
}

fn out_of_memory(size: usize) -> Error {
  debug!(size, "provider could not supply a block");
  Error::OutOfMemory { size }
}

#[cold]
#[inline(never)]
fn corrupted(usr: *mut u8) -> ! {
  error!(chunk = ?usr, "chunk released twice or chunk tree is cyclic");
  process::abort()
}

/// Unlinks `usr` from its parent and siblings. Its children stay attached.
unsafe fn detach(usr: *mut u8) {
  unsafe {
    if !header::is_root(usr) {
      let first = header::is_first(usr);
      let next = header::next(usr);
      let prev = header::prev(usr);

      if !next.is_null() {
        header::set_prev(next, prev);
      }

      if first {
        header::set_child(prev, next);
      } else {
        header::set_next(prev, next);
      }
    }

    header::set_next(usr, ptr::null_mut());
    header::set_prev(usr, ptr::null_mut());
  }
}

/// Inserts the detached chunk `usr` as the first child of `parent`.
unsafe fn attach(
  usr: *mut u8,
  parent: *mut u8,
) {
  unsafe {
    let head = header::child(parent);

    if !head.is_null() {
      header::set_next(usr, head);
      header::set_prev(head, usr);
    }

    header::set_prev(usr, parent);
    header::set_child(parent, usr);
  }
}

/// Puts the sibling list starting at `first` in front of the children of
/// `parent`.
unsafe fn splice(
  first: *mut u8,
  parent: *mut u8,
) {
  unsafe {
    let head = header::child(parent);

    if !head.is_null() {
      let mut last = first;
      while !header::next(last).is_null() {
        last = header::next(last);
      }

      header::set_next(last, head);
      header::set_prev(head, last);
    }

    header::set_prev(first, parent);
    header::set_child(parent, first);
  }
}

/// Turns every chunk of the sibling list starting at `first` into a root.
unsafe fn scatter(first: *mut u8) {
  unsafe {
    let mut usr = first;

    while !usr.is_null() {
      let next = header::next(usr);
      header::set_next(usr, ptr::null_mut());
      header::set_prev(usr, ptr::null_mut());
      usr = next;
    }
  }
}

/// Points the direct neighbours of a chunk moved from `old` to `usr` at its
/// new address.
unsafe fn relink(
  old: *mut u8,
  usr: *mut u8,
) {
  unsafe {
    let child = header::child(usr);
    if !child.is_null() {
      header::set_prev(child, usr);
    }

    if header::is_root(usr) {
      return;
    }

    let next = header::next(usr);
    if !next.is_null() {
      header::set_prev(next, usr);
    }

    let prev = header::prev(usr);
    if header::next(prev) == old {
      header::set_next(prev, usr);
    } else {
      header::set_child(prev, usr);
    }
  }
}
