#![allow(dead_code)]

use std::{
  alloc::{self, Layout},
  collections::HashMap,
  ptr::{self, NonNull},
};

use rnalloc::{BLOCK_ALIGN, Chunk, Config, HEADER_SIZE, Provider, TreeAllocator};

struct Block {
  layout: Layout,
  live: bool,
}

/// Provider that never hands memory back until dropped and moves every
/// block it resizes. Released headers stay readable, so misuse reaches the
/// allocator's own checks instead of the system allocator.
#[derive(Default)]
pub struct RetainingProvider {
  blocks: HashMap<usize, Block>,
  fail: bool,
}

impl RetainingProvider {
  pub fn live(&self) -> usize {
    self.blocks.values().filter(|block| block.live).count()
  }

  /// Whether the block backing `chunk` is still held by the allocator.
  pub fn is_live(
    &self,
    chunk: Chunk,
  ) -> bool {
    let block = chunk.as_ptr() as usize - HEADER_SIZE;
    self.blocks.get(&block).is_some_and(|block| block.live)
  }

  pub fn set_fail(
    &mut self,
    fail: bool,
  ) {
    self.fail = fail;
  }

  fn acquire_with(
    &mut self,
    size: usize,
    zeroed: bool,
  ) -> Option<NonNull<u8>> {
    if self.fail {
      return None;
    }

    let layout = Layout::from_size_align(size, BLOCK_ALIGN).ok()?;
    let block = NonNull::new(unsafe {
      if zeroed {
        alloc::alloc_zeroed(layout)
      } else {
        alloc::alloc(layout)
      }
    })?;

    self.blocks.insert(block.as_ptr() as usize, Block { layout, live: true });
    Some(block)
  }
}

unsafe impl Provider for RetainingProvider {
  fn acquire(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.acquire_with(size, false)
  }

  fn acquire_zeroed(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.acquire_with(size, true)
  }

  unsafe fn resize(
    &mut self,
    block: NonNull<u8>,
    size: usize,
  ) -> Option<NonNull<u8>> {
    let old_size = match self.blocks.get(&(block.as_ptr() as usize)) {
      Some(old) if old.live => old.layout.size(),
      _ => panic!("resize of unknown or released block {block:?}"),
    };

    let moved = self.acquire_with(size, false)?;

    unsafe {
      ptr::copy_nonoverlapping(block.as_ptr(), moved.as_ptr(), old_size.min(size));
    }

    if let Some(old) = self.blocks.get_mut(&(block.as_ptr() as usize)) {
      old.live = false;
    }

    Some(moved)
  }

  unsafe fn release(
    &mut self,
    block: NonNull<u8>,
  ) {
    match self.blocks.get_mut(&(block.as_ptr() as usize)) {
      Some(old) if old.live => old.live = false,
      _ => panic!("release of unknown or released block {block:?}"),
    }
  }
}

impl Drop for RetainingProvider {
  fn drop(&mut self) {
    for (address, block) in self.blocks.drain() {
      unsafe { alloc::dealloc(address as *mut u8, block.layout) }
    }
  }
}

pub fn retaining_tree() -> TreeAllocator<RetainingProvider> {
  TreeAllocator::with_provider(RetainingProvider::default(), Config::new().check_cycles(true))
}

/// Tree with the release-build default: only self-parenting is rejected.
pub fn unchecked_tree() -> TreeAllocator<RetainingProvider> {
  TreeAllocator::with_provider(RetainingProvider::default(), Config::new().check_cycles(false))
}
