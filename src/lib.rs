//! # rnalloc - A Structure Aware Memory Allocator
//!
//! This crate provides a **tree allocator**: every chunk of memory may depend
//! on a parent chunk, and releasing a chunk releases everything that depends
//! on it.
//!
//! ## Overview
//!
//! Containers and their internal buffers usually have to die together.
//! Instead of bookkeeping that by hand, allocate the buffers as children of
//! the container and release only the container:
//!
//! ```text
//!   Dependency Forest:
//!
//!   NULL <-- chunk --> NULL
//!              ^
//!              |
//!              +-> chunk <--> chunk <--> chunk --> NULL
//!                    |          |          ^
//!                    v          v          |
//!                   NULL       NULL        +-> chunk <--> chunk --> NULL
//!                                                |          |
//!                                                v          v
//!                                               NULL       NULL
//!
//!   Releasing the top chunk releases all seven.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rnalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── config     - Allocator settings
//!   ├── error      - Error and Result types
//!   ├── header     - Chunk header layout (internal)
//!   ├── provider   - Raw memory providers (Provider, LibcProvider)
//!   └── tree       - TreeAllocator implementation
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use rnalloc::TreeAllocator;
//!
//! let mut tree = TreeAllocator::new();
//!
//! unsafe {
//!     let list = tree.allocate(16, None).unwrap();
//!     let buffer = tree.allocate(1024, Some(list)).unwrap();
//!
//!     assert_eq!(tree.parent(Some(buffer)), Some(list));
//!
//!     // Releases `buffer` too.
//!     tree.release(Some(list));
//! }
//! ```
//!
//! ## How It Works
//!
//! Each chunk carries a header of three machine words right before the
//! pointer handed to the caller:
//!
//! ```text
//!   Single Allocation:
//!   ┌─────────┬───────────────────────────────────┬─────────────────────┐
//!   │ padding │          Chunk Header             │     User Data       │
//!   │         │  ┌─────────┬─────────┬─────────┐  │                     │
//!   │         │  │  first  │  next   │  prev   │  │   N bytes usable    │
//!   │         │  │  child  │ sibling │ sibling │  │                     │
//!   │         │  └─────────┴─────────┴─────────┘  │                     │
//!   └─────────┴───────────────────────────────────┴─────────────────────┘
//!                                                 ▲
//!                                                 └── Pointer returned to user
//! ```
//!
//! The `prev sibling` slot of a first child holds its parent instead. A
//! chunk is a first child exactly when the chunk in its `prev` slot does not
//! point forward at it.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **One allocator family**: Chunks must only be resized and released by
//!   the allocator that produced them
//! - **Parent lookup is linear**: `parent` walks back over preceding siblings
//!
//! ## Safety
//!
//! This crate hands out raw memory. Every tree operation is `unsafe` and
//! requires the chunks passed in to be live.

pub mod align;
mod config;
mod error;
mod header;
mod provider;
mod tree;

pub use config::Config;
pub use error::{Error, Result};
pub use header::{BLOCK_ALIGN, HEADER_SIZE};
pub use provider::{LibcProvider, Provider};
pub use tree::{Children, Chunk, TreeAllocator};
