use thiserror::Error;

use crate::Chunk;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
  #[error("out of memory: provider could not supply a block for {size} bytes")]
  OutOfMemory { size: usize },

  #[error("allocation of {size} bytes overflows the chunk header")]
  CapacityOverflow { size: usize },

  #[error("cannot attach {chunk:?} under {parent:?}: it would become its own ancestor")]
  Cycle { chunk: Chunk, parent: Chunk },
}

pub type Result<T> = std::result::Result<T, Error>;
