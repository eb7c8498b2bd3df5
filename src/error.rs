//! Errors reported by arena reservations and arena construction.

use thiserror::Error;

/// Coarse classification of an [`ArenaError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// The caller passed arguments the arena can never satisfy.
  InvalidArgument,
  /// The arena's fixed capacity is exhausted for this request.
  OutOfMemory,
}

/// Ways a request or a configuration can be malformed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum InvalidArgument {
  #[error("allocation of zero elements")]
  ZeroCount,
  #[error("element size must be non-zero")]
  ZeroSize,
  #[error("alignment {align} is not a power of two")]
  Alignment { align: usize },
  #[error("sharded arena needs at least one shard")]
  EmptyShardList,
  #[error("shard {index} is null")]
  NullShard { index: usize },
  #[error("shard index {index} out of range for {len} shards")]
  ShardOutOfRange { index: usize, len: usize },
  #[error("calling thread is not bound to a shard")]
  Unbound,
}

/// Error returned by every fallible arena operation.
///
/// Neither variant leaves the arena in a modified state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum ArenaError {
  #[error("invalid argument: {0}")]
  InvalidArgument(#[from] InvalidArgument),
  #[error("arena out of memory: cannot reserve {size} bytes aligned to {align}")]
  OutOfMemory { size: usize, align: usize },
}

impl ArenaError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      ArenaError::InvalidArgument(_) => ErrorKind::InvalidArgument,
      ArenaError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
    }
  }

  /// Size and alignment of the failed request, for out-of-memory errors.
  pub fn context(&self) -> Option<(usize, usize)> {
    match *self {
      ArenaError::OutOfMemory { size, align } => Some((size, align)),
      ArenaError::InvalidArgument(_) => None,
    }
  }

  pub fn is_out_of_memory(&self) -> bool {
    self.kind() == ErrorKind::OutOfMemory
  }
}

#[cfg(feature = "allocator")]
impl From<ArenaError> for core::alloc::AllocError {
  fn from(_: ArenaError) -> Self {
    core::alloc::AllocError
  }
}
