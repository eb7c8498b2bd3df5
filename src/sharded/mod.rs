//! Pool of arenas with per-thread routing.
//!
//! Every thread binds itself to one shard and from then on reserves only
//! from that shard's arena. Threads bound to different shards never touch
//! the same cursor, so they never contend.

use alloc::vec::Vec;
use core::{
  cell::Cell,
  mem::MaybeUninit,
};
use std::thread::{
  self,
  ThreadId,
};

use thread_local::ThreadLocal;

use crate::{
  arena::{
    Arena,
    Reservation,
  },
  config::{
    ShardedConfig,
    UnboundPolicy,
  },
  error::{
    ArenaError,
    InvalidArgument,
  },
};

#[derive(Clone, Copy, Debug)]
struct Binding {
  // ThreadLocal recycles slots of exited threads, so each entry remembers
  // which thread wrote it.
  owner: ThreadId,
  shard: usize,
}

/// An ordered, non-empty set of arenas used as one allocator.
///
/// The sharded arena borrows its shards; whoever built them keeps ownership
/// of the arenas and their buffers.
pub struct ShardedArena<'a, 'buf> {
  shards: Vec<&'a Arena<'buf>>,
  bindings: ThreadLocal<Cell<Option<Binding>>>,
  config: ShardedConfig,
}

impl<'a, 'buf> ShardedArena<'a, 'buf> {
  pub fn new<I>(shards: I) -> Result<Self, ArenaError>
  where
    I: IntoIterator<Item = &'a Arena<'buf>>,
  {
    Self::with_config(shards, ShardedConfig::default())
  }

  pub fn with_config<I>(shards: I, config: ShardedConfig) -> Result<Self, ArenaError>
  where
    I: IntoIterator<Item = &'a Arena<'buf>>,
  {
    Self::try_from_options(shards.into_iter().map(Some), config)
  }

  /// Build from possibly absent shard references, rejecting any gap.
  pub fn try_from_options<I>(shards: I, config: ShardedConfig) -> Result<Self, ArenaError>
  where
    I: IntoIterator<Item = Option<&'a Arena<'buf>>>,
  {
    let shards = shards
      .into_iter()
      .enumerate()
      .map(|(index, shard)| shard.ok_or(InvalidArgument::NullShard { index }))
      .collect::<Result<Vec<_>, _>>()?;

    if shards.is_empty() {
      return Err(InvalidArgument::EmptyShardList.into());
    }

    tracing::debug!(
      shards = shards.len(),
      unbound_policy = ?config.unbound_policy(),
      "created sharded arena"
    );

    Ok(Self {
      shards,
      bindings: ThreadLocal::new(),
      config,
    })
  }

  pub fn config(&self) -> ShardedConfig {
    self.config
  }

  pub fn shard_count(&self) -> usize {
    self.shards.len()
  }

  pub fn shard(&self, index: usize) -> Option<&'a Arena<'buf>> {
    self.shards.get(index).copied()
  }

  pub fn shards(&self) -> &[&'a Arena<'buf>] {
    &self.shards
  }

  /// Route the calling thread's future reservations to `shard`.
  ///
  /// May be called again to rebind; reservations already made stay where
  /// they are.
  pub fn bind(&self, shard: usize) -> Result<(), ArenaError> {
    if shard >= self.shards.len() {
      return Err(
        InvalidArgument::ShardOutOfRange {
          index: shard,
          len: self.shards.len(),
        }
        .into(),
      );
    }
    let owner = thread::current().id();
    self
      .bindings
      .get_or(|| Cell::new(None))
      .set(Some(Binding { owner, shard }));
    tracing::trace!(?owner, shard, "bound thread to shard");
    Ok(())
  }

  /// Forget the calling thread's binding.
  pub fn unbind(&self) {
    if let Some(cell) = self.bindings.get() {
      cell.set(None);
    }
  }

  /// Shard the calling thread is bound to, if any.
  pub fn bound_shard(&self) -> Option<usize> {
    let binding = self.bindings.get()?.get()?;
    (binding.owner == thread::current().id()).then_some(binding.shard)
  }

  /// Arena that a reservation from the calling thread would use.
  pub fn current(&self) -> Result<&'a Arena<'buf>, ArenaError> {
    let index = match (self.bound_shard(), self.config.unbound_policy()) {
      (Some(index), _) => index,
      (None, UnboundPolicy::FirstShard) => {
        tracing::trace!("unbound thread routed to shard 0");
        0
      }
      (None, UnboundPolicy::Reject) => return Err(InvalidArgument::Unbound.into()),
    };
    Ok(self.shards[index])
  }

  /// Reserve from the calling thread's shard.
  ///
  /// Guarantees are those of [`Arena::reserve`] within that shard; there is
  /// no ordering between reservations on different shards.
  pub fn reserve(
    &self,
    element_size: usize,
    element_align: usize,
    count: usize,
  ) -> Result<Reservation<'buf>, ArenaError> {
    if count == 0 {
      return Err(InvalidArgument::ZeroCount.into());
    }
    self.current()?.reserve(element_size, element_align, count)
  }

  pub fn alloc_uninit<T>(&self, count: usize) -> Result<&'buf mut [MaybeUninit<T>], ArenaError> {
    self.current()?.alloc_uninit(count)
  }

  /// Bytes consumed across all shards, padding included.
  pub fn used(&self) -> usize {
    self.shards.iter().map(|shard| shard.used()).sum()
  }

  pub fn capacity(&self) -> usize {
    self.shards.iter().map(|shard| shard.capacity()).sum()
  }

  /// Whether `ptr` points into any shard's buffer.
  pub fn contains(&self, ptr: *const u8) -> bool {
    self.shards.iter().any(|shard| shard.contains(ptr))
  }
}

impl core::fmt::Debug for ShardedArena<'_, '_> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("ShardedArena")
      .field("shards", &self.shards)
      .field("config", &self.config)
      .finish()
  }
}
