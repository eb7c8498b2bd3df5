//! Sharded arena configuration.

use getset::CopyGetters;

/// What a [`ShardedArena`](crate::ShardedArena) does with a reservation from
/// a thread that never called `bind`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnboundPolicy {
  /// Fail with [`InvalidArgument::Unbound`](crate::InvalidArgument::Unbound).
  #[default]
  Reject,
  /// Route the reservation to shard 0.
  FirstShard,
}

/// Options for building a [`ShardedArena`](crate::ShardedArena).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct ShardedConfig {
  unbound_policy: UnboundPolicy,
}

impl ShardedConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_unbound_policy(mut self, policy: UnboundPolicy) -> Self {
    self.unbound_policy = policy;
    self
  }
}
