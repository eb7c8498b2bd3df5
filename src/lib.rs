//! Lock-free bump arenas over caller-supplied buffers.
//!
//! The crate provides a single-buffer [`Arena`] that any number of threads
//! can reserve spans from concurrently, a [`ShardedArena`] that routes each
//! thread to one of several arenas, and the typed [`ArenaAllocator`] handle
//! that generic containers hold. Nothing is ever freed individually: the
//! memory goes away with the buffer it was carved from.
//!
//! With the `allocator` feature (nightly) the handle also implements
//! [`core::alloc::Allocator`].

#![cfg_attr(feature = "allocator", feature(allocator_api))]
#![allow(clippy::mut_from_ref)]

extern crate alloc;

pub mod adapter;
pub mod arena;
pub mod buffer;
pub mod config;
pub mod error;
pub mod ffi;
mod hint;
mod layout;
pub mod sharded;

pub use adapter::{
  ArenaAllocator,
  Resource,
};
pub use arena::{
  Arena,
  Reservation,
};
pub use buffer::AlignedBuffer;
pub use config::{
  ShardedConfig,
  UnboundPolicy,
};
pub use error::{
  ArenaError,
  ErrorKind,
  InvalidArgument,
};
pub use hint::CACHE_LINE_SIZE;
pub use sharded::ShardedArena;
