//! C ABI over [`Arena`] and [`ShardedArena`].
//!
//! Handles are opaque heap objects created and destroyed through this
//! module. Every fallible function returns a [`MonobufStatus`] and writes
//! its result through an out-pointer. The header is generated into
//! `include/monobuf.h` at build time.

use alloc::{
  boxed::Box,
  vec::Vec,
};
use core::{
  ptr::{
    self,
    NonNull,
  },
  slice,
};

use crate::{
  arena::{
    Arena,
    Reservation,
  },
  config::{
    ShardedConfig,
    UnboundPolicy,
  },
  error::ArenaError,
  sharded::ShardedArena,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonobufStatus {
  Ok = 0,
  InvalidArgument = -1,
  OutOfMemory = -2,
}

impl From<&ArenaError> for MonobufStatus {
  fn from(err: &ArenaError) -> Self {
    match err {
      ArenaError::InvalidArgument(_) => MonobufStatus::InvalidArgument,
      ArenaError::OutOfMemory { .. } => MonobufStatus::OutOfMemory,
    }
  }
}

impl<T> From<Result<T, ArenaError>> for MonobufStatus {
  fn from(result: Result<T, ArenaError>) -> Self {
    match result {
      Ok(_) => MonobufStatus::Ok,
      Err(err) => (&err).into(),
    }
  }
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct MonobufSpan {
  pub ptr: *mut u8,
  pub len: usize,
}

impl From<Reservation<'_>> for MonobufSpan {
  fn from(reservation: Reservation<'_>) -> Self {
    MonobufSpan {
      ptr: reservation.as_ptr(),
      len: reservation.len(),
    }
  }
}

/// Opaque single arena handle.
pub struct MonobufArena {
  arena: Arena<'static>,
}

/// Opaque sharded arena handle.
pub struct MonobufSharded {
  sharded: ShardedArena<'static, 'static>,
}

fn write_span(out: *mut MonobufSpan, result: Result<Reservation<'_>, ArenaError>) -> MonobufStatus {
  match result {
    Ok(reservation) => {
      // SAFETY: out checked non-null by callers
      unsafe { out.write(reservation.into()) };
      MonobufStatus::Ok
    }
    Err(err) => (&err).into(),
  }
}

/// Create an arena over `len` bytes at `buffer`.
///
/// # Safety
///
/// `buffer` must stay valid for `len` bytes until the arena is freed and
/// every span it produced is no longer used. `out` must be writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn monobuf_arena_new(
  buffer: *mut u8,
  len: usize,
  out: *mut *mut MonobufArena,
) -> MonobufStatus {
  if out.is_null() {
    return MonobufStatus::InvalidArgument;
  }
  let Some(base) = NonNull::new(buffer) else {
    unsafe { out.write(ptr::null_mut()) };
    return MonobufStatus::InvalidArgument;
  };
  // SAFETY: upheld by the caller
  let arena = unsafe { Arena::from_raw_parts(base, len) };
  let handle = Box::into_raw(Box::new(MonobufArena { arena }));
  unsafe { out.write(handle) };
  MonobufStatus::Ok
}

/// # Safety
///
/// `arena` must come from [`monobuf_arena_new`], not be freed already, and
/// not be referenced by a live sharded arena. Null is ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn monobuf_arena_free(arena: *mut MonobufArena) {
  if !arena.is_null() {
    drop(unsafe { Box::from_raw(arena) });
  }
}

/// # Safety
///
/// `arena` must be a live handle and `out` writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn monobuf_arena_reserve(
  arena: *const MonobufArena,
  element_size: usize,
  element_align: usize,
  count: usize,
  out: *mut MonobufSpan,
) -> MonobufStatus {
  if arena.is_null() || out.is_null() {
    return MonobufStatus::InvalidArgument;
  }
  let arena = unsafe { &(*arena).arena };
  write_span(out, arena.reserve(element_size, element_align, count))
}

/// Bytes consumed so far, padding included. Zero for a null handle.
///
/// # Safety
///
/// `arena` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn monobuf_arena_used(arena: *const MonobufArena) -> usize {
  if arena.is_null() {
    return 0;
  }
  unsafe { (*arena).arena.used() }
}

/// Create a sharded arena over `len` arena handles.
///
/// With `fallback_to_first`, threads that never bound route to shard 0;
/// otherwise their reservations fail with `InvalidArgument`.
///
/// # Safety
///
/// `shards` must point to `len` handle pointers; every non-null one must
/// outlive the sharded arena. `out` must be writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn monobuf_sharded_new(
  shards: *const *const MonobufArena,
  len: usize,
  fallback_to_first: bool,
  out: *mut *mut MonobufSharded,
) -> MonobufStatus {
  if out.is_null() || (shards.is_null() && len != 0) {
    return MonobufStatus::InvalidArgument;
  }
  let handles: &[*const MonobufArena] = if len == 0 {
    &[]
  } else {
    unsafe { slice::from_raw_parts(shards, len) }
  };
  let arenas: Vec<Option<&'static Arena<'static>>> = handles
    .iter()
    .map(|&handle| unsafe { handle.as_ref() }.map(|h| &h.arena))
    .collect();

  let policy = if fallback_to_first {
    UnboundPolicy::FirstShard
  } else {
    UnboundPolicy::Reject
  };
  let config = ShardedConfig::new().with_unbound_policy(policy);

  match ShardedArena::try_from_options(arenas, config) {
    Ok(sharded) => {
      let handle = Box::into_raw(Box::new(MonobufSharded { sharded }));
      unsafe { out.write(handle) };
      MonobufStatus::Ok
    }
    Err(err) => {
      unsafe { out.write(ptr::null_mut()) };
      (&err).into()
    }
  }
}

/// # Safety
///
/// `sharded` must come from [`monobuf_sharded_new`] and not be freed
/// already. Null is ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn monobuf_sharded_free(sharded: *mut MonobufSharded) {
  if !sharded.is_null() {
    drop(unsafe { Box::from_raw(sharded) });
  }
}

/// Bind the calling thread to `shard`.
///
/// # Safety
///
/// `sharded` must be a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn monobuf_sharded_bind(
  sharded: *const MonobufSharded,
  shard: usize,
) -> MonobufStatus {
  if sharded.is_null() {
    return MonobufStatus::InvalidArgument;
  }
  unsafe { (*sharded).sharded.bind(shard) }.into()
}

/// # Safety
///
/// `sharded` must be a live handle and `out` writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn monobuf_sharded_reserve(
  sharded: *const MonobufSharded,
  element_size: usize,
  element_align: usize,
  count: usize,
  out: *mut MonobufSpan,
) -> MonobufStatus {
  if sharded.is_null() || out.is_null() {
    return MonobufStatus::InvalidArgument;
  }
  let sharded = unsafe { &(*sharded).sharded };
  write_span(out, sharded.reserve(element_size, element_align, count))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::AlignedBuffer;

  fn new_arena(buffer: &mut AlignedBuffer) -> *mut MonobufArena {
    let mut handle = ptr::null_mut();
    let status =
      unsafe { monobuf_arena_new(buffer.as_uninit_mut().as_mut_ptr().cast(), buffer.len(), &mut handle) };
    assert_eq!(status, MonobufStatus::Ok);
    handle
  }

  fn empty_span() -> MonobufSpan {
    MonobufSpan {
      ptr: ptr::null_mut(),
      len: 0,
    }
  }

  #[test]
  fn arena_round_trip() {
    let mut buffer = AlignedBuffer::new(1024);
    let arena = new_arena(&mut buffer);
    let mut span = empty_span();

    unsafe {
      assert_eq!(monobuf_arena_reserve(arena, 4, 4, 10, &mut span), MonobufStatus::Ok);
      assert_eq!(span.ptr as *const u8, buffer.as_ptr());
      assert_eq!(span.len, 40);
      assert_eq!(monobuf_arena_used(arena), 40);

      assert_eq!(
        monobuf_arena_reserve(arena, 4, 4, 300, &mut span),
        MonobufStatus::OutOfMemory
      );
      assert_eq!(
        monobuf_arena_reserve(arena, 4, 4, 0, &mut span),
        MonobufStatus::InvalidArgument
      );
      monobuf_arena_free(arena);
    }
  }

  #[test]
  fn null_arguments_rejected() {
    let mut stale = AlignedBuffer::new(64);
    let mut handle = new_arena(&mut stale);
    let previous = handle;
    let mut span = empty_span();
    unsafe {
      assert_eq!(
        monobuf_arena_new(ptr::null_mut(), 16, &mut handle),
        MonobufStatus::InvalidArgument
      );
      assert!(handle.is_null());
      monobuf_arena_free(previous);
      assert_eq!(
        monobuf_arena_reserve(ptr::null(), 4, 4, 1, &mut span),
        MonobufStatus::InvalidArgument
      );
      assert_eq!(monobuf_arena_used(ptr::null()), 0);
      monobuf_arena_free(ptr::null_mut());
      monobuf_sharded_free(ptr::null_mut());
    }
  }

  #[test]
  fn sharded_rejects_empty_and_null() {
    let mut buffer = AlignedBuffer::new(256);
    let arena = new_arena(&mut buffer);
    let mut sharded = ptr::null_mut();

    unsafe {
      assert_eq!(
        monobuf_sharded_new(ptr::null(), 0, false, &mut sharded),
        MonobufStatus::InvalidArgument
      );
      let shards = [arena as *const MonobufArena, ptr::null()];
      assert_eq!(
        monobuf_sharded_new(shards.as_ptr(), shards.len(), false, &mut sharded),
        MonobufStatus::InvalidArgument
      );
      assert!(sharded.is_null());
      monobuf_arena_free(arena);
    }
  }

  #[test]
  fn sharded_binding() {
    let mut buf_a = AlignedBuffer::new(256);
    let mut buf_b = AlignedBuffer::new(256);
    let a = new_arena(&mut buf_a);
    let b = new_arena(&mut buf_b);
    let shards = [a as *const MonobufArena, b as *const MonobufArena];
    let mut sharded = ptr::null_mut();
    let mut span = empty_span();

    unsafe {
      assert_eq!(
        monobuf_sharded_new(shards.as_ptr(), shards.len(), false, &mut sharded),
        MonobufStatus::Ok
      );
      assert_eq!(
        monobuf_sharded_reserve(sharded, 8, 8, 1, &mut span),
        MonobufStatus::InvalidArgument
      );
      assert_eq!(monobuf_sharded_bind(sharded, 2), MonobufStatus::InvalidArgument);
      assert_eq!(monobuf_sharded_bind(sharded, 1), MonobufStatus::Ok);
      assert_eq!(monobuf_sharded_reserve(sharded, 8, 8, 1, &mut span), MonobufStatus::Ok);
      assert_eq!(span.ptr as *const u8, buf_b.as_ptr());
      assert_eq!(monobuf_arena_used(a), 0);

      monobuf_sharded_free(sharded);
      monobuf_arena_free(a);
      monobuf_arena_free(b);
    }
  }

  #[test]
  fn sharded_fallback_routes_unbound_to_first() {
    let mut buf_a = AlignedBuffer::new(256);
    let mut buf_b = AlignedBuffer::new(256);
    let a = new_arena(&mut buf_a);
    let b = new_arena(&mut buf_b);
    let shards = [a as *const MonobufArena, b as *const MonobufArena];
    let mut sharded = ptr::null_mut();
    let mut span = empty_span();

    unsafe {
      assert_eq!(
        monobuf_sharded_new(shards.as_ptr(), shards.len(), true, &mut sharded),
        MonobufStatus::Ok
      );
      assert_eq!(monobuf_sharded_reserve(sharded, 4, 4, 4, &mut span), MonobufStatus::Ok);
      assert_eq!(span.ptr as *const u8, buf_a.as_ptr());
      assert_eq!(span.len, 16);
      assert_eq!(monobuf_arena_used(a), 16);
      assert_eq!(monobuf_arena_used(b), 0);

      monobuf_sharded_free(sharded);
      monobuf_arena_free(a);
      monobuf_arena_free(b);
    }
  }
}
