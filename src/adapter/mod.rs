//! Typed allocator handle over an arena.
//!
//! [`ArenaAllocator`] is what containers hold: a copyable reference to an
//! arena plus an element type. Two handles compare equal when they point at
//! the same arena, whatever their element types.

use core::{
  fmt,
  marker::PhantomData,
  mem,
  ptr::NonNull,
};

use crate::{
  arena::{
    Arena,
    Reservation,
  },
  error::{
    ArenaError,
    InvalidArgument,
  },
  sharded::ShardedArena,
};

/// Something that can reserve arena spans.
pub trait Resource {
  fn reserve(
    &self,
    element_size: usize,
    element_align: usize,
    count: usize,
  ) -> Result<Reservation<'_>, ArenaError>;
}

impl Resource for Arena<'_> {
  fn reserve(
    &self,
    element_size: usize,
    element_align: usize,
    count: usize,
  ) -> Result<Reservation<'_>, ArenaError> {
    Arena::reserve(self, element_size, element_align, count)
  }
}

impl Resource for ShardedArena<'_, '_> {
  fn reserve(
    &self,
    element_size: usize,
    element_align: usize,
    count: usize,
  ) -> Result<Reservation<'_>, ArenaError> {
    ShardedArena::reserve(self, element_size, element_align, count)
  }
}

pub struct ArenaAllocator<'a, T, R: ?Sized> {
  resource: &'a R,
  _marker: PhantomData<fn() -> T>,
}

impl<'a, T, R: Resource + ?Sized> ArenaAllocator<'a, T, R> {
  pub fn new(resource: &'a R) -> Self {
    Self {
      resource,
      _marker: PhantomData,
    }
  }

  pub fn resource(&self) -> &'a R {
    self.resource
  }

  /// The same arena, handing out a different element type.
  pub fn rebind<U>(self) -> ArenaAllocator<'a, U, R> {
    ArenaAllocator::new(self.resource)
  }

  /// Reserve uninitialized storage for `count` values of `T`.
  pub fn allocate(&self, count: usize) -> Result<NonNull<T>, ArenaError> {
    if count == 0 {
      return Err(InvalidArgument::ZeroCount.into());
    }
    if mem::size_of::<T>() == 0 {
      return Ok(NonNull::dangling());
    }
    let reservation = self
      .resource
      .reserve(mem::size_of::<T>(), mem::align_of::<T>(), count)?;
    Ok(reservation.as_non_null().cast())
  }

  /// Does nothing. Arena memory is reclaimed only when the buffer behind
  /// the arena is released by its owner, so individual spans can be
  /// dropped on the floor.
  #[inline]
  pub fn deallocate(&self, _ptr: NonNull<T>, _count: usize) {}
}

impl<T, R: ?Sized> Clone for ArenaAllocator<'_, T, R> {
  fn clone(&self) -> Self {
    *self
  }
}

impl<T, R: ?Sized> Copy for ArenaAllocator<'_, T, R> {}

impl<T, U, R: ?Sized> PartialEq<ArenaAllocator<'_, U, R>> for ArenaAllocator<'_, T, R> {
  fn eq(&self, other: &ArenaAllocator<'_, U, R>) -> bool {
    core::ptr::addr_eq(self.resource, other.resource)
  }
}

impl<T, R: ?Sized> Eq for ArenaAllocator<'_, T, R> {}

impl<T, R: ?Sized> fmt::Debug for ArenaAllocator<'_, T, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ArenaAllocator")
      .field("resource", &(self.resource as *const R))
      .field("element", &core::any::type_name::<T>())
      .finish()
  }
}

impl<'a, 'buf, T> From<&'a Arena<'buf>> for ArenaAllocator<'a, T, Arena<'buf>> {
  fn from(arena: &'a Arena<'buf>) -> Self {
    Self::new(arena)
  }
}

impl<'a, 's, 'buf, T> From<&'a ShardedArena<'s, 'buf>> for ArenaAllocator<'a, T, ShardedArena<'s, 'buf>> {
  fn from(arena: &'a ShardedArena<'s, 'buf>) -> Self {
    Self::new(arena)
  }
}

#[cfg(feature = "allocator")]
mod allocator_api {
  use core::{
    alloc::{
      AllocError,
      Allocator,
      Layout,
    },
    ptr::{
      self,
      NonNull,
    },
  };

  use super::{
    ArenaAllocator,
    Resource,
  };

  unsafe impl<T, R: Resource + ?Sized> Allocator for ArenaAllocator<'_, T, R> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
      if layout.size() == 0 {
        // SAFETY: alignments are non-zero
        let dangling = unsafe { NonNull::new_unchecked(layout.align() as *mut u8) };
        return Ok(NonNull::slice_from_raw_parts(dangling, 0));
      }
      let reservation = self.resource.reserve(layout.size(), layout.align(), 1)?;
      Ok(NonNull::slice_from_raw_parts(
        reservation.as_non_null(),
        layout.size(),
      ))
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}

    unsafe fn shrink(
      &self,
      ptr: NonNull<u8>,
      old_layout: Layout,
      new_layout: Layout,
    ) -> Result<NonNull<[u8]>, AllocError> {
      debug_assert!(new_layout.size() <= old_layout.size());
      if new_layout.align() <= old_layout.align() {
        return Ok(NonNull::slice_from_raw_parts(ptr, new_layout.size()));
      }
      let new_ptr = Allocator::allocate(self, new_layout)?;
      // SAFETY: both spans are valid for new_layout.size() bytes and disjoint
      unsafe {
        ptr::copy_nonoverlapping(
          ptr.as_ptr(),
          new_ptr.as_ptr().cast::<u8>(),
          new_layout.size(),
        );
      }
      Ok(new_ptr)
    }
  }
}
