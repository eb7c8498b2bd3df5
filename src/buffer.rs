//! Owned heap storage for arenas.

use alloc::alloc::{
  Layout,
  alloc,
  dealloc,
};
use core::{
  mem::MaybeUninit,
  ptr::NonNull,
  slice,
};

use crate::{
  arena::Arena,
  error::{
    ArenaError,
    InvalidArgument,
  },
  hint::CACHE_LINE_SIZE,
};

/// Heap buffer whose start sits on a cache-line boundary, so arena offsets
/// and cache-line boundaries coincide.
///
/// The buffer outlives every arena built on it; the borrow checker enforces
/// that through [`AlignedBuffer::arena`].
#[derive(Debug)]
pub struct AlignedBuffer {
  ptr: NonNull<u8>,
  layout: Layout,
}

// SAFETY: the buffer is a uniquely owned heap allocation.
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
  pub fn try_new(capacity: usize) -> Result<Self, ArenaError> {
    Self::try_with_alignment(capacity, CACHE_LINE_SIZE)
  }

  pub fn new(capacity: usize) -> Self {
    Self::try_new(capacity)
      .unwrap_or_else(|_| panic!("Failed to allocate aligned buffer of capacity {}", capacity))
  }

  pub fn try_with_alignment(capacity: usize, align: usize) -> Result<Self, ArenaError> {
    if !align.is_power_of_two() {
      return Err(InvalidArgument::Alignment { align }.into());
    }
    let layout = Layout::from_size_align(capacity, align).map_err(|_| ArenaError::OutOfMemory {
      size: capacity,
      align,
    })?;

    if capacity == 0 {
      // SAFETY: align is a non-zero power of two, checked by Layout.
      let ptr = unsafe { NonNull::new_unchecked(align as *mut u8) };
      return Ok(Self { ptr, layout });
    }

    // SAFETY: layout has non-zero size.
    let raw = unsafe { alloc(layout) };
    let ptr = NonNull::new(raw).ok_or(ArenaError::OutOfMemory {
      size: capacity,
      align,
    })?;
    Ok(Self { ptr, layout })
  }

  pub fn len(&self) -> usize {
    self.layout.size()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn as_ptr(&self) -> *const u8 {
    self.ptr.as_ptr()
  }

  pub fn as_uninit_mut(&mut self) -> &mut [MaybeUninit<u8>] {
    // SAFETY: ptr is valid for len bytes, uniquely borrowed through &mut self.
    unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr().cast(), self.len()) }
  }

  /// Build an arena over the whole buffer.
  pub fn arena(&mut self) -> Arena<'_> {
    Arena::new(self.as_uninit_mut())
  }
}

impl Drop for AlignedBuffer {
  fn drop(&mut self) {
    if self.layout.size() != 0 {
      // SAFETY: allocated in try_with_alignment with this layout.
      unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
  }
}
