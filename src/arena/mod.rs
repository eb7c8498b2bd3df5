//! Single-buffer concurrent bump arena.

use core::{
  marker::PhantomData,
  mem::{
    self,
    MaybeUninit,
  },
  ptr::NonNull,
  slice,
  sync::atomic::{
    AtomicUsize,
    Ordering,
  },
};

use crossbeam_utils::CachePadded;
use getset::CopyGetters;

use crate::{
  error::{
    ArenaError,
    InvalidArgument,
  },
  hint::{
    CACHE_LINE_SIZE,
    cpu_relax,
  },
  layout,
};

/// A span handed out by [`Arena::reserve`].
///
/// The span is exclusively owned by whoever holds this value and stays valid
/// for as long as the arena's buffer is borrowed, even after the arena itself
/// is dropped. It is deliberately not `Clone`.
#[derive(Debug, CopyGetters)]
pub struct Reservation<'buf> {
  ptr: NonNull<u8>,
  /// Offset of the first element from the start of the buffer.
  #[getset(get_copy = "pub")]
  offset: usize,
  /// Usable bytes, `count * stride`.
  #[getset(get_copy = "pub")]
  len: usize,
  /// Distance between consecutive elements.
  #[getset(get_copy = "pub")]
  stride: usize,
  #[getset(get_copy = "pub")]
  align: usize,
  #[getset(get_copy = "pub")]
  count: usize,
  _buffer: PhantomData<&'buf mut [MaybeUninit<u8>]>,
}

// SAFETY: a reservation is a unique borrow of bytes nobody else can reach.
unsafe impl Send for Reservation<'_> {}
unsafe impl Sync for Reservation<'_> {}

impl<'buf> Reservation<'buf> {
  pub fn as_ptr(&self) -> *mut u8 {
    self.ptr.as_ptr()
  }

  pub fn as_non_null(&self) -> NonNull<u8> {
    self.ptr
  }

  /// Give up the handle in exchange for the raw bytes it covers.
  pub fn into_uninit_bytes(self) -> &'buf mut [MaybeUninit<u8>] {
    // SAFETY: ptr..ptr+len lies inside the borrowed buffer and was reserved
    // for this value only.
    unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr().cast(), self.len) }
  }

  /// View the span as `count` slots of `T`.
  ///
  /// Returns `None` unless `T`'s size equals the stride and its alignment
  /// divides the reservation's alignment.
  pub fn into_uninit_slice<T>(self) -> Option<&'buf mut [MaybeUninit<T>]> {
    if mem::size_of::<T>() != self.stride || self.align % mem::align_of::<T>() != 0 {
      return None;
    }
    // SAFETY: layout checked above, span exclusively owned.
    Some(unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr().cast(), self.count) })
  }
}

/// Fixed-capacity bump arena that any number of threads can reserve from.
///
/// The arena borrows its buffer for `'buf` and never frees, resizes, or
/// reads it. The only shared mutable state is the cursor.
pub struct Arena<'buf> {
  base: NonNull<u8>,
  capacity: usize,
  cursor: CachePadded<AtomicUsize>,
  _buffer: PhantomData<&'buf mut [MaybeUninit<u8>]>,
}

// SAFETY: the cursor is atomic and reserved spans are disjoint, so handing
// the arena to or sharing it between threads cannot alias a span.
unsafe impl Send for Arena<'_> {}
unsafe impl Sync for Arena<'_> {}

impl<'buf> Arena<'buf> {
  pub fn new(buffer: &'buf mut [MaybeUninit<u8>]) -> Self {
    let capacity = buffer.len();
    let base = NonNull::from(buffer).cast::<u8>();
    // SAFETY: the slice borrow covers capacity bytes for 'buf.
    unsafe { Self::from_raw_parts(base, capacity) }
  }

  /// # Safety
  ///
  /// `base` must be valid for reads and writes of `capacity` bytes for all
  /// of `'buf`, and nothing else may access those bytes during that time
  /// except through spans this arena hands out.
  pub unsafe fn from_raw_parts(base: NonNull<u8>, capacity: usize) -> Self {
    tracing::debug!(
      base = ?base,
      capacity,
      cache_line = CACHE_LINE_SIZE,
      "created arena"
    );
    Self {
      base,
      capacity,
      cursor: CachePadded::new(AtomicUsize::new(0)),
      _buffer: PhantomData,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Current cursor. Includes alignment and cache-line padding.
  pub fn used(&self) -> usize {
    self.cursor.load(Ordering::Acquire)
  }

  pub fn remaining(&self) -> usize {
    self.capacity - self.used()
  }

  /// Whether `ptr` points into this arena's buffer.
  pub fn contains(&self, ptr: *const u8) -> bool {
    let start = self.base.as_ptr() as usize;
    let addr = ptr as usize;
    addr >= start && addr - start < self.capacity
  }

  /// Reserve `count` elements of `element_size` bytes, each aligned to
  /// `element_align`.
  ///
  /// The first element sits at the first cache-line boundary at or after the
  /// cursor, rounded up to `element_align` when that is larger. Offsets are
  /// therefore not `round_up(cursor, element_align)`: after
  /// `reserve(4, 4, 10)` a second `reserve(4, 4, 50)` starts at
  /// [`CACHE_LINE_SIZE`], not at 40.
  ///
  /// Lock-free: losing a race against another thread only means replanning
  /// from the newer cursor. A failed call leaves the cursor untouched.
  pub fn reserve(
    &self,
    element_size: usize,
    element_align: usize,
    count: usize,
  ) -> Result<Reservation<'buf>, ArenaError> {
    if count == 0 {
      return Err(InvalidArgument::ZeroCount.into());
    }
    if element_size == 0 {
      return Err(InvalidArgument::ZeroSize.into());
    }
    if !element_align.is_power_of_two() {
      return Err(InvalidArgument::Alignment { align: element_align }.into());
    }

    let requested = element_size.saturating_mul(count);
    let oom = || ArenaError::OutOfMemory {
      size: requested,
      align: element_align,
    };
    let stride = layout::stride(element_size, element_align).ok_or_else(oom)?;

    let mut current = self.cursor.load(Ordering::Relaxed);
    loop {
      let Some((first, end)) = self
        .plan(current, stride, element_align, count)
        .filter(|&(_, end)| end <= self.capacity)
      else {
        tracing::debug!(
          size = requested,
          align = element_align,
          used = current,
          capacity = self.capacity,
          "arena out of memory"
        );
        return Err(oom());
      };

      match self
        .cursor
        .compare_exchange_weak(current, end, Ordering::AcqRel, Ordering::Relaxed)
      {
        Ok(_) => {
          // SAFETY: first < end <= capacity
          let ptr = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(first)) };
          return Ok(Reservation {
            ptr,
            offset: first,
            len: stride * count,
            stride,
            align: element_align,
            count,
            _buffer: PhantomData,
          });
        }
        Err(observed) => {
          current = observed;
          cpu_relax();
        }
      }
    }
  }

  /// Offsets of the first element and of the new cursor for a reservation
  /// starting from `cursor`, or `None` on arithmetic overflow.
  fn plan(&self, cursor: usize, stride: usize, align: usize, count: usize) -> Option<(usize, usize)> {
    let base = self.base.as_ptr() as usize;
    let start = layout::align_offset(base, cursor, CACHE_LINE_SIZE)?;
    let first = layout::align_offset(base, start, align)?;
    let bytes = count.checked_mul(stride)?;
    let end = layout::round_up(first.checked_add(bytes)?, stride)?;
    Some((first, end))
  }

  /// Reserve uninitialized storage for `count` values of `T`.
  pub fn alloc_uninit<T>(&self, count: usize) -> Result<&'buf mut [MaybeUninit<T>], ArenaError> {
    if count == 0 {
      return Err(InvalidArgument::ZeroCount.into());
    }
    if mem::size_of::<T>() == 0 {
      // SAFETY: zero-sized slots need no backing bytes.
      return Ok(unsafe { slice::from_raw_parts_mut(NonNull::dangling().as_ptr(), count) });
    }
    let reservation = self.reserve(mem::size_of::<T>(), mem::align_of::<T>(), count)?;
    reservation.into_uninit_slice::<T>().ok_or(ArenaError::OutOfMemory {
      size: mem::size_of::<T>() * count,
      align: mem::align_of::<T>(),
    })
  }

  /// Copy `src` into freshly reserved storage.
  ///
  /// An empty `src` is a zero-count request and fails with
  /// [`InvalidArgument::ZeroCount`].
  pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> Result<&'buf mut [T], ArenaError> {
    let dst = self.alloc_uninit::<T>(src.len())?;
    for (slot, value) in dst.iter_mut().zip(src) {
      slot.write(*value);
    }
    // SAFETY: every slot was just initialized.
    Ok(unsafe { &mut *(dst as *mut [MaybeUninit<T>] as *mut [T]) })
  }

  /// Release is a no-op: arena memory only goes away with the buffer.
  #[inline]
  pub fn release(&self, _ptr: NonNull<u8>, _size: usize, _align: usize) {}
}

impl core::fmt::Debug for Arena<'_> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Arena")
      .field("base", &self.base)
      .field("capacity", &self.capacity)
      .field("used", &self.used())
      .finish()
  }
}
