//! Overflow-checked rounding arithmetic for reservation planning.

/// Greatest common divisor.
const fn gcd(mut a: usize, mut b: usize) -> usize {
  while b != 0 {
    let t = a % b;
    a = b;
    b = t;
  }
  a
}

/// Distance between consecutive elements so each one is individually
/// aligned: `lcm(size, align)`. Both arguments must be non-zero.
pub(crate) fn stride(size: usize, align: usize) -> Option<usize> {
  debug_assert!(size != 0 && align != 0);
  (size / gcd(size, align)).checked_mul(align)
}

/// Smallest multiple of `multiple` that is `>= value`.
pub(crate) fn round_up(value: usize, multiple: usize) -> Option<usize> {
  debug_assert!(multiple != 0);
  match value % multiple {
    0 => Some(value),
    rem => value.checked_add(multiple - rem),
  }
}

/// Smallest `o >= offset` such that `base + o` is a multiple of `align`.
///
/// `align` must be a power of two.
pub(crate) fn align_offset(base: usize, offset: usize, align: usize) -> Option<usize> {
  debug_assert!(align.is_power_of_two());
  let addr = base.checked_add(offset)?;
  let aligned = addr.checked_add(align - 1)? & !(align - 1);
  Some(aligned - base)
}
