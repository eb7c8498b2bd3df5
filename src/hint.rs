//! Target-dependent constants and the busy-wait primitive used by the
//! reservation loop.

/// Granularity every reservation start is rounded to, so two spans handed to
/// different threads never share a cache line.
#[cfg(target_arch = "x86")]
pub const CACHE_LINE_SIZE: usize = 32;
#[cfg(target_arch = "x86_64")]
pub const CACHE_LINE_SIZE: usize = 64;
#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
pub const CACHE_LINE_SIZE: usize = 128;
#[cfg(not(any(
  target_arch = "x86",
  target_arch = "x86_64",
  target_arch = "arm",
  target_arch = "aarch64"
)))]
pub const CACHE_LINE_SIZE: usize = 64;

const _: () = assert!(CACHE_LINE_SIZE.is_power_of_two());

/// Back off briefly after losing a compare-and-swap race.
#[inline(always)]
pub(crate) fn cpu_relax() {
  #[cfg(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "arm",
    target_arch = "aarch64"
  ))]
  {
    // pause / yield
    core::hint::spin_loop();
    core::hint::spin_loop();
    core::hint::spin_loop();
    core::hint::spin_loop();
  }

  #[cfg(any(
    target_arch = "powerpc",
    target_arch = "powerpc64",
    target_arch = "riscv32",
    target_arch = "riscv64"
  ))]
  core::hint::spin_loop();

  #[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "arm",
    target_arch = "aarch64",
    target_arch = "powerpc",
    target_arch = "powerpc64",
    target_arch = "riscv32",
    target_arch = "riscv64"
  )))]
  core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
}
