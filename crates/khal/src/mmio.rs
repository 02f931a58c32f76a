//! Memory-mapped register access.
//!
//! Device drivers take an `Mmio` implementation instead of a raw base
//! address, so register traffic can be observed in tests.

use core::ptr;

/// 32-bit register window of a memory-mapped device.
///
/// Every access has a side effect on the device; implementations must
/// never cache, merge or reorder them.
pub trait Mmio: Sync {
    /// Read the register at `offset` bytes from the window base.
    fn read32(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset` bytes from the window base.
    fn write32(&self, offset: usize, value: u32);
}

/// Volatile accesses at a fixed physical (identity-mapped) address.
#[derive(Debug, Clone, Copy)]
pub struct RawMmio {
    base: usize,
}

impl RawMmio {
    /// Create a register window at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the address of a device register block that stays
    /// mapped for the lifetime of the returned value, and every offset
    /// later passed to `read32`/`write32` must be a valid, 4-byte aligned
    /// register of that device.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Base address of the window.
    pub const fn base(&self) -> usize {
        self.base
    }
}

impl Mmio for RawMmio {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: upheld by the contract of `RawMmio::new`.
        unsafe { ptr::read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write32(&self, offset: usize, value: u32) {
        // SAFETY: upheld by the contract of `RawMmio::new`.
        unsafe { ptr::write_volatile((self.base + offset) as *mut u32, value) }
    }
}
