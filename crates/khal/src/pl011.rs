//! ARM PrimeCell UART (PL011) driver.
//!
//! Polled operation only: the transmit path spins on the FIFO-full flag
//! and the receive path checks the FIFO-empty flag.  No interrupts are
//! enabled, so received bytes never raise a wake event.

use crate::console::Console;
use crate::mmio::Mmio;

// ── Register offsets ──────────────────────────────────────────────

/// Data register.
const DR: usize = 0x00;
/// Flag register.
const FR: usize = 0x18;
/// Integer baud rate divisor.
const IBRD: usize = 0x24;
/// Fractional baud rate divisor.
const FBRD: usize = 0x28;
/// Line control.
const LCRH: usize = 0x2C;
/// Control.
const CR: usize = 0x30;
/// Interrupt mask set/clear.
const IMSC: usize = 0x38;
/// Interrupt clear.
const ICR: usize = 0x44;

// ── Register bits ─────────────────────────────────────────────────

/// FR: transmit FIFO full.
pub const FR_TXFF: u32 = 1 << 5;
/// FR: receive FIFO empty.
pub const FR_RXFE: u32 = 1 << 4;
/// FR: UART busy transmitting.
pub const FR_BUSY: u32 = 1 << 3;

/// LCRH: enable FIFOs.
const LCRH_FEN: u32 = 1 << 4;
/// LCRH: 8-bit words.
const LCRH_WLEN_8: u32 = 0b11 << 5;

/// CR: UART enable, transmit enable, receive enable.
const CR_UARTEN: u32 = 1 << 0;
const CR_TXE: u32 = 1 << 8;
const CR_RXE: u32 = 1 << 9;

/// PL011 driver over a register window.
pub struct Pl011<M> {
    regs: M,
}

impl<M: Mmio> Pl011<M> {
    /// Wrap a register window.  The device is left as the firmware
    /// configured it until `init` is called.
    pub const fn new(regs: M) -> Self {
        Self { regs }
    }

    /// Program the UART for `baud` 8N1 with FIFOs, interrupts masked.
    ///
    /// `clock_hz` is the UART reference clock.  The divisor is computed in
    /// 1/64ths as the PL011 TRM describes.
    pub fn init(&self, clock_hz: u32, baud: u32) {
        // Disable while reprogramming, and wait for any byte in flight.
        self.regs.write32(CR, 0);
        while self.regs.read32(FR) & FR_BUSY != 0 {
            core::hint::spin_loop();
        }

        let (ibrd, fbrd) = divisors(clock_hz, baud);
        self.regs.write32(ICR, 0x7FF);
        self.regs.write32(IBRD, ibrd);
        self.regs.write32(FBRD, fbrd);
        self.regs.write32(LCRH, LCRH_FEN | LCRH_WLEN_8);
        self.regs.write32(IMSC, 0);
        self.regs.write32(CR, CR_UARTEN | CR_TXE | CR_RXE);
    }

    /// Access to the underlying register window.
    pub fn regs(&self) -> &M {
        &self.regs
    }
}

/// Integer and fractional baud divisors for the given clock.
pub fn divisors(clock_hz: u32, baud: u32) -> (u32, u32) {
    if baud == 0 {
        return (0, 0);
    }
    // divisor * 64 = clock * 4 / baud, rounded to nearest
    let scaled = (u64::from(clock_hz) * 8 / u64::from(baud) + 1) / 2;
    ((scaled >> 6) as u32, (scaled & 0x3F) as u32)
}

impl<M: Mmio> Console for Pl011<M> {
    fn write_byte(&self, byte: u8) {
        while self.regs.read32(FR) & FR_TXFF != 0 {
            core::hint::spin_loop();
        }
        self.regs.write32(DR, u32::from(byte));
    }

    fn read_byte_available(&self) -> bool {
        self.regs.read32(FR) & FR_RXFE == 0
    }

    fn read_byte(&self) -> u8 {
        while !self.read_byte_available() {
            core::hint::spin_loop();
        }
        (self.regs.read32(DR) & 0xFF) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::divisors;

    #[test]
    fn divisors_for_common_clocks() {
        // 48 MHz / (16 * 115200) = 26.0416 -> 26 + 3/64
        assert_eq!(divisors(48_000_000, 115_200), (26, 3));
        // 24 MHz / (16 * 115200) = 13.0208 -> 13 + 1/64
        assert_eq!(divisors(24_000_000, 115_200), (13, 1));
    }

    #[test]
    fn zero_baud_is_rejected_quietly() {
        assert_eq!(divisors(48_000_000, 0), (0, 0));
    }
}
