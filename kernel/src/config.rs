//! Platform description.
//!
//! Where the UART and the shared region live, how many cores take part,
//! and how to reach the firmware.  The two supported boards get a preset;
//! the `rpi5` feature picks which one is [`PlatformConfig::DEFAULT`].

use core::mem::size_of;
use core::ops::Range;

use khal::mmio::RawMmio;
use khal::pl011::Pl011;
use khal::psci::{Conduit, Psci};

use crate::arch::smp::{CoreId, MAX_CORES};
use crate::error::ConfigError;
use crate::ipc::mailbox::{Mailbox, MailboxArray};
use crate::ipc::ring::RingBuffer;
use crate::shared::SharedHeader;

/// Physical addresses of the three shared structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
	/// Console lock and init magic.
	pub header_base: usize,
	/// `MAX_CORES` mailboxes, back to back.
	pub mailbox_base: usize,
	/// The keystroke ring.
	pub ring_base: usize,
}

impl MemoryLayout {
	/// The region both boards use, just past the kernel image.
	pub const DEFAULT: MemoryLayout = MemoryLayout {
		header_base: 0x4022_0000,
		mailbox_base: 0x4022_0100,
		ring_base: 0x4022_0200,
	};

	/// Address of `core`'s mailbox.
	pub const fn mailbox_addr(&self, core: CoreId) -> usize {
		self.mailbox_base + core.index() * size_of::<Mailbox>()
	}

	fn header(&self) -> Range<usize> {
		self.header_base..self.header_base + size_of::<SharedHeader>()
	}

	fn mailboxes(&self) -> Range<usize> {
		self.mailbox_base..self.mailbox_base + size_of::<MailboxArray>()
	}

	fn ring(&self) -> Range<usize> {
		self.ring_base..self.ring_base + size_of::<RingBuffer>()
	}
}

/// Everything board-specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformConfig {
	pub name: &'static str,
	/// PL011 register base.
	pub uart_base: usize,
	/// PL011 reference clock.
	pub uart_clock_hz: u32,
	pub baud_rate: u32,
	/// Cores taking part, the primary included.
	pub core_count: u8,
	pub layout: MemoryLayout,
	/// How PSCI calls reach the firmware.
	pub conduit: Conduit,
}

impl PlatformConfig {
	/// QEMU `virt` machine, `-smp 4`, firmware behind HVC.
	pub const QEMU_VIRT: PlatformConfig = PlatformConfig {
		name: "qemu-virt",
		uart_base: 0x0900_0000,
		uart_clock_hz: 24_000_000,
		baud_rate: 115_200,
		core_count: 4,
		layout: MemoryLayout::DEFAULT,
		conduit: Conduit::Hvc,
	};

	/// Raspberry Pi 5, debug UART through the RP1, TF-A at EL3.
	pub const RPI5: PlatformConfig = PlatformConfig {
		name: "rpi5",
		uart_base: 0x4003_0000,
		uart_clock_hz: 48_000_000,
		baud_rate: 115_200,
		core_count: 4,
		layout: MemoryLayout::DEFAULT,
		conduit: Conduit::Smc,
	};

	#[cfg(feature = "rpi5")]
	pub const DEFAULT: PlatformConfig = Self::RPI5;
	#[cfg(not(feature = "rpi5"))]
	pub const DEFAULT: PlatformConfig = Self::QEMU_VIRT;

	/// Same board, fewer cores.
	pub const fn with_cores(mut self, core_count: u8) -> Self {
		self.core_count = core_count;
		self
	}

	/// The board's UART, programmed for `baud_rate`.
	///
	/// # Safety
	///
	/// `uart_base` must be the mapped PL011 of the board this runs on.
	pub unsafe fn console(&self) -> Pl011<RawMmio> {
		// SAFETY: forwarded to the caller.
		let uart = Pl011::new(unsafe { RawMmio::new(self.uart_base) });
		uart.init(self.uart_clock_hz, self.baud_rate);
		uart
	}

	/// PSCI through this board's conduit.
	pub const fn firmware(&self) -> Psci {
		Psci::new(self.conduit)
	}

	/// Check the core count and that the shared regions are aligned and
	/// disjoint.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.core_count == 0 || self.core_count as usize > MAX_CORES {
			return Err(ConfigError::CoreCount(self.core_count));
		}

		let layout = &self.layout;
		let regions = [
			("shared header", layout.header()),
			("mailbox array", layout.mailboxes()),
			("ring buffer", layout.ring()),
		];

		for (region, range) in &regions {
			if range.start % 4 != 0 {
				return Err(ConfigError::Misaligned {
					region: *region,
					addr: range.start,
				});
			}
		}

		for (i, (first, a)) in regions.iter().enumerate() {
			for (second, b) in &regions[i + 1..] {
				if a.start < b.end && b.start < a.end {
					return Err(ConfigError::Overlap {
						first: *first,
						second: *second,
					});
				}
			}
		}

		Ok(())
	}
}

impl Default for PlatformConfig {
	fn default() -> Self {
		Self::DEFAULT
	}
}
