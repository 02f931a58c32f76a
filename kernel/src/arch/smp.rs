//! SMP (Symmetric Multiprocessing) infrastructure.
//!
//! Core identity, the per-core handle every entry task receives, firmware
//! bring-up of secondary cores, and the park / wake idiom.
//!
//! Bring-up happens once per secondary core, at boot, from the primary.
//! There is no teardown: a core runs its service loop until told to shut
//! down and then returns to whoever started it (a parked core on
//! hardware, a finished thread in the simulation).

use core::fmt::{self, Write};

use bitflags::bitflags;
use khal::console::{Console, Writer};
use khal::psci::{Firmware, Status};

use crate::error::{BringUpError, IpcError, RingError};
use crate::ipc::mailbox::{Envelope, MessageKind};
use crate::shared::SharedState;

/// Maximum number of cores supported (Cortex-A76 cluster on the Pi 5).
pub const MAX_CORES: usize = 4;

// ── Core identity ───────────────────────────────────────────────

/// Index of a core, `0..MAX_CORES`.  Core 0 is the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CoreId(u8);

impl CoreId {
	/// The core that boots first and brings up the others.
	pub const PRIMARY: CoreId = CoreId(0);

	/// `None` if `raw` is not below `MAX_CORES`.
	pub const fn new(raw: u8) -> Option<Self> {
		if (raw as usize) < MAX_CORES {
			Some(Self(raw))
		} else {
			None
		}
	}

	/// The calling core, from MPIDR affinity level 0.
	///
	/// Only meaningful on hardware; simulated cores carry their id in
	/// their [`Core`] handle instead.
	pub fn current() -> Self {
		Self(khal::cpu::core_id() % MAX_CORES as u8)
	}

	pub const fn raw(self) -> u8 {
		self.0
	}

	pub const fn index(self) -> usize {
		self.0 as usize
	}

	pub const fn is_primary(self) -> bool {
		self.0 == 0
	}

	/// Cores `0..count`, clamped to `MAX_CORES`.
	pub fn range(count: u8) -> impl Iterator<Item = CoreId> {
		(0..count.min(MAX_CORES as u8)).map(CoreId)
	}
}

impl TryFrom<u32> for CoreId {
	type Error = IpcError;

	fn try_from(raw: u32) -> Result<Self, IpcError> {
		u8::try_from(raw)
			.ok()
			.and_then(CoreId::new)
			.ok_or(IpcError::InvalidCore(raw))
	}
}

impl fmt::Display for CoreId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

bitflags! {
	/// A set of cores, e.g. the ones that came online.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
	pub struct CoreMask: u8 {
		const CORE0 = 1 << 0;
		const CORE1 = 1 << 1;
		const CORE2 = 1 << 2;
		const CORE3 = 1 << 3;
	}
}

impl CoreMask {
	pub fn of(core: CoreId) -> Self {
		Self::from_bits_truncate(1 << core.index())
	}

	pub fn has(self, core: CoreId) -> bool {
		self.contains(Self::of(core))
	}

	/// Members in ascending id order.
	pub fn cores(self) -> impl Iterator<Item = CoreId> {
		CoreId::range(MAX_CORES as u8).filter(move |core| self.has(*core))
	}
}

// ── Per-core handle ─────────────────────────────────────────────

/// What a core's entry task is handed: its own id, the shared region, and
/// the console.
///
/// Every mailbox operation goes through here, so the sender recorded by
/// `send` is always the core that holds the handle.
#[derive(Clone, Copy)]
pub struct Core<'a> {
	id: CoreId,
	shared: SharedState<'a>,
	console: &'a dyn Console,
}

impl<'a> Core<'a> {
	/// Fails if `id` is outside the configured core count.
	pub fn new(id: CoreId, shared: SharedState<'a>, console: &'a dyn Console) -> Result<Self, IpcError> {
		shared.check(id)?;
		Ok(Self { id, shared, console })
	}

	pub fn id(&self) -> CoreId {
		self.id
	}

	pub fn shared(&self) -> SharedState<'a> {
		self.shared
	}

	pub fn console(&self) -> &'a dyn Console {
		self.console
	}

	/// Post `(kind, payload)` into `dest`'s mailbox, signed with our id.
	pub fn send(&self, dest: CoreId, kind: MessageKind, payload: u32) -> Result<(), IpcError> {
		self.shared.check(dest)?;
		self.shared.mailboxes().send(self.id, dest, kind, payload)
	}

	/// Take the message waiting in our own mailbox, if any.
	pub fn receive(&self) -> Result<Envelope, IpcError> {
		self.shared.mailboxes().receive(self.id)
	}

	/// Empty our own mailbox so the next sender can get through.
	pub fn clear(&self) {
		self.shared.mailboxes().clear(self.id)
	}

	/// Producer side of the shared ring.
	pub fn put(&self, byte: u8) -> Result<(), RingError> {
		self.shared.ring().put(byte)
	}

	/// Consumer side of the shared ring.
	pub fn get(&self) -> Result<u8, RingError> {
		self.shared.ring().get()
	}

	/// One low-power wait.  See [`park`].
	pub fn park(&self) {
		park();
	}

	/// Formatted output, serialized against every other core's output.
	pub fn print(&self, args: fmt::Arguments) {
		let lock = self.shared.console_lock();
		lock.acquire();
		let _ = Writer(self.console).write_fmt(args);
		lock.release();
	}

	/// Raw bytes to the console under the console lock.
	pub fn write_bytes(&self, bytes: &[u8]) {
		let lock = self.shared.console_lock();
		lock.acquire();
		for &byte in bytes {
			self.console.write_byte(byte);
		}
		lock.release();
	}
}

impl fmt::Debug for Core<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Core").field("id", &self.id).finish_non_exhaustive()
	}
}

// ── Park / wake ─────────────────────────────────────────────────

/// Suspend this core until some wake broadcast arrives.
///
/// The wake is not addressed to anyone and may also be spurious.  Always
/// call this inside a loop that re-checks what you were waiting for;
/// [`park_until`] is that loop.
#[inline]
pub fn park() {
	khal::event::wait_for_event();
}

/// Park until `ready` returns `true`.  No timeout.
pub fn park_until(mut ready: impl FnMut() -> bool) {
	while !ready() {
		park();
	}
}

/// Park until `ready` returns `true` or `rounds` wakeups have gone by.
/// Returns whether the condition was met.
pub fn park_until_within(rounds: u32, mut ready: impl FnMut() -> bool) -> bool {
	for _ in 0..rounds {
		if ready() {
			return true;
		}
		park();
	}
	ready()
}

/// Wake every parked core.
#[inline]
pub fn wake_all() {
	khal::event::send_event();
}

// ── Bring-up ────────────────────────────────────────────────────

/// Ask the firmware to start `core` at `entry`.
pub fn bring_up<F: Firmware>(firmware: &F, core: CoreId, entry: F::Entry) -> Result<(), BringUpError> {
	let status = Status(firmware.cpu_on(core.raw(), entry));
	if status.is_success() {
		Ok(())
	} else {
		Err(BringUpError::Failed { core, status })
	}
}

/// Start every secondary core in the shared state's core set.
///
/// The shared region must already be initialized: mailboxes and ring are
/// set up before any secondary core can look at them.  A core that fails
/// to start is logged and skipped.  Returns the cores that are online,
/// the primary included.
pub fn bring_up_secondaries<F: Firmware>(
	firmware: &F,
	shared: &SharedState<'_>,
	entry: F::Entry,
) -> Result<CoreMask, BringUpError> {
	if !shared.is_initialized() {
		return Err(BringUpError::NotInitialized);
	}

	let mut online = CoreMask::of(CoreId::PRIMARY);
	for core in shared.secondaries() {
		match bring_up(firmware, core, entry.clone()) {
			Ok(()) => {
				klog::info!("SMP: core {} started", core);
				online |= CoreMask::of(core);
			}
			Err(err) => klog::warn!("SMP: {}", err),
		}
	}

	klog::info!("SMP: {} of {} cores online", online.bits().count_ones(), shared.core_count());
	Ok(online)
}
