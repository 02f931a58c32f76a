//! Per-core mailboxes - single-slot inboxes in shared memory.
//!
//! Mailbox `n` belongs to core `n`.  Any core may `send` into it; only
//! core `n` should `receive` from it or `clear` it (a convention, not
//! something the memory enforces).
//!
//! Each mailbox walks one state machine under its own lock:
//!
//! ```text
//!   Empty ──send──▶ Ready ──receive──▶ Processing ──clear──▶ Empty
//! ```
//!
//! There is room for exactly one message.  A `send` into anything but an
//! `Empty` mailbox fails with [`IpcError::MailboxFull`] and changes
//! nothing; the sender decides whether to retry, back off or drop.  No
//! operation here blocks beyond the lock's own critical section.

use static_assertions::assert_eq_size;

use crate::arch::smp::{CoreId, MAX_CORES};
use crate::error::IpcError;
use crate::sync::spinlock::SpinLock;

/// Sender field of a mailbox that has never been written.
pub const SENDER_UNKNOWN: u32 = 0xFF;

// ── Message ─────────────────────────────────────────────────────

/// Tag carried alongside the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageKind {
	None = 0,
	/// Liveness probe; answered with `Ack`.
	Ping = 1,
	/// Opaque 32-bit value; answered with `Ack`.
	Data = 2,
	/// Reply to `Ping`, `Data` or `Shutdown`.
	Ack = 3,
	/// Leave the service loop after acknowledging.
	Shutdown = 4,
}

impl MessageKind {
	pub fn from_raw(raw: u32) -> Option<Self> {
		Some(match raw {
			0 => Self::None,
			1 => Self::Ping,
			2 => Self::Data,
			3 => Self::Ack,
			4 => Self::Shutdown,
			_ => return None,
		})
	}
}

/// Where a mailbox is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MailboxStatus {
	/// Free for the next `send`.
	Empty = 0,
	/// Holds a message nobody has taken yet.
	Ready = 1,
	/// Taken by `receive`, waiting for the owner's `clear`.
	Processing = 2,
}

impl MailboxStatus {
	fn from_raw(raw: u32) -> Option<Self> {
		Some(match raw {
			0 => Self::Empty,
			1 => Self::Ready,
			2 => Self::Processing,
			_ => return None,
		})
	}
}

/// A received message: who sent it, its tag, its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
	pub sender: CoreId,
	pub kind: MessageKind,
	pub payload: u32,
}

// ── Mailbox ─────────────────────────────────────────────────────

/// The words behind the lock.  Kept as raw `u32`s: before `init` the
/// memory may hold anything, and every bit pattern must be a valid value.
///
/// `kind`, `payload` and `sender` mean something only while `status` is
/// `Ready` or `Processing`.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
struct Slot {
	kind: u32,
	payload: u32,
	sender: u32,
	status: u32,
	/// Successful sends since `init` (wrapping).  Diagnostic only.
	delivery_count: u32,
}

impl Slot {
	const EMPTY: Slot = Slot {
		kind: MessageKind::None as u32,
		payload: 0,
		sender: SENDER_UNKNOWN,
		status: MailboxStatus::Empty as u32,
		delivery_count: 0,
	};
}

/// One core's inbox: a lock word followed by the slot.
#[repr(transparent)]
pub struct Mailbox {
	slot: SpinLock<Slot>,
}

// Lock word + five slot words; `base + core * 24` addresses mailbox `core`.
assert_eq_size!(Mailbox, [u32; 6]);

impl Mailbox {
	pub const fn new() -> Self {
		Self {
			slot: SpinLock::new(Slot::EMPTY),
		}
	}

	fn init(&self) {
		self.slot.raw().init();
		*self.slot.lock() = Slot::EMPTY;
	}
}

impl Default for Mailbox {
	fn default() -> Self {
		Self::new()
	}
}

/// The mailboxes of all cores, indexed by destination core id.
#[repr(C)]
pub struct MailboxArray {
	boxes: [Mailbox; MAX_CORES],
}

impl MailboxArray {
	pub const fn new() -> Self {
		Self {
			boxes: [const { Mailbox::new() }; MAX_CORES],
		}
	}

	fn mailbox(&self, core: CoreId) -> &Mailbox {
		&self.boxes[core.index()]
	}

	/// Reset `core`'s mailbox to `Empty` with no sender and a zero count.
	///
	/// Part of the init pass: no other core may be using the mailbox.
	pub fn init(&self, core: CoreId) {
		self.mailbox(core).init();
	}

	/// Post a message from `from` into `dest`'s mailbox.
	///
	/// Succeeds only if the mailbox is `Empty`; it then becomes `Ready`,
	/// the delivery count goes up, and a wake is broadcast so a parked
	/// destination re-checks.  Otherwise nothing is touched.
	pub fn send(&self, from: CoreId, dest: CoreId, kind: MessageKind, payload: u32) -> Result<(), IpcError> {
		{
			let mut slot = self.mailbox(dest).slot.lock();
			if slot.status != MailboxStatus::Empty as u32 {
				log::trace!("mailbox {}: send from core {} rejected", dest, from);
				return Err(IpcError::MailboxFull(dest));
			}
			slot.sender = u32::from(from.raw());
			slot.kind = kind as u32;
			slot.payload = payload;
			slot.status = MailboxStatus::Ready as u32;
			slot.delivery_count = slot.delivery_count.wrapping_add(1);
		}

		// The unlock above already broadcast; this one is for the
		// destination specifically having something to read now.
		khal::event::send_event();
		log::trace!("mailbox {}: {:?} {:#x} from core {}", dest, kind, payload, from);
		Ok(())
	}

	/// Take the `Ready` message out of `core`'s mailbox.
	///
	/// The mailbox moves to `Processing`, so the message is handed out
	/// once; it stays occupied until `clear`.  Never blocks waiting for a
	/// message: with nothing `Ready`, returns [`IpcError::NoMessage`].
	pub fn receive(&self, core: CoreId) -> Result<Envelope, IpcError> {
		let mut slot = self.mailbox(core).slot.lock();
		if slot.status != MailboxStatus::Ready as u32 {
			return Err(IpcError::NoMessage(core));
		}

		let sender = u8::try_from(slot.sender).ok().and_then(CoreId::new);
		let kind = MessageKind::from_raw(slot.kind);
		let (Some(sender), Some(kind)) = (sender, kind) else {
			return Err(IpcError::Corrupt(core));
		};

		slot.status = MailboxStatus::Processing as u32;
		Ok(Envelope {
			sender,
			kind,
			payload: slot.payload,
		})
	}

	/// Return `core`'s mailbox to `Empty`, dropping whatever it held.
	/// Harmless on a mailbox that is already empty.
	pub fn clear(&self, core: CoreId) {
		let mut slot = self.mailbox(core).slot.lock();
		slot.status = MailboxStatus::Empty as u32;
		slot.kind = MessageKind::None as u32;
		slot.payload = 0;
		slot.sender = SENDER_UNKNOWN;
	}

	/// Current state of `core`'s mailbox.  Stale as soon as it returns.
	pub fn status(&self, core: CoreId) -> MailboxStatus {
		let raw = self.mailbox(core).slot.lock().status;
		// Garbage only before init; report it as occupied so nobody sends.
		MailboxStatus::from_raw(raw).unwrap_or(MailboxStatus::Processing)
	}

	/// Successful sends into `core`'s mailbox since it was initialized.
	pub fn delivery_count(&self, core: CoreId) -> u32 {
		self.mailbox(core).slot.lock().delivery_count
	}
}

impl Default for MailboxArray {
	fn default() -> Self {
		Self::new()
	}
}
