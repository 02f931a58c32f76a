//! The loop a secondary core runs once it is up.
//!
//! Every secondary answers its mailbox the same way; what it does between
//! messages depends on its [`Role`]:
//!
//! | Role        | Between messages                                 | Parks |
//! |-------------|--------------------------------------------------|-------|
//! | `Responder` | nothing                                          | yes   |
//! | `Producer`  | moves console input bytes into the ring          | no    |
//! | `Consumer`  | drains the ring and echoes each byte             | when the ring is empty |
//!
//! The producer never parks: a byte arriving on the UART raises no wake
//! event, so a parked producer would only notice input on the next
//! unrelated broadcast.

use crate::arch::smp::{Core, CoreId};
use crate::error::IpcError;
use crate::ipc::mailbox::{Envelope, MessageKind};
use crate::kprintln;

/// What a secondary core does besides answering its mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Responder,
	/// Keystroke source: console input into the ring.
	Producer,
	/// Keystroke sink: ring out to the console.
	Consumer,
}

/// Payload of the `Ack` that `core` sends in reply to `payload`.
#[inline]
pub const fn ack_payload(core: CoreId, payload: u32) -> u32 {
	payload.wrapping_add((core.raw() as u32) << 16)
}

enum Flow {
	Continue,
	Stop,
}

/// Serve `core`'s mailbox in the given role until a `Shutdown` arrives.
///
/// Returns after the `Shutdown` has been acknowledged.
pub fn run(core: &Core<'_>, role: Role) {
	klog::info!("core {} serving as {:?}", core.id(), role);

	loop {
		match core.receive() {
			Ok(envelope) => {
				if let Flow::Stop = handle(core, role, envelope) {
					klog::info!("core {} stopped", core.id());
					return;
				}
				continue;
			}
			Err(IpcError::Corrupt(id)) => {
				klog::warn!("core {}: dropping undecodable message", id);
				core.clear();
			}
			Err(_) => {}
		}

		match role {
			Role::Responder => core.park(),
			Role::Producer => {
				if pump_input(core) == 0 {
					core::hint::spin_loop();
				}
			}
			Role::Consumer => {
				if drain_ring(core) == 0 {
					core.park();
				}
			}
		}
	}
}

fn handle(core: &Core<'_>, role: Role, envelope: Envelope) -> Flow {
	let Envelope { sender, kind, payload } = envelope;
	kprintln!(
		core,
		"[Core {}] RX from Core {} | Type: {} | Data: {:#010X}",
		core.id(),
		sender,
		kind as u32,
		payload
	);

	// Free the slot first so the sender's next message can land while we
	// are still replying.
	core.clear();

	match kind {
		MessageKind::Ping | MessageKind::Data => {
			reply(core, sender, payload);
			Flow::Continue
		}
		MessageKind::Shutdown => {
			match role {
				Role::Producer => flush_input(core),
				Role::Consumer => while drain_ring(core) > 0 {},
				Role::Responder => {}
			}
			reply(core, sender, payload);
			Flow::Stop
		}
		MessageKind::Ack | MessageKind::None => {
			log::debug!("core {}: ignoring {:?} from core {}", core.id(), kind, sender);
			Flow::Continue
		}
	}
}

/// Ack `payload` back to `dest`, waiting out a full mailbox.
fn reply(core: &Core<'_>, dest: CoreId, payload: u32) {
	let ack = ack_payload(core.id(), payload);
	loop {
		match core.send(dest, MessageKind::Ack, ack) {
			Ok(()) => return,
			Err(IpcError::MailboxFull(_)) => core.park(),
			Err(err) => {
				klog::warn!("core {}: ack to core {} dropped: {}", core.id(), dest, err);
				return;
			}
		}
	}
}

/// Move whatever console input is waiting into the ring.  Stops early if
/// the ring fills; the rest stays in the UART.  Returns bytes moved.
fn pump_input(core: &Core<'_>) -> usize {
	let ring = core.shared().ring();
	let mut moved = 0;
	while !ring.is_full() {
		let Some(byte) = core.console().try_read_byte() else { break };
		if core.put(byte).is_err() {
			// Not reachable while we are the only producer.
			log::warn!("core {}: ring full, dropped {:#04x}", core.id(), byte);
			break;
		}
		moved += 1;
	}
	if moved > 0 {
		crate::arch::smp::wake_all();
	}
	moved
}

/// Forward every byte still waiting in the UART, however long the
/// consumer takes to make room.
fn flush_input(core: &Core<'_>) {
	while core.console().read_byte_available() {
		if pump_input(core) == 0 {
			core::hint::spin_loop();
		}
	}
}

/// Echo everything in the ring to the console.  Returns bytes echoed.
fn drain_ring(core: &Core<'_>) -> usize {
	let mut echoed = 0;
	while let Ok(byte) = core.get() {
		match byte {
			b'\r' | b'\n' => core.write_bytes(b"\r\n"),
			_ => core.write_bytes(&[byte]),
		}
		echoed += 1;
	}
	echoed
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::shared::SharedMemory;
	use crate::sim::BufferConsole;
	use std::thread;

	fn id(n: u8) -> CoreId {
		CoreId::new(n).unwrap()
	}

	#[test]
	fn ack_adds_the_core_id_in_the_high_half() {
		assert_eq!(ack_payload(id(1), 0x1001), 0x0001_1001);
		assert_eq!(ack_payload(id(3), 0xDEAD_0300), 0xDEB0_0300);
		assert_eq!(ack_payload(id(2), 0xFFFF_0000), 0x0001_0000);
	}

	#[test]
	fn responder_acks_then_stops() {
		let memory = SharedMemory::new();
		let shared = memory.state(2).unwrap();
		shared.init();
		let console = BufferConsole::new();
		let primary = Core::new(CoreId::PRIMARY, shared, &console).unwrap();
		let secondary = Core::new(id(1), shared, &console).unwrap();

		thread::scope(|s| {
			s.spawn(move || run(&secondary, Role::Responder));

			primary.send(id(1), MessageKind::Ping, 0x1001).unwrap();
			let mut next = || loop {
				if let Ok(envelope) = primary.receive() {
					primary.clear();
					return envelope;
				}
				primary.park();
			};
			let ack = next();
			assert_eq!((ack.sender, ack.kind, ack.payload), (id(1), MessageKind::Ack, 0x0001_1001));

			while primary.send(id(1), MessageKind::Shutdown, 0).is_err() {
				primary.park();
			}
			assert_eq!(next().payload, 0x0001_0000);
		});

		assert!(console.output().contains("[Core 1] RX from Core 0 | Type: 1 | Data: 0x00001001"));
	}

	#[test]
	fn producer_forwards_input_to_consumer() {
		let memory = SharedMemory::new();
		let shared = memory.state(3).unwrap();
		shared.init();
		let console = BufferConsole::new();
		console.feed(b"hi\r");
		let primary = Core::new(CoreId::PRIMARY, shared, &console).unwrap();
		let producer = Core::new(id(1), shared, &console).unwrap();
		let consumer = Core::new(id(2), shared, &console).unwrap();

		thread::scope(|s| {
			s.spawn(move || run(&producer, Role::Producer));
			s.spawn(move || run(&consumer, Role::Consumer));

			// Nothing else prints until the shutdowns go out.
			while !console.output().contains("hi\r\n") {
				primary.park();
			}

			for dest in [id(1), id(2)] {
				while primary.send(dest, MessageKind::Shutdown, 0).is_err() {
					primary.park();
				}
				loop {
					if let Ok(ack) = primary.receive() {
						primary.clear();
						assert_eq!(ack.sender, dest);
						break;
					}
					primary.park();
				}
			}
		});

		assert!(console.output().contains("hi\r\n"));
		assert!(shared.ring().is_empty());
	}

	#[test]
	fn producer_forwards_backlog_larger_than_the_ring_before_stopping() {
		const BACKLOG: usize = 2000;
		assert!(BACKLOG > crate::ipc::ring::RING_BUFFER_SIZE);

		let memory = SharedMemory::new();
		let shared = memory.state(3).unwrap();
		shared.init();
		let console = BufferConsole::new();
		console.feed(&[b'*'; BACKLOG]);
		let primary = Core::new(CoreId::PRIMARY, shared, &console).unwrap();
		let producer = Core::new(id(1), shared, &console).unwrap();
		let consumer = Core::new(id(2), shared, &console).unwrap();

		let wait_ack = |from: CoreId| loop {
			if let Ok(ack) = primary.receive() {
				primary.clear();
				assert_eq!((ack.sender, ack.kind), (from, MessageKind::Ack));
				return;
			}
			primary.park();
		};

		thread::scope(|s| {
			s.spawn(move || run(&consumer, Role::Consumer));

			// The shutdown is already waiting when the producer starts.
			primary.send(id(1), MessageKind::Shutdown, 0).unwrap();
			s.spawn(move || run(&producer, Role::Producer));
			wait_ack(id(1));
			assert_eq!(console.pending_input(), 0);

			while primary.send(id(2), MessageKind::Shutdown, 0).is_err() {
				primary.park();
			}
			wait_ack(id(2));
		});

		let echoed = console.output().bytes().filter(|&b| b == b'*').count();
		assert_eq!(echoed, BACKLOG);
		assert!(shared.ring().is_empty());
	}
}
