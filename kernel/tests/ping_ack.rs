//! Two cores on two threads: A pings B, B acks A.

use std::sync::Mutex;
use std::thread;

use corelink::{Console, Core, CoreId, Envelope, IpcError, MessageKind, SharedMemory, SpinLock};

/// Swallows output; never has input.
struct NullConsole;

impl Console for NullConsole {
    fn write_byte(&self, _: u8) {}

    fn read_byte_available(&self) -> bool {
        false
    }

    fn read_byte(&self) -> u8 {
        0
    }
}

/// Poll our mailbox, parking between polls, until something arrives.
fn wait_for_message(core: &Core<'_>) -> Envelope {
    loop {
        match core.receive() {
            Ok(envelope) => return envelope,
            Err(IpcError::NoMessage(_)) => core.park(),
            Err(err) => panic!("receive failed: {err}"),
        }
    }
}

#[test]
fn ping_is_acked_with_the_core_id_added() {
    let memory = SharedMemory::new();
    let shared = memory.state(2).unwrap();
    shared.init();

    let a = Core::new(CoreId::PRIMARY, shared, &NullConsole).unwrap();
    let b = Core::new(CoreId::new(1).unwrap(), shared, &NullConsole).unwrap();

    thread::scope(|s| {
        s.spawn(move || {
            let ping = wait_for_message(&b);
            assert_eq!(ping, Envelope { sender: a.id(), kind: MessageKind::Ping, payload: 0x1001 });
            b.clear();
            let ack = ping.payload + (u32::from(b.id().raw()) << 16);
            while let Err(IpcError::MailboxFull(_)) = b.send(ping.sender, MessageKind::Ack, ack) {
                b.park();
            }
        });

        a.send(b.id(), MessageKind::Ping, 0x1001).unwrap();
        let ack = wait_for_message(&a);
        a.clear();
        assert_eq!(ack, Envelope { sender: b.id(), kind: MessageKind::Ack, payload: 0x0001_1001 });
    });

    assert_eq!(shared.mailboxes().delivery_count(CoreId::new(1).unwrap()), 1);
    assert_eq!(shared.mailboxes().delivery_count(CoreId::PRIMARY), 1);
}

#[test]
fn many_senders_one_mailbox_nothing_lost() {
    const PER_SENDER: u32 = 500;

    let memory = SharedMemory::new();
    let shared = memory.state(4).unwrap();
    shared.init();
    let cores: Vec<Core<'_>> = (0..4)
        .map(|n| Core::new(CoreId::new(n).unwrap(), shared, &NullConsole).unwrap())
        .collect();
    let seen = Mutex::new(Vec::new());

    thread::scope(|s| {
        for sender in &cores[1..] {
            s.spawn(move || {
                for n in 0..PER_SENDER {
                    let payload = (u32::from(sender.id().raw()) << 16) | n;
                    while sender.send(CoreId::PRIMARY, MessageKind::Data, payload).is_err() {
                        sender.park();
                    }
                }
            });
        }

        let receiver = cores[0];
        let seen = &seen;
        s.spawn(move || {
            for _ in 0..3 * PER_SENDER {
                let envelope = wait_for_message(&receiver);
                receiver.clear();
                assert_eq!(envelope.payload >> 16, u32::from(envelope.sender.raw()));
                seen.lock().unwrap().push(envelope.payload);
            }
        });
    });

    let mut seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 3 * PER_SENDER as usize);
    // Each sender's messages arrive in the order it sent them.
    for sender in 1..4u32 {
        let mine: Vec<u32> = seen.iter().filter(|p| *p >> 16 == sender).map(|p| p & 0xFFFF).collect();
        assert_eq!(mine, (0..PER_SENDER).collect::<Vec<_>>());
    }
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 3 * PER_SENDER as usize);
}

#[test]
fn spinlock_serializes_four_cores() {
    const ROUNDS: u64 = 10_000;
    let counter = SpinLock::new((0u64, 0u64));

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..ROUNDS {
                    let mut guard = counter.lock();
                    // Both halves move together or the lock leaked.
                    guard.0 += 1;
                    guard.1 += 1;
                    assert_eq!(guard.0, guard.1);
                }
            });
        }
    });

    assert_eq!(*counter.lock(), (4 * ROUNDS, 4 * ROUNDS));
}
