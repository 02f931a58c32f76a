//! Random operation sequences against the mailbox array, checked step by
//! step against a plain model of the Empty → Ready → Processing → Empty
//! state machine.

use corelink::{CoreId, Envelope, IpcError, MailboxArray, MailboxStatus, MessageKind, MAX_CORES};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Send { from: u8, dest: u8, kind: MessageKind, payload: u32 },
    Receive(u8),
    Clear(u8),
}

fn arb_kind() -> impl Strategy<Value = MessageKind> {
    prop_oneof![
        Just(MessageKind::Ping),
        Just(MessageKind::Data),
        Just(MessageKind::Ack),
        Just(MessageKind::Shutdown),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    let core = 0..MAX_CORES as u8;
    prop_oneof![
        (core.clone(), core.clone(), arb_kind(), any::<u32>())
            .prop_map(|(from, dest, kind, payload)| Op::Send { from, dest, kind, payload }),
        core.clone().prop_map(Op::Receive),
        core.prop_map(Op::Clear),
    ]
}

#[derive(Default, Clone, Copy)]
struct ModelBox {
    message: Option<Envelope>,
    taken: bool,
    deliveries: u32,
}

impl ModelBox {
    fn status(&self) -> MailboxStatus {
        match (self.message, self.taken) {
            (None, _) => MailboxStatus::Empty,
            (Some(_), false) => MailboxStatus::Ready,
            (Some(_), true) => MailboxStatus::Processing,
        }
    }
}

fn id(n: u8) -> CoreId {
    CoreId::new(n).unwrap()
}

proptest! {
    #[test]
    fn mailboxes_match_the_model(ops in proptest::collection::vec(arb_op(), 1..200)) {
        let boxes = MailboxArray::new();
        for n in 0..MAX_CORES as u8 {
            boxes.init(id(n));
        }
        let mut model = [ModelBox::default(); MAX_CORES];

        for op in ops {
            match op {
                Op::Send { from, dest, kind, payload } => {
                    let slot = &mut model[dest as usize];
                    let expected = if slot.status() == MailboxStatus::Empty {
                        slot.message = Some(Envelope { sender: id(from), kind, payload });
                        slot.taken = false;
                        slot.deliveries += 1;
                        Ok(())
                    } else {
                        Err(IpcError::MailboxFull(id(dest)))
                    };
                    prop_assert_eq!(boxes.send(id(from), id(dest), kind, payload), expected);
                }
                Op::Receive(core) => {
                    let slot = &mut model[core as usize];
                    let expected = match (slot.message, slot.taken) {
                        (Some(envelope), false) => {
                            slot.taken = true;
                            Ok(envelope)
                        }
                        _ => Err(IpcError::NoMessage(id(core))),
                    };
                    prop_assert_eq!(boxes.receive(id(core)), expected);
                }
                Op::Clear(core) => {
                    let slot = &mut model[core as usize];
                    slot.message = None;
                    slot.taken = false;
                    boxes.clear(id(core));
                }
            }

            for n in 0..MAX_CORES as u8 {
                prop_assert_eq!(boxes.status(id(n)), model[n as usize].status());
                prop_assert_eq!(boxes.delivery_count(id(n)), model[n as usize].deliveries);
            }
        }
    }

    #[test]
    fn a_rejected_send_changes_nothing(
        first in any::<u32>(),
        second in any::<u32>(),
        taken in any::<bool>(),
    ) {
        let boxes = MailboxArray::new();
        boxes.init(id(2));
        boxes.send(id(1), id(2), MessageKind::Data, first).unwrap();
        if taken {
            boxes.receive(id(2)).unwrap();
        }
        let status = boxes.status(id(2));

        prop_assert_eq!(
            boxes.send(id(3), id(2), MessageKind::Ping, second),
            Err(IpcError::MailboxFull(id(2)))
        );
        prop_assert_eq!(boxes.status(id(2)), status);
        prop_assert_eq!(boxes.delivery_count(id(2)), 1);
        if !taken {
            let envelope = boxes.receive(id(2)).unwrap();
            prop_assert_eq!((envelope.sender, envelope.payload), (id(1), first));
        }
    }
}
