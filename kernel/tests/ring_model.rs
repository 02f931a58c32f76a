//! The SPSC ring against a `VecDeque` holding at most `C - 1` bytes.

use std::collections::VecDeque;

use corelink::{RingBuffer, RingError, RING_BUFFER_SIZE};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Put(u8),
    Get,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![any::<u8>().prop_map(Op::Put), Just(Op::Get)]
}

proptest! {
    #[test]
    fn small_ring_is_a_bounded_fifo(ops in proptest::collection::vec(arb_op(), 1..500)) {
        let ring = RingBuffer::<16>::new();
        let mut model = VecDeque::new();

        for op in ops {
            match op {
                Op::Put(byte) => {
                    let expected = if model.len() < 15 {
                        model.push_back(byte);
                        Ok(())
                    } else {
                        Err(RingError::Full)
                    };
                    prop_assert_eq!(ring.put(byte), expected);
                }
                Op::Get => {
                    prop_assert_eq!(ring.get(), model.pop_front().ok_or(RingError::Empty));
                }
            }
            prop_assert_eq!(ring.len(), model.len());
        }
    }

    #[test]
    fn shared_ring_keeps_order_across_wraps(chunks in proptest::collection::vec(1usize..300, 1..20)) {
        let ring: RingBuffer = RingBuffer::new();
        let mut next_in = 0u8;
        let mut next_out = 0u8;

        for chunk in chunks {
            for _ in 0..chunk {
                if ring.put(next_in).is_err() {
                    break;
                }
                next_in = next_in.wrapping_add(1);
            }
            prop_assert!(ring.len() <= RING_BUFFER_SIZE - 1);
            while let Ok(byte) = ring.get() {
                prop_assert_eq!(byte, next_out);
                next_out = next_out.wrapping_add(1);
            }
            prop_assert_eq!(next_in, next_out);
        }
    }
}

#[test]
fn full_ring_holds_capacity_minus_one() {
    let ring: RingBuffer = RingBuffer::new();
    assert_eq!(ring.capacity(), RING_BUFFER_SIZE - 1);
    for n in 0..RING_BUFFER_SIZE - 1 {
        assert_eq!(ring.put(n as u8), Ok(()));
    }
    assert_eq!(ring.put(0), Err(RingError::Full));
    assert_eq!(ring.get(), Ok(0));
}
