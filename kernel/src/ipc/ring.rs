//! Single-producer / single-consumer byte ring in shared memory.
//!
//! One core only ever calls `put`, one other core only ever calls `get`.
//! Under that contract no lock is needed: the producer owns `head`, the
//! consumer owns `tail`, and each only reads the other's index.
//!
//! One slot always stays unused so that `head == tail` means empty and
//! `(head + 1) & MASK == tail` means full.  A `RingBuffer<C>` therefore
//! holds at most `C - 1` bytes.
//!
//! Neither side blocks.  A full ring refuses the byte and the producer
//! decides whether to retry or drop; an empty ring reports `Empty` and the
//! consumer decides whether to park.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use static_assertions::const_assert_eq;

use crate::error::RingError;

/// Slots in the ring that lives in shared memory.
pub const RING_BUFFER_SIZE: usize = 256;

/// A byte FIFO of `C` slots; `C` must be a power of two.
#[repr(C)]
pub struct RingBuffer<const C: usize = RING_BUFFER_SIZE> {
    /// Next slot the producer writes.  Written only by the producer.
    head: AtomicU32,
    /// Next slot the consumer reads.  Written only by the consumer.
    tail: AtomicU32,
    data: [AtomicU8; C],
}

const_assert_eq!(core::mem::size_of::<RingBuffer>(), 8 + RING_BUFFER_SIZE);

impl<const C: usize> RingBuffer<C> {
    const MASK: u32 = {
        assert!(C.is_power_of_two() && C >= 2, "ring capacity must be a power of two");
        assert!(C <= u32::MAX as usize);
        (C - 1) as u32
    };

    pub const fn new() -> Self {
        Self {
            head: AtomicU32::new(0),
            tail: AtomicU32::new(0),
            data: [const { AtomicU8::new(0) }; C],
        }
    }

    /// Reset to empty.  Stale bytes in `data` are left alone.
    ///
    /// Init pass only: neither side may be running.
    pub fn init(&self) {
        self.head.store(0, Ordering::Relaxed);
        self.tail.store(0, Ordering::Relaxed);
    }

    /// Append one byte.  Producer side only.
    pub fn put(&self, byte: u8) -> Result<(), RingError> {
        let head = self.head.load(Ordering::Relaxed) & Self::MASK;
        let next = (head + 1) & Self::MASK;
        if next == self.tail.load(Ordering::Acquire) & Self::MASK {
            return Err(RingError::Full);
        }
        self.data[head as usize].store(byte, Ordering::Relaxed);
        // The byte must be visible before the consumer sees the new head.
        self.head.store(next, Ordering::Release);
        Ok(())
    }

    /// Remove the oldest byte.  Consumer side only.
    pub fn get(&self) -> Result<u8, RingError> {
        let tail = self.tail.load(Ordering::Relaxed) & Self::MASK;
        if tail == self.head.load(Ordering::Acquire) & Self::MASK {
            return Err(RingError::Empty);
        }
        let byte = self.data[tail as usize].load(Ordering::Relaxed);
        // Hand the slot back only after we've read it.
        self.tail.store((tail + 1) & Self::MASK, Ordering::Release);
        Ok(byte)
    }

    /// Bytes currently queued.  Exact only from the producer or consumer
    /// while the other side is idle.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head.wrapping_sub(tail) & Self::MASK) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Most bytes the ring can hold at once: `C - 1`.
    pub const fn capacity(&self) -> usize {
        Self::MASK as usize
    }
}

impl<const C: usize> Default for RingBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}
