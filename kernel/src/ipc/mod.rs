//! Inter-core messaging.
//!
//! Two channels with different trade-offs:
//!
//! - [`mailbox`]: one structured message in flight per destination core,
//!   each inbox behind its own spinlock.  Request / acknowledge traffic.
//! - [`ring`]: a lock-free byte queue between exactly one producer core
//!   and one consumer core.  Sustained streams, such as keystrokes.
//!
//! Neither gives any ordering relative to the other, or across different
//! mailboxes.

pub mod mailbox;
pub mod ring;
