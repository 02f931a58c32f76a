// =============================================================================
// CoreLink - Inter-Core Communication
// =============================================================================
//
// A fixed set of cores share one physical memory region and no scheduler
// mediates between them.  This crate is the only code that reasons about
// that sharing:
//
//   sync::spinlock  - binary lock with acquire/release ordering; releasing
//                     it broadcasts a wake event
//   ipc::mailbox    - one single-slot inbox per core, each behind its own lock
//   ipc::ring       - lock-free single-producer / single-consumer byte queue
//   arch::smp       - core ids, firmware bring-up, park / wake idiom
//   shared          - the handle through which every core reaches the region
//   service         - the loop a secondary core runs once it is up
//   scenario        - the primary core's bring-up and exchange plan
//
// Waiting is cooperative: a core parks in a low-power wait and, because
// the wake is an untargeted broadcast, re-checks its own condition every
// time it resumes.  Nothing here has a timeout; lock acquisition and
// "wait until available" loops block for as long as the peer takes.
// =============================================================================

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod arch;
pub mod config;
pub mod error;
pub mod ipc;
pub mod scenario;
pub mod service;
pub mod shared;
pub mod sync;
pub mod util;

#[cfg(any(test, feature = "std"))]
pub mod sim;

pub use arch::smp::{Core, CoreId, CoreMask, MAX_CORES};
pub use config::{MemoryLayout, PlatformConfig};
pub use error::{BringUpError, ConfigError, IpcError, RingError};
pub use ipc::mailbox::{Envelope, MailboxArray, MailboxStatus, MessageKind};
pub use ipc::ring::{RingBuffer, RING_BUFFER_SIZE};
pub use shared::{SharedMemory, SharedState};
pub use sync::spinlock::{RawSpinLock, SpinLock, SpinLockGuard};

pub use khal::console::Console;
