//! The shared region and the handle every core reaches it through.
//!
//! Three structures live in memory visible to all cores: a small header
//! (console lock and init marker), the mailbox array, and the keystroke
//! ring.  On hardware they sit at fixed physical addresses taken from the
//! [`PlatformConfig`]; on a host they are fields of a [`SharedMemory`].
//! Either way, code sees them as a [`SharedState`].
//!
//! Nothing in the region has a usable initial value on hardware.  Exactly
//! one core, the primary, runs [`SharedState::init`] before any other core
//! is started.

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use static_assertions::assert_eq_size;

use crate::arch::smp::{CoreId, MAX_CORES};
use crate::config::PlatformConfig;
use crate::error::{ConfigError, IpcError};
use crate::ipc::mailbox::MailboxArray;
use crate::ipc::ring::RingBuffer;
use crate::sync::spinlock::RawSpinLock;

/// Written last by `init`; "CLNK".
const INIT_MAGIC: u32 = 0x434C_4E4B;

/// First words of the shared region.
#[repr(C)]
pub struct SharedHeader {
    /// Serializes console output between cores.
    console_lock: RawSpinLock,
    magic: AtomicU32,
}

assert_eq_size!(SharedHeader, [u32; 2]);

impl SharedHeader {
    pub const fn new() -> Self {
        Self {
            console_lock: RawSpinLock::new(),
            magic: AtomicU32::new(0),
        }
    }
}

impl Default for SharedHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of the shared region plus the number of cores using it.
#[derive(Clone, Copy)]
pub struct SharedState<'a> {
    header: &'a SharedHeader,
    mailboxes: &'a MailboxArray,
    ring: &'a RingBuffer,
    core_count: u8,
}

impl<'a> SharedState<'a> {
    pub fn from_parts(
        header: &'a SharedHeader,
        mailboxes: &'a MailboxArray,
        ring: &'a RingBuffer,
        core_count: u8,
    ) -> Result<Self, ConfigError> {
        if core_count == 0 || core_count as usize > MAX_CORES {
            return Err(ConfigError::CoreCount(core_count));
        }
        Ok(Self {
            header,
            mailboxes,
            ring,
            core_count,
        })
    }

    /// Run the init-before-use pass: console lock free, every mailbox
    /// empty, ring empty, and finally the init marker published.
    ///
    /// Only while no other core is running.
    pub fn init(&self) {
        self.header.magic.store(0, Ordering::Relaxed);
        self.header.console_lock.init();
        for core in CoreId::range(MAX_CORES as u8) {
            self.mailboxes.init(core);
        }
        self.ring.init();
        self.header.magic.store(INIT_MAGIC, Ordering::Release);
        log::debug!("shared state initialized for {} cores", self.core_count);
    }

    /// Whether `init` has completed.  Once `true`, everything `init` wrote
    /// is visible to the caller.
    pub fn is_initialized(&self) -> bool {
        self.header.magic.load(Ordering::Acquire) == INIT_MAGIC
    }

    pub fn core_count(&self) -> u8 {
        self.core_count
    }

    /// Every participating core, primary first.
    pub fn cores(&self) -> impl Iterator<Item = CoreId> {
        CoreId::range(self.core_count)
    }

    /// Every participating core except the primary.
    pub fn secondaries(&self) -> impl Iterator<Item = CoreId> {
        self.cores().filter(|core| !core.is_primary())
    }

    /// Fails if `core` is outside the configured core set.
    pub fn check(&self, core: CoreId) -> Result<(), IpcError> {
        if core.raw() < self.core_count {
            Ok(())
        } else {
            Err(IpcError::InvalidCore(u32::from(core.raw())))
        }
    }

    pub fn mailboxes(&self) -> &'a MailboxArray {
        self.mailboxes
    }

    pub fn ring(&self) -> &'a RingBuffer {
        self.ring
    }

    pub fn console_lock(&self) -> &'a RawSpinLock {
        &self.header.console_lock
    }
}

impl SharedState<'static> {
    /// View the region at the addresses in `config`.
    ///
    /// # Safety
    ///
    /// `config.layout` must describe memory that is mapped, shared by all
    /// participating cores, and used for nothing else for the rest of the
    /// program.
    pub unsafe fn from_layout(config: &PlatformConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = &config.layout;
        // SAFETY: validated for alignment and overlap above; the caller
        // guarantees the memory is ours.  Every field is atomic, so any
        // bit pattern found there is a valid value.
        let (header, mailboxes, ring) = unsafe {
            (
                &*(layout.header_base as *const SharedHeader),
                &*(layout.mailbox_base as *const MailboxArray),
                &*(layout.ring_base as *const RingBuffer),
            )
        };
        Self::from_parts(header, mailboxes, ring, config.core_count)
    }
}

impl fmt::Debug for SharedState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("core_count", &self.core_count)
            .field("initialized", &self.is_initialized())
            .field("ring_len", &self.ring.len())
            .finish_non_exhaustive()
    }
}

/// Owned backing for the shared region, for hosts and tests.
///
/// `const`-constructible so it can be a `static` that simulated cores
/// borrow for `'static`.
pub struct SharedMemory {
    header: SharedHeader,
    mailboxes: MailboxArray,
    ring: RingBuffer,
}

impl SharedMemory {
    pub const fn new() -> Self {
        Self {
            header: SharedHeader::new(),
            mailboxes: MailboxArray::new(),
            ring: RingBuffer::new(),
        }
    }

    /// A view for `core_count` cores.  Not initialized yet.
    pub fn state(&self, core_count: u8) -> Result<SharedState<'_>, ConfigError> {
        SharedState::from_parts(&self.header, &self.mailboxes, &self.ring, core_count)
    }
}

impl Default for SharedMemory {
    fn default() -> Self {
        Self::new()
    }
}
