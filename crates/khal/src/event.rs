//! Wake broadcast and low-power wait.
//!
//! On AArch64 this is the SEV / WFE pair: `send_event` signals every core
//! in the system, `wait_for_event` suspends the calling core until some
//! event arrives.  The signal carries no payload and no address, and WFE
//! may also return for reasons unrelated to SEV, so a woken core always
//! re-checks the condition it was waiting for.
//!
//! Hosted builds have no WFE.  There the wait is a short bounded spin that
//! ends early when the event generation moves; running out of spins is
//! just another spurious wakeup, which callers already tolerate.

use core::sync::atomic::{AtomicU32, Ordering};

/// Number of broadcasts sent since boot (wrapping).  Diagnostic only.
static GENERATION: AtomicU32 = AtomicU32::new(0);

/// Upper bound on spins for one emulated wait.
#[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
const SPURIOUS_WAKE_SPINS: u32 = 4096;

/// Current broadcast generation.
#[inline]
pub fn generation() -> u32 {
    GENERATION.load(Ordering::Acquire)
}

cfg_if::cfg_if! {
    if #[cfg(all(target_arch = "aarch64", target_os = "none"))] {
        use aarch64_cpu::asm::{self, barrier};

        /// Wake every core parked in `wait_for_event`.
        #[inline]
        pub fn send_event() {
            GENERATION.fetch_add(1, Ordering::Release);
            // Prior stores must be complete before any core resumes.
            barrier::dsb(barrier::SY);
            asm::sev();
        }

        /// Suspend this core until an event arrives.
        #[inline]
        pub fn wait_for_event() {
            asm::wfe();
        }
    } else {
        /// Wake every core parked in `wait_for_event`.
        #[inline]
        pub fn send_event() {
            GENERATION.fetch_add(1, Ordering::Release);
        }

        /// Spin until the generation moves or the spin budget runs out.
        #[inline]
        pub fn wait_for_event() {
            let seen = GENERATION.load(Ordering::Acquire);
            for _ in 0..SPURIOUS_WAKE_SPINS {
                if GENERATION.load(Ordering::Acquire) != seen {
                    return;
                }
                core::hint::spin_loop();
            }
        }
    }
}
