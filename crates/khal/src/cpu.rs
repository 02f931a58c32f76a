//! Core identity and halting.

/// Affinity level 0 of the calling core (0 = primary).
///
/// Hosted builds have no MPIDR and always report the primary core; code
/// that runs several simulated cores carries the id explicitly instead.
#[inline]
pub fn core_id() -> u8 {
    cfg_if::cfg_if! {
        if #[cfg(all(target_arch = "aarch64", target_os = "none"))] {
            use aarch64_cpu::registers::{Readable, MPIDR_EL1};
            (MPIDR_EL1.get() & 0xFF) as u8
        } else {
            0
        }
    }
}

/// Park this core for good.
///
/// Used after a fatal error; the core keeps answering nothing.
pub fn halt_forever() -> ! {
    loop {
        crate::event::wait_for_event();
    }
}
