//! PSCI firmware interface.
//!
//! Secondary cores are started by asking the firmware (EL2/EL3) to power
//! them on at an entry address.  The call returns a signed status code:
//! zero on success, a negative PSCI error otherwise.

use core::fmt;

/// `CPU_ON`, SMC64 calling convention.
pub const PSCI_CPU_ON: u32 = 0xC400_0003;

/// Status code for a successful call.
pub const PSCI_SUCCESS: i32 = 0;

/// The error codes PSCI defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PsciError {
    NotSupported = -1,
    InvalidParameters = -2,
    Denied = -3,
    AlreadyOn = -4,
    OnPending = -5,
    InternalFailure = -6,
    NotPresent = -7,
    Disabled = -8,
    InvalidAddress = -9,
}

impl PsciError {
    /// Decode a raw status; `None` for success or an unknown code.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => Self::NotSupported,
            -2 => Self::InvalidParameters,
            -3 => Self::Denied,
            -4 => Self::AlreadyOn,
            -5 => Self::OnPending,
            -6 => Self::InternalFailure,
            -7 => Self::NotPresent,
            -8 => Self::Disabled,
            -9 => Self::InvalidAddress,
            _ => return None,
        })
    }

    /// The raw status code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSupported => "NOT_SUPPORTED",
            Self::InvalidParameters => "INVALID_PARAMETERS",
            Self::Denied => "DENIED",
            Self::AlreadyOn => "ALREADY_ON",
            Self::OnPending => "ON_PENDING",
            Self::InternalFailure => "INTERNAL_FAILURE",
            Self::NotPresent => "NOT_PRESENT",
            Self::Disabled => "DISABLED",
            Self::InvalidAddress => "INVALID_ADDRESS",
        }
    }
}

impl fmt::Display for PsciError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw status code as returned by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(pub i32);

impl Status {
    pub const fn is_success(self) -> bool {
        self.0 == PSCI_SUCCESS
    }

    /// The PSCI error this status stands for, if it is a known one.
    pub fn error(self) -> Option<PsciError> {
        PsciError::from_code(self.0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error() {
            Some(err) => write!(f, "{} ({})", self.0, err),
            None if self.is_success() => f.write_str("0 (SUCCESS)"),
            None => write!(f, "{} (UNKNOWN)", self.0),
        }
    }
}

/// A firmware service able to start a halted core.
pub trait Firmware: Sync {
    /// What the started core begins executing: a physical address on
    /// hardware, something richer in a simulation.
    type Entry: Clone;

    /// Power `target` on and start it at `entry`.  Returns the firmware
    /// status code (0 = success, negative = PSCI error).
    fn cpu_on(&self, target: u8, entry: Self::Entry) -> i32;
}

/// How PSCI calls reach the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conduit {
    /// Hypervisor call, firmware at EL2 (QEMU `virt` with virtualization).
    Hvc,
    /// Secure monitor call, firmware at EL3 (TF-A on real boards).
    Smc,
}

/// PSCI over HVC or SMC.
#[derive(Debug, Clone, Copy)]
pub struct Psci {
    conduit: Conduit,
}

impl Psci {
    pub const fn new(conduit: Conduit) -> Self {
        Self { conduit }
    }

    pub const fn conduit(&self) -> Conduit {
        self.conduit
    }

    #[allow(unused_variables)]
    fn call(&self, function: u32, arg0: u64, arg1: u64, arg2: u64) -> i64 {
        cfg_if::cfg_if! {
            if #[cfg(all(target_arch = "aarch64", target_os = "none"))] {
                let mut x0 = u64::from(function);
                // SAFETY: PSCI calls only clobber x0-x3 per SMCCC; the
                // firmware owns the target core's state, not ours.
                unsafe {
                    match self.conduit {
                        Conduit::Hvc => core::arch::asm!(
                            "hvc #0",
                            inout("x0") x0,
                            inout("x1") arg0 => _,
                            inout("x2") arg1 => _,
                            inout("x3") arg2 => _,
                            options(nostack)
                        ),
                        Conduit::Smc => core::arch::asm!(
                            "smc #0",
                            inout("x0") x0,
                            inout("x1") arg0 => _,
                            inout("x2") arg1 => _,
                            inout("x3") arg2 => _,
                            options(nostack)
                        ),
                    }
                }
                x0 as i64
            } else {
                i64::from(PsciError::NotSupported.code())
            }
        }
    }
}

impl Firmware for Psci {
    type Entry = usize;

    fn cpu_on(&self, target: u8, entry: usize) -> i32 {
        self.call(PSCI_CPU_ON, u64::from(target), entry as u64, 0) as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_every_defined_error() {
        for code in -9..=-1 {
            let err = PsciError::from_code(code).unwrap();
            assert_eq!(err.code(), code);
        }
        assert_eq!(PsciError::from_code(0), None);
        assert_eq!(PsciError::from_code(-10), None);
    }

    #[test]
    fn status_reports_success_and_errors() {
        assert!(Status(0).is_success());
        assert_eq!(Status(-4).error(), Some(PsciError::AlreadyOn));
        assert_eq!(Status(-42).error(), None);
    }

    #[cfg(not(all(target_arch = "aarch64", target_os = "none")))]
    #[test]
    fn hosted_psci_is_not_supported() {
        let psci = Psci::new(Conduit::Hvc);
        assert_eq!(psci.cpu_on(1, 0x4008_0000), PsciError::NotSupported.code());
    }
}
