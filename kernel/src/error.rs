//! Error types.
//!
//! Every failure in this crate is an ordinary value handed back to the
//! caller.  None of them is fatal: a full mailbox or an empty ring is a
//! normal outcome under contention, and a core that fails to come up does
//! not stop the others.

use khal::psci::Status;
use thiserror::Error;

use crate::arch::smp::CoreId;

/// Mailbox failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IpcError {
	/// The destination still holds an earlier message (`Ready` or
	/// `Processing`).  Retry, back off or drop: the caller decides.
	#[error("mailbox of core {0} is full")]
	MailboxFull(CoreId),
	/// Nothing `Ready` in this core's mailbox.
	#[error("no message for core {0}")]
	NoMessage(CoreId),
	/// A core id outside the configured set.
	#[error("core id {0} is out of range")]
	InvalidCore(u32),
	/// A `Ready` slot whose tag or sender does not decode; only possible if
	/// the region was used before being initialized.
	#[error("mailbox of core {0} holds an undecodable message")]
	Corrupt(CoreId),
}

/// Ring buffer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
	#[error("ring buffer full")]
	Full,
	#[error("ring buffer empty")]
	Empty,
}

/// Secondary core bring-up failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BringUpError {
	/// The firmware refused or failed to start the core.
	#[error("bring-up of core {core} failed, firmware status {status}")]
	Failed { core: CoreId, status: Status },
	/// Cores may only be started once the shared region is initialized.
	#[error("shared state is not initialized")]
	NotInitialized,
}

impl BringUpError {
	/// Raw firmware code, if the firmware was reached at all.
	pub fn code(&self) -> Option<i32> {
		match self {
			Self::Failed { status, .. } => Some(status.0),
			Self::NotInitialized => None,
		}
	}
}

/// Invalid platform description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
	#[error("core count {0} is outside 1..={max}", max = crate::arch::smp::MAX_CORES)]
	CoreCount(u8),
	#[error("{region} at {addr:#x} is not 4-byte aligned")]
	Misaligned { region: &'static str, addr: usize },
	#[error("{first} overlaps {second}")]
	Overlap {
		first: &'static str,
		second: &'static str,
	},
}
