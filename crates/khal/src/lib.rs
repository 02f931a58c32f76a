//! Hardware Abstraction Layer.
//!
//! Everything the inter-core layer needs from the machine, expressed as
//! small capabilities so the layer above can run against real registers
//! on a bare-metal target or against software fakes on a host:
//!
//!   - `console` - blocking byte output / polled byte input
//!   - `mmio`    - volatile register access behind a trait
//!   - `pl011`   - ARM PrimeCell UART built on `mmio`
//!   - `event`   - the system-wide wake broadcast and low-power wait
//!   - `cpu`     - current core identity and halting
//!   - `psci`    - firmware call that powers a secondary core on
#![no_std]

pub mod console;
pub mod cpu;
pub mod event;
pub mod mmio;
pub mod pl011;
pub mod psci;

pub use console::Console;
pub use mmio::{Mmio, RawMmio};
pub use pl011::Pl011;
pub use psci::Firmware;
