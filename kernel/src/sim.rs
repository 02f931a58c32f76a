//! Host stand-ins for the hardware: threads for cores, a buffer for the
//! UART.
//!
//! Only built with the `std` feature (and for tests).  The inter-core code
//! itself is exactly the code that runs on hardware; what changes is who
//! starts a core and where its bytes go.

use std::collections::VecDeque;
use std::io::Write as _;
use std::string::String;
use std::thread::{self, JoinHandle};
use std::vec::Vec;

use khal::console::Console;
use khal::psci::{Firmware, PsciError, PSCI_SUCCESS};
use spin::Mutex;

use crate::arch::smp::{CoreId, CoreMask};

// ── Console ─────────────────────────────────────────────────────

/// A console that records what is written and serves scripted input.
pub struct BufferConsole {
    output: Mutex<Vec<u8>>,
    input: Mutex<VecDeque<u8>>,
    /// Also copy output to stdout as it is written.
    mirror: bool,
}

impl BufferConsole {
    pub const fn new() -> Self {
        Self {
            output: Mutex::new(Vec::new()),
            input: Mutex::new(VecDeque::new()),
            mirror: false,
        }
    }

    /// Like `new`, but every byte also goes to stdout.
    pub const fn mirrored() -> Self {
        Self {
            output: Mutex::new(Vec::new()),
            input: Mutex::new(VecDeque::new()),
            mirror: true,
        }
    }

    /// Queue bytes as if typed on the keyboard.
    pub fn feed(&self, bytes: &[u8]) {
        self.input.lock().extend(bytes.iter().copied());
    }

    /// Input bytes nobody has read yet.
    pub fn pending_input(&self) -> usize {
        self.input.lock().len()
    }

    /// Everything written so far, lossily decoded.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.lock()).into_owned()
    }
}

impl Default for BufferConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for BufferConsole {
    fn write_byte(&self, byte: u8) {
        self.output.lock().push(byte);
        if self.mirror {
            let _ = std::io::stdout().write_all(&[byte]);
        }
    }

    fn read_byte_available(&self) -> bool {
        !self.input.lock().is_empty()
    }

    fn read_byte(&self) -> u8 {
        loop {
            if let Some(byte) = self.input.lock().pop_front() {
                return byte;
            }
            thread::yield_now();
        }
    }
}

// ── Firmware ────────────────────────────────────────────────────

/// What a simulated core runs: its entry function, given its own id.
pub type SimEntry = fn(CoreId);

/// `CPU_ON` as one thread per core.
///
/// Keeps the firmware's rules: the primary and cores already started are
/// `ALREADY_ON`, ids past `MAX_CORES` are `INVALID_PARAMETERS`.
pub struct ThreadFirmware {
    started: Mutex<CoreMask>,
    threads: Mutex<Vec<(CoreId, JoinHandle<()>)>>,
}

impl ThreadFirmware {
    pub const fn new() -> Self {
        Self {
            started: Mutex::new(CoreMask::CORE0),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Cores started so far, the primary included.
    pub fn started(&self) -> CoreMask {
        *self.started.lock()
    }

    /// Wait for every started core to return.  Reports the first core
    /// whose thread panicked.
    pub fn join_all(&self) -> Result<(), CoreId> {
        let threads = core::mem::take(&mut *self.threads.lock());
        let mut first_panic = None;
        for (core, handle) in threads {
            if handle.join().is_err() && first_panic.is_none() {
                first_panic = Some(core);
            }
        }
        first_panic.map_or(Ok(()), Err)
    }
}

impl Default for ThreadFirmware {
    fn default() -> Self {
        Self::new()
    }
}

impl Firmware for ThreadFirmware {
    type Entry = SimEntry;

    fn cpu_on(&self, target: u8, entry: SimEntry) -> i32 {
        let Some(core) = CoreId::new(target) else {
            return PsciError::InvalidParameters.code();
        };

        let mut started = self.started.lock();
        if started.has(core) {
            return PsciError::AlreadyOn.code();
        }

        let spawned = thread::Builder::new()
            .name(std::format!("core{}", core))
            .spawn(move || entry(core));
        match spawned {
            Ok(handle) => {
                *started |= CoreMask::of(core);
                self.threads.lock().push((core, handle));
                PSCI_SUCCESS
            }
            Err(_) => PsciError::InternalFailure.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU8, Ordering};

    static RAN: AtomicU8 = AtomicU8::new(0);

    fn mark(core: CoreId) {
        RAN.fetch_or(1 << core.index(), Ordering::SeqCst);
    }

    #[test]
    fn starts_each_core_once() {
        let firmware = ThreadFirmware::new();
        assert_eq!(firmware.cpu_on(0, mark), PsciError::AlreadyOn.code());
        assert_eq!(firmware.cpu_on(2, mark), PSCI_SUCCESS);
        assert_eq!(firmware.cpu_on(2, mark), PsciError::AlreadyOn.code());
        assert_eq!(firmware.cpu_on(9, mark), PsciError::InvalidParameters.code());

        assert_eq!(firmware.join_all(), Ok(()));
        assert_eq!(firmware.started(), CoreMask::CORE0 | CoreMask::CORE2);
        assert_ne!(RAN.load(Ordering::SeqCst) & 0b100, 0);
    }

    #[test]
    fn reports_a_panicking_core() {
        fn boom(_: CoreId) {
            panic!("core fault");
        }
        let firmware = ThreadFirmware::new();
        assert_eq!(firmware.cpu_on(3, boom), PSCI_SUCCESS);
        assert_eq!(firmware.join_all(), Err(CoreId::new(3).unwrap()));
    }

    #[test]
    fn console_serves_input_in_order() {
        let console = BufferConsole::new();
        assert_eq!(console.try_read_byte(), None);
        console.feed(b"ab");
        assert_eq!(console.pending_input(), 2);
        assert_eq!(console.read_byte(), b'a');
        assert_eq!(console.try_read_byte(), Some(b'b'));
        assert!(!console.read_byte_available());

        console.write_str("x\n");
        assert_eq!(console.output(), "x\r\n");
    }
}
