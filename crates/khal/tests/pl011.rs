//! PL011 driver against a register-file fake.
use std::sync::atomic::{AtomicU32, Ordering};

use khal::console::{Console, Writer};
use khal::mmio::Mmio;
use khal::pl011::{Pl011, FR_RXFE, FR_TXFF};
use spin::Mutex;

const FR: usize = 0x18;

/// Registers as plain words plus a log of every write, in order.
struct FakeRegs {
    regs: [AtomicU32; 32],
    writes: Mutex<Vec<(usize, u32)>>,
    rx: Mutex<Vec<u8>>,
}

impl FakeRegs {
    fn new() -> Self {
        Self {
            regs: std::array::from_fn(|_| AtomicU32::new(0)),
            writes: Mutex::new(Vec::new()),
            rx: Mutex::new(Vec::new()),
        }
    }

    fn set_flags(&self, flags: u32) {
        self.regs[FR / 4].store(flags, Ordering::SeqCst);
    }

    fn data_writes(&self) -> Vec<u8> {
        self.writes
            .lock()
            .iter()
            .filter(|(off, _)| *off == 0)
            .map(|(_, v)| *v as u8)
            .collect()
    }
}

impl Mmio for FakeRegs {
    fn read32(&self, offset: usize) -> u32 {
        if offset == 0 {
            let mut rx = self.rx.lock();
            let byte = if rx.is_empty() { 0 } else { rx.remove(0) };
            if rx.is_empty() {
                self.set_flags(FR_RXFE);
            }
            return u32::from(byte);
        }
        self.regs[offset / 4].load(Ordering::SeqCst)
    }

    fn write32(&self, offset: usize, value: u32) {
        self.writes.lock().push((offset, value));
        if offset != 0 {
            self.regs[offset / 4].store(value, Ordering::SeqCst);
        }
    }
}

#[test]
fn init_programs_divisors_and_enables() {
    let uart = Pl011::new(FakeRegs::new());
    uart.init(48_000_000, 115_200);

    let writes = uart.regs().writes.lock().clone();
    assert_eq!(writes.first(), Some(&(0x30, 0)), "UART disabled first");
    assert!(writes.contains(&(0x24, 26)));
    assert!(writes.contains(&(0x28, 3)));
    assert_eq!(writes.last(), Some(&(0x30, 0x301)), "UART, TX and RX enabled last");
}

#[test]
fn write_str_expands_newlines() {
    let uart = Pl011::new(FakeRegs::new());
    uart.write_str("ok\n");
    assert_eq!(uart.regs().data_writes(), b"ok\r\n");
}

#[test]
fn fmt_writer_goes_through_the_console() {
    use core::fmt::Write;

    let uart = Pl011::new(FakeRegs::new());
    write!(Writer(&uart), "{:#06x}", 0x1001).unwrap();
    assert_eq!(uart.regs().data_writes(), b"0x1001");
}

#[test]
fn receive_follows_the_fifo_empty_flag() {
    let uart = Pl011::new(FakeRegs::new());
    uart.regs().set_flags(FR_RXFE);
    assert!(!uart.read_byte_available());
    assert_eq!(uart.try_read_byte(), None);

    uart.regs().rx.lock().extend_from_slice(b"hi");
    uart.regs().set_flags(0);
    assert_eq!(uart.try_read_byte(), Some(b'h'));
    assert_eq!(uart.read_byte(), b'i');
    assert!(!uart.read_byte_available());
}

#[test]
fn transmit_waits_for_fifo_space() {
    let uart = std::sync::Arc::new(Pl011::new(FakeRegs::new()));
    uart.regs().set_flags(FR_TXFF);

    let writer = {
        let uart = uart.clone();
        std::thread::spawn(move || uart.write_byte(b'x'))
    };
    std::thread::sleep(std::time::Duration::from_millis(20));
    assert!(uart.regs().data_writes().is_empty(), "must not write while full");

    uart.regs().set_flags(0);
    writer.join().unwrap();
    assert_eq!(uart.regs().data_writes(), b"x");
}
