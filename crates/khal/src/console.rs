//! Byte console capability.
//!
//! The inter-core layer never drives a UART directly.  Diagnostic and
//! test code writes through this trait, and the keystroke producer core
//! polls it for input.

use core::fmt;

/// A blocking byte-oriented console device.
///
/// Implementations must be shareable between cores: every method takes
/// `&self`, and callers that need whole lines to stay together serialize
/// through a lock of their own.
pub trait Console: Sync {
    /// Write one byte, blocking until the device accepts it.
    fn write_byte(&self, byte: u8);

    /// Returns `true` if at least one received byte is waiting.
    fn read_byte_available(&self) -> bool;

    /// Read one byte, blocking until one arrives.
    fn read_byte(&self) -> u8;

    /// Write a string, expanding `\n` to `\r\n` for serial terminals.
    fn write_str(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
    }

    /// Non-blocking read: `None` if nothing has been received.
    fn try_read_byte(&self) -> Option<u8> {
        if self.read_byte_available() {
            Some(self.read_byte())
        } else {
            None
        }
    }
}

/// Adapts any console to `core::fmt::Write`.
pub struct Writer<'a, C: ?Sized>(pub &'a C);

impl<C: Console + ?Sized> fmt::Write for Writer<'_, C> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}
