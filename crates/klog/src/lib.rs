//! Kernel logging subsystem.
//!
//! Levelled, coloured diagnostics written to whatever console was
//! registered with `init`.  The same sink also backs the `log` facade, so
//! library code can use `log::debug!` and friends.
#![no_std]

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicU8, Ordering};

use khal::console::{Console, Writer};
use spin::{Mutex, Once};

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => " INFO",
            Level::Warn => " WARN",
            Level::Error => "ERROR",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Level::Trace => "\x1b[90m", // Gray
            Level::Debug => "\x1b[36m", // Cyan
            Level::Info => "\x1b[32m",  // Green
            Level::Warn => "\x1b[33m",  // Yellow
            Level::Error => "\x1b[31m", // Red
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Level::Trace,
            1 => Level::Debug,
            2 => Level::Info,
            3 => Level::Warn,
            _ => Level::Error,
        }
    }
}

impl From<::log::Level> for Level {
    fn from(level: ::log::Level) -> Self {
        match level {
            ::log::Level::Trace => Level::Trace,
            ::log::Level::Debug => Level::Debug,
            ::log::Level::Info => Level::Info,
            ::log::Level::Warn => Level::Warn,
            ::log::Level::Error => Level::Error,
        }
    }
}

impl From<Level> for ::log::LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => ::log::LevelFilter::Trace,
            Level::Debug => ::log::LevelFilter::Debug,
            Level::Info => ::log::LevelFilter::Info,
            Level::Warn => ::log::LevelFilter::Warn,
            Level::Error => ::log::LevelFilter::Error,
        }
    }
}

/// Where log lines go.  Unset until `init`; output before that is dropped.
static SINK: Once<&'static dyn Console> = Once::new();

/// Keeps one log line from interleaving with another.
static SINK_LOCK: Mutex<()> = Mutex::new(());

static MAX_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Bridges the `log` facade onto the same sink.
struct Bridge;

static BRIDGE: Bridge = Bridge;

impl ::log::Log for Bridge {
    fn enabled(&self, metadata: &::log::Metadata) -> bool {
        enabled(metadata.level().into())
    }

    fn log(&self, record: &::log::Record) {
        log(
            record.level().into(),
            format_args!("{}: {}", record.target(), record.args()),
        );
    }

    fn flush(&self) {}
}

/// Initialize the kernel logger with its output console.
///
/// Only the first call registers a sink; later calls are ignored.
pub fn init(sink: &'static dyn Console) {
    SINK.call_once(|| sink);
    // Fails only if some other logger got there first, which leaves our
    // own macros working regardless.
    let _ = ::log::set_logger(&BRIDGE);
    ::log::set_max_level(max_level().into());
}

/// Set the most verbose level that is still printed.
pub fn set_level(level: Level) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
    ::log::set_max_level(level.into());
}

pub fn max_level() -> Level {
    Level::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

/// Whether a message at `level` would be printed.
pub fn enabled(level: Level) -> bool {
    level >= max_level() && SINK.get().is_some()
}

/// Log a message with a specific level
pub fn log(level: Level, args: fmt::Arguments) {
    if !enabled(level) {
        return;
    }
    let Some(sink) = SINK.get() else { return };
    let _guard = SINK_LOCK.lock();
    sink.write_str(level.color());
    sink.write_str("[");
    sink.write_str(level.as_str());
    sink.write_str("]\x1b[0m ");
    let _ = Writer(*sink).write_fmt(args);
    sink.write_str("\n");
}

/// Print to the sink without formatting
pub fn print(args: fmt::Arguments) {
    let Some(sink) = SINK.get() else { return };
    let _guard = SINK_LOCK.lock();
    let _ = Writer(*sink).write_fmt(args);
}

/// Log at TRACE level
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Trace, format_args!($($arg)*))
    };
}

/// Log at DEBUG level
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Debug, format_args!($($arg)*))
    };
}

/// Log at INFO level
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Info, format_args!($($arg)*))
    };
}

/// Log at WARN level
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Warn, format_args!($($arg)*))
    };
}

/// Log at ERROR level
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log($crate::Level::Error, format_args!($($arg)*))
    };
}

/// Print without newline
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::print(format_args!($($arg)*))
    };
}

/// Print with newline
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => {{
        $crate::print(format_args!($($arg)*));
        $crate::print(format_args!("\n"));
    }};
}
