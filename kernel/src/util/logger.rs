// =============================================================================
// CoreLink - Per-Core Console Output (kprint! / kprintln!)
// =============================================================================
//
// Cores print through their `Core` handle.  Output goes to the console
// the handle was built with, under the console lock that lives in the
// shared header, so a line from one core is never spliced into a line
// from another.
//
// WHY NOT klog?
//   klog is for diagnostics: levels, colours, its own lock.  kprint! is the
//   program's actual output (test verdicts, echoed keystrokes), and it has
//   to share a lock with every core, including cores that never saw klog's
//   statics.  The console lock sits in shared memory for exactly that.
//
// USAGE:
//   kprintln!(core, "[PASS] core {} acked", id);
//   kprint!(core, "{}", byte as char);
//
// Each call takes the lock once.  The ORDER of lines from different cores
// is still non-deterministic.
//
// =============================================================================

/// Prints formatted text through a [`Core`](crate::Core) handle.
///
/// # Examples
/// ```
/// use std::sync::Mutex;
/// use corelink::{kprint, Console, Core, CoreId, SharedMemory};
///
/// struct Capture(Mutex<Vec<u8>>);
///
/// impl Console for Capture {
///     fn write_byte(&self, byte: u8) {
///         self.0.lock().unwrap().push(byte);
///     }
///     fn read_byte_available(&self) -> bool {
///         false
///     }
///     fn read_byte(&self) -> u8 {
///         0
///     }
/// }
///
/// let memory = SharedMemory::new();
/// let shared = memory.state(1).unwrap();
/// shared.init();
/// let console = Capture(Mutex::new(Vec::new()));
/// let core = Core::new(CoreId::PRIMARY, shared, &console).unwrap();
///
/// kprint!(core, "Loading");
/// kprint!(core, "...");
/// assert_eq!(console.0.lock().unwrap().as_slice(), b"Loading...");
/// ```
#[macro_export]
macro_rules! kprint {
    ($core:expr, $($arg:tt)*) => {
        $core.print(format_args!($($arg)*))
    };
}

/// Prints formatted text followed by a newline; the whole line is written
/// under one hold of the console lock.
#[macro_export]
macro_rules! kprintln {
    ($core:expr) => {
        $crate::kprint!($core, "\n")
    };
    ($core:expr, $($arg:tt)*) => {
        $crate::kprint!($core, "{}\n", format_args!($($arg)*))
    };
}
