// =============================================================================
// CoreLink - Host Simulation
// =============================================================================
//
// Runs the whole multi-core program on one machine, one thread per core:
//
//   1. Core 0 initializes the shared region and "powers on" the other
//      cores through ThreadFirmware (each one a thread running its role).
//   2. Core 0 walks the default plan: PING every core, DATA every core,
//      SHUTDOWN every core.
//   3. Meanwhile a line of keystrokes sits in the simulated UART.  Core 1
//      pumps it into the ring buffer, core 2 echoes it back out.
//
// USAGE:
//   corelink-sim            - all four cores
//   corelink-sim 2          - cores 0 and 1 only (no consumer to echo)
//
// Exit status is 0 only if every step passed.
//
// =============================================================================

use std::process::ExitCode;

use corelink::scenario::{self, Setup};
use corelink::service;
use corelink::sim::{BufferConsole, ThreadFirmware};
use corelink::{Core, CoreId, PlatformConfig, SharedMemory, SharedState};
use spin::Once;

/// The shared region, as a static so every core thread can borrow it.
static MEMORY: SharedMemory = SharedMemory::new();

/// The UART: records everything and mirrors it to stdout.
static CONSOLE: BufferConsole = BufferConsole::mirrored();

static FIRMWARE: ThreadFirmware = ThreadFirmware::new();

/// Set once by core 0 before any other core starts.
static SHARED: Once<SharedState<'static>> = Once::new();

static SETUP: Setup<'static> = Setup::DEFAULT;

/// Typed on the simulated keyboard before the run starts.
const KEYSTROKES: &[u8] = b"hello from the keyboard\r";

/// Where every secondary core starts.
fn secondary_entry(id: CoreId) {
    let Some(shared) = SHARED.get() else {
        klog::error!("core {} started before the shared region was set up", id);
        return;
    };
    match Core::new(id, *shared, &CONSOLE) {
        Ok(core) => service::run(&core, SETUP.role(id)),
        Err(err) => klog::error!("core {} cannot run: {}", id, err),
    }
}

fn main() -> ExitCode {
    klog::init(&CONSOLE);

    let mut config = PlatformConfig::DEFAULT;
    if let Some(arg) = std::env::args().nth(1) {
        match arg.parse() {
            Ok(cores) => config = config.with_cores(cores),
            Err(err) => {
                klog::error!("bad core count {:?}: {}", arg, err);
                return ExitCode::FAILURE;
            }
        }
    }
    if let Err(err) = config.validate() {
        klog::error!("{}: {}", config.name, err);
        return ExitCode::FAILURE;
    }

    let shared = match MEMORY.state(config.core_count) {
        Ok(state) => *SHARED.call_once(|| state),
        Err(err) => {
            klog::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    let primary = match Core::new(CoreId::PRIMARY, shared, &CONSOLE) {
        Ok(core) => core,
        Err(err) => {
            klog::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    klog::info!("simulating {} with {} cores", config.name, config.core_count);
    CONSOLE.feed(KEYSTROKES);

    let report = match scenario::run_primary(&primary, &FIRMWARE, secondary_entry, &SETUP) {
        Ok(report) => report,
        Err(err) => {
            klog::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(core) = FIRMWARE.join_all() {
        klog::error!("core {} crashed", core);
        return ExitCode::FAILURE;
    }

    if report.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
