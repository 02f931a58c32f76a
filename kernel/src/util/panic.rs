// =============================================================================
// CoreLink - Panic Handler
// =============================================================================
//
// Only compiled with the `panic-handler` feature, for bare-metal images
// that have no other handler.
//
// A panic on any core is FATAL for that core: it reports and halts.  The
// other cores keep running; one that waits on the dead core's mailbox
// waits forever, which is what a caller without a retry budget signed up
// for.
//
// The report goes through klog rather than the shared console lock.  If
// the panicking core held that lock, taking it again would hang the core
// before anything was printed.
//
// =============================================================================

use core::panic::PanicInfo;

use crate::arch::smp::CoreId;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    let core = CoreId::current();
    match info.location() {
        Some(location) => klog::error!(
            "PANIC on core {} at {}:{}: {}",
            core,
            location.file(),
            location.line(),
            info.message()
        ),
        None => klog::error!("PANIC on core {}: {}", core, info.message()),
    }
    klog::error!("core {} halted", core);

    khal::cpu::halt_forever()
}
