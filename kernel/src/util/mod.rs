// =============================================================================
// CoreLink - Utilities
// =============================================================================
//
//   logger.rs - kprint!/kprintln! macros (per-core output under the
//               console lock)
//   panic.rs  - halt-and-report panic handler for bare-metal images, only
//               with the `panic-handler` feature
// =============================================================================

pub mod logger;

#[cfg(all(feature = "panic-handler", not(test), not(feature = "std")))]
mod panic;
