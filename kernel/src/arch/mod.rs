// =============================================================================
// CoreLink - Architecture Abstraction
// =============================================================================
//
// Everything instruction-level (SEV/WFE, MPIDR, HVC/SMC) lives in `khal`
// behind `cfg(all(target_arch = "aarch64", target_os = "none"))`, with
// hosted fallbacks for tests and the simulation.  What remains here is
// the architecture-neutral SMP layer built on top of it.
// =============================================================================

pub mod smp;
