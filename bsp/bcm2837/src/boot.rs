// =============================================================================
// ferropi - Boot Stub
// =============================================================================
// The first instructions after the firmware hands over. Core 0 continues
// into kernel_main, the secondary cores are parked, and .bss is zeroed so
// statics start in the state the language guarantees.
// =============================================================================

#[cfg(target_arch = "aarch64")]
core::arch::global_asm!(include_str!("boot.S"));
