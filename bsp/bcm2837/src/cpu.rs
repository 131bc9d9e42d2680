// =============================================================================
// ferropi - CPU Utilities
// =============================================================================
// ARM64 CPU control functions. Host builds (tests) get inert stubs.
// =============================================================================

/// Halt the CPU forever in a low-power state.
///
/// Used when a fatal error leaves nothing sensible to do.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn halt() -> ! {
    loop {
        // SAFETY: WFE has no side effects beyond pausing the core
        unsafe {
            core::arch::asm!("wfe");
        }
    }
}

#[cfg(not(target_arch = "aarch64"))]
pub fn halt() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

/// Pause until the next interrupt is delivered.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn wait_for_interrupt() {
    // SAFETY: WFI only pauses the core
    unsafe {
        core::arch::asm!("wfi");
    }
}

#[cfg(not(target_arch = "aarch64"))]
pub fn wait_for_interrupt() {
    core::hint::spin_loop();
}

/// Unmask IRQs at the CPU (clear the I bit in DAIF).
///
/// # Safety
/// The vector table and every enabled interrupt source's service routine
/// must be in place before IRQs are unmasked.
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub unsafe fn enable_interrupts() {
    core::arch::asm!("msr daifclr, #2");
}

#[cfg(not(target_arch = "aarch64"))]
pub unsafe fn enable_interrupts() {}

/// Mask IRQs at the CPU (set the I bit in DAIF).
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn disable_interrupts() {
    // SAFETY: masking interrupts is always sound
    unsafe {
        core::arch::asm!("msr daifset, #2");
    }
}

#[cfg(not(target_arch = "aarch64"))]
pub fn disable_interrupts() {}

/// Get the current exception level (0-3).
#[cfg(target_arch = "aarch64")]
#[inline(always)]
pub fn current_el() -> u8 {
    let el: u64;
    // SAFETY: CurrentEL is readable at EL1
    unsafe {
        core::arch::asm!("mrs {}, CurrentEL", out(reg) el);
    }
    ((el >> 2) & 0x3) as u8
}

#[cfg(not(target_arch = "aarch64"))]
pub fn current_el() -> u8 {
    1
}

/// Burn roughly `n` cycles. Used for the GPIO pull-up/down settle time,
/// which the hardware specifies in cycles rather than microseconds.
#[cfg(target_arch = "aarch64")]
#[inline]
pub fn delay_cycles(mut n: u64) {
    while n > 0 {
        // SAFETY: NOP has no effects
        unsafe {
            core::arch::asm!("nop");
        }
        n -= 1;
    }
}

#[cfg(not(target_arch = "aarch64"))]
pub fn delay_cycles(_n: u64) {}
