// =============================================================================
// ferropi - BCM2837 Board Support Package
// =============================================================================
// Register-level drivers for the Raspberry Pi 3:
// - Mini UART console (with print macros)
// - GPIO and the ACT status LED
// - System timer (free-running counter + compare channels)
// - Interrupt controller and IRQ dispatch
// - Exception vector table
// - I2C master and a character LCD on top of it
//
// The crate is host-testable: all aarch64 assembly is gated on the target
// architecture, and every driver is generic over the `mmio::Bus` trait so
// its logic runs against fake register banks in tests.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(not(test), no_std)]

pub mod act_led;
pub mod board;
pub mod boot;
pub mod cpu;
pub mod exception;
pub mod gpio;
pub mod i2c;
pub mod intc;
pub mod irq;
pub mod lcd;
pub mod mini_uart;
pub mod mmio;
pub mod system_timer;

/// Physical addresses of the peripheral register blocks.
pub mod memory_map {
    /// Start of the memory-mapped peripheral window on the BCM2837.
    pub const PERIPHERAL_BASE: usize = 0x3F00_0000;

    pub const SYSTEM_TIMER_BASE: usize = PERIPHERAL_BASE + 0x3000;
    pub const INTC_BASE: usize = PERIPHERAL_BASE + 0xB200;
    pub const GPIO_BASE: usize = PERIPHERAL_BASE + 0x0020_0000;
    pub const AUX_BASE: usize = PERIPHERAL_BASE + 0x0021_5000;
    pub const BSC1_BASE: usize = PERIPHERAL_BASE + 0x0080_4000;
}

/// Bring the board up for foreground use: GPIO, console, status LED and
/// the exception vector table. Interrupts stay masked; call
/// [`board::interrupts_init`] once the foreground is done with one-time
/// configuration.
///
/// # Safety
/// Must be called exactly once, before anything touches the peripherals.
pub unsafe fn init() {
    board::init();
    exception::init();
}
