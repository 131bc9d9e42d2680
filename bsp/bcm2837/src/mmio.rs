// =============================================================================
// ferropi - Memory-Mapped Register Access
// =============================================================================
// The one seam between driver logic and physical hardware. Drivers are
// generic over `Bus`; the real implementation is a volatile pointer access
// at a fixed base, tests substitute fake register banks.
// =============================================================================

use core::ptr;

/// 32-bit register access at a fixed byte offset from a peripheral's base.
pub trait Bus {
    fn read_reg(&self, offset: usize) -> u32;
    fn write_reg(&self, offset: usize, value: u32);
}

/// A peripheral's register block at a fixed physical address.
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// Create a handle for the register block at `base`.
    ///
    /// # Safety
    /// `base` must be the physical address of a device register block.
    /// Handles may alias the same block (the board wiring does, for the
    /// GPIO and AUX banks); coordinating concurrent access to the same
    /// registers is the caller's responsibility.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }
}

impl Bus for Mmio {
    fn read_reg(&self, offset: usize) -> u32 {
        let addr = (self.base + offset) as *const u32;
        // SAFETY: construction guarantees base points at device registers
        unsafe { ptr::read_volatile(addr) }
    }

    fn write_reg(&self, offset: usize, value: u32) {
        let addr = (self.base + offset) as *mut u32;
        // SAFETY: construction guarantees base points at device registers
        unsafe { ptr::write_volatile(addr, value) }
    }
}
