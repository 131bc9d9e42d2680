// =============================================================================
// ferropi - Interrupt Controller Driver
// =============================================================================
// The BCM2837 ARM-side interrupt controller: ten consecutive 32-bit
// registers. This board only routes sources in the pending-1/enable-1
// bank (system timer channels and the auxiliary block).
// =============================================================================

use bitflags::bitflags;

use crate::mmio::Bus;

/// Register offsets from the controller base.
#[allow(dead_code)]
mod regs {
    pub const IRQ_BASIC_PENDING: usize = 0x00;
    pub const IRQ_PENDING_1: usize = 0x04;
    pub const IRQ_PENDING_2: usize = 0x08;
    pub const FIQ_CONTROL: usize = 0x0C;
    pub const ENABLE_IRQS_1: usize = 0x10;
    pub const ENABLE_IRQS_2: usize = 0x14;
    pub const ENABLE_BASIC_IRQS: usize = 0x18;
    pub const DISABLE_IRQS_1: usize = 0x1C;
    pub const DISABLE_IRQS_2: usize = 0x20;
    pub const DISABLE_BASIC_IRQS: usize = 0x24;
}

bitflags! {
    /// Interrupt sources in the pending-1/enable-1 bank.
    ///
    /// The set is fixed by hardware. Every source enabled at runtime must
    /// have a service routine in the dispatch table, or its pending bit
    /// can never be retired.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct IrqSources: u32 {
        const SYSTEM_TIMER_0 = 1 << 0;
        const SYSTEM_TIMER_1 = 1 << 1;
        const SYSTEM_TIMER_2 = 1 << 2;
        const SYSTEM_TIMER_3 = 1 << 3;
        /// Auxiliary block: the mini UART's receive interrupt arrives here.
        const AUX = 1 << 29;
    }
}

/// The ARM interrupt controller register block.
pub struct InterruptController<B: Bus> {
    bus: B,
}

impl<B: Bus> InterruptController<B> {
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Unmask the given sources. The enable register is set-only, so this
    /// is a pure union: sources already enabled stay enabled. One-time
    /// startup configuration.
    pub fn enable(&self, sources: IrqSources) {
        self.bus.write_reg(regs::ENABLE_IRQS_1, sources.bits());
    }

    /// Mask the given sources. The disable register is clear-only; other
    /// sources are untouched.
    pub fn disable(&self, sources: IrqSources) {
        self.bus.write_reg(regs::DISABLE_IRQS_1, sources.bits());
    }

    /// Snapshot of the currently pending sources.
    ///
    /// The hardware keeps updating behind this read; two consecutive calls
    /// may disagree. Dispatch must re-read rather than reuse a stale
    /// snapshot. Unknown bits are retained so a misconfigured source is
    /// visible to the caller instead of silently dropped.
    pub fn pending(&self) -> IrqSources {
        IrqSources::from_bits_retain(self.bus.read_reg(regs::IRQ_PENDING_1))
    }
}
