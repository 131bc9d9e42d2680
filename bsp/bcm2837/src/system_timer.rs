// =============================================================================
// ferropi - System Timer Driver
// =============================================================================
// The BCM2837 system timer: a free-running 64-bit counter exposed as two
// independently-latched 32-bit halves, four 32-bit compare channels, and a
// write-one-to-clear match-status register.
// =============================================================================

use crate::mmio::Bus;

/// Register offsets from the system timer base.
mod regs {
    /// Control/Status: bit n is set when channel n matched, write 1 to clear
    pub const CS: usize = 0x00;
    /// Counter, lower 32 bits
    pub const CLO: usize = 0x04;
    /// Counter, upper 32 bits
    pub const CHI: usize = 0x08;
    /// Compare 0..3
    pub const C0: usize = 0x0C;
    pub const C1: usize = 0x10;
    pub const C2: usize = 0x14;
    pub const C3: usize = 0x18;
}

/// The free-running counter advances at 1 MHz.
pub const CLOCK_FREQ_HZ: u32 = 1_000_000;

/// Compare channels. Channels 0 and 2 belong to the GPU firmware on this
/// board; the ARM side uses 1 and 3.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Channel {
    C0,
    C1,
    C2,
    C3,
}

impl Channel {
    /// Bit position in CS, and in the interrupt controller's pending-1 and
    /// enable-1 banks.
    pub const fn bit(self) -> u32 {
        match self {
            Channel::C0 => 0,
            Channel::C1 => 1,
            Channel::C2 => 2,
            Channel::C3 => 3,
        }
    }

    const fn compare_offset(self) -> usize {
        match self {
            Channel::C0 => regs::C0,
            Channel::C1 => regs::C1,
            Channel::C2 => regs::C2,
            Channel::C3 => regs::C3,
        }
    }
}

/// The system timer register block.
pub struct SystemTimer<B: Bus> {
    bus: B,
}

impl<B: Bus> SystemTimer<B> {
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Current value of the 64-bit free-running counter.
    ///
    /// The two halves latch independently, so a carry between the two
    /// reads would produce a torn value (stale high half paired with a
    /// wrapped low half). Read high, low, high again: if the high half
    /// moved, the carry landed inside the sample and both halves are
    /// re-read.
    pub fn ticks(&self) -> u64 {
        let mut hi = self.bus.read_reg(regs::CHI);
        let mut lo = self.bus.read_reg(regs::CLO);

        if hi != self.bus.read_reg(regs::CHI) {
            hi = self.bus.read_reg(regs::CHI);
            lo = self.bus.read_reg(regs::CLO);
        }

        (u64::from(hi) << 32) | u64::from(lo)
    }

    /// Lower 32 bits of the counter. This is the half the compare
    /// channels match against.
    pub fn ticks_lo(&self) -> u32 {
        self.bus.read_reg(regs::CLO)
    }

    /// Program `channel` to match `delay` ticks from now.
    ///
    /// The counter is read fresh here, never cached by the caller, so the
    /// match point cannot already be in the past by the time it is
    /// written. The compare registers are 32-bit and the addition wraps
    /// with the counter's low half.
    pub fn arm(&self, channel: Channel, delay: u32) {
        let compare = self.ticks_lo().wrapping_add(delay);
        self.bus.write_reg(channel.compare_offset(), compare);
    }

    /// Clear `channel`'s match flag.
    ///
    /// CS is write-one-to-clear: only the single channel bit is written.
    /// A read-modify-write here would clear every other channel's flag as
    /// a side effect.
    pub fn acknowledge(&self, channel: Channel) {
        self.bus.write_reg(regs::CS, 1 << channel.bit());
    }

    /// Busy-wait for `micros` microseconds against the free-running
    /// counter. Hardware-paced, no software timeout.
    pub fn delay_micros(&self, micros: u64) {
        let ticks = micros * u64::from(CLOCK_FREQ_HZ) / 1_000_000;
        let start = self.ticks();
        while self.ticks().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }
}
