// =============================================================================
// ferropi - GPIO Driver
// =============================================================================
// Pin function select, output set/clear, level read and pull-up/down
// control for the BCM2837 GPIO block (54 pins, two 32-bit banks).
// =============================================================================

use crate::cpu;
use crate::mmio::Bus;

/// Register offsets from the GPIO base.
mod regs {
    /// Function Select 0..5, 10 pins per register, 3 bits per pin
    pub const FSEL0: usize = 0x00;

    /// Pin Output Set, pins 0-31 / 32-53
    pub const SET0: usize = 0x1C;
    pub const SET1: usize = 0x20;

    /// Pin Output Clear, pins 0-31 / 32-53
    pub const CLR0: usize = 0x28;
    pub const CLR1: usize = 0x2C;

    /// Pin Level, pins 0-31 / 32-53
    pub const LEV0: usize = 0x34;
    pub const LEV1: usize = 0x38;

    /// Pull-up/down control and per-bank clocks
    pub const PUD: usize = 0x94;
    pub const PUDCLK0: usize = 0x98;
    pub const PUDCLK1: usize = 0x9C;
}

/// Pin function select values (3 bits per pin).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum PinFunction {
    Input = 0b000,
    Output = 0b001,
    Alt0 = 0b100,
    Alt1 = 0b101,
    Alt2 = 0b110,
    Alt3 = 0b111,
    Alt4 = 0b011,
    Alt5 = 0b010,
}

/// Internal pull resistor configuration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u32)]
pub enum Pull {
    Off = 0b00,
    Down = 0b01,
    Up = 0b10,
}

/// The GPIO register block.
///
/// Pin numbers are 0..=53; out-of-range pins are a programming error, not
/// a runtime-recoverable condition.
pub struct Gpio<B: Bus> {
    bus: B,
}

impl<B: Bus> Gpio<B> {
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Reset every pin to input.
    pub fn init(&self) {
        for reg in 0..6 {
            self.bus.write_reg(regs::FSEL0 + reg * 4, 0);
        }
    }

    /// Switch `pin` to the given function.
    pub fn set_function(&self, pin: u32, function: PinFunction) {
        let reg = regs::FSEL0 + (pin / 10) as usize * 4;
        let shift = (pin % 10) * 3;

        let mut value = self.bus.read_reg(reg);
        value &= !(0b111 << shift);
        value |= (function as u32) << shift;
        self.bus.write_reg(reg, value);
    }

    /// Drive `pin` high.
    pub fn set(&self, pin: u32) {
        if pin < 32 {
            self.bus.write_reg(regs::SET0, 1 << pin);
        } else {
            self.bus.write_reg(regs::SET1, 1 << (pin - 32));
        }
    }

    /// Drive `pin` low.
    pub fn clear(&self, pin: u32) {
        if pin < 32 {
            self.bus.write_reg(regs::CLR0, 1 << pin);
        } else {
            self.bus.write_reg(regs::CLR1, 1 << (pin - 32));
        }
    }

    /// Read the current level of `pin`.
    pub fn level(&self, pin: u32) -> bool {
        if pin < 32 {
            self.bus.read_reg(regs::LEV0) & (1 << pin) != 0
        } else {
            self.bus.read_reg(regs::LEV1) & (1 << (pin - 32)) != 0
        }
    }

    /// Configure the internal pull resistor on `pin`.
    ///
    /// The control value has to be clocked into the pad: write the mode,
    /// wait 150 cycles of set-up time, pulse the per-bank clock, wait 150
    /// cycles of hold time, then remove both.
    pub fn set_pull(&self, pin: u32, pull: Pull) {
        let (clk_reg, clk_bit) = if pin < 32 {
            (regs::PUDCLK0, 1 << pin)
        } else {
            (regs::PUDCLK1, 1 << (pin - 32))
        };

        self.bus.write_reg(regs::PUD, pull as u32);
        cpu::delay_cycles(150);
        self.bus.write_reg(clk_reg, clk_bit);
        cpu::delay_cycles(150);
        self.bus.write_reg(regs::PUD, 0);
        self.bus.write_reg(clk_reg, 0);
    }
}

#[cfg(test)]
impl<B: Bus> Gpio<B> {
    pub(crate) fn bus(&self) -> &B {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmio::testing::FakeBus;

    #[test]
    fn function_select_encodes_register_and_field() {
        // GPIO 14 lives in FSEL1, bits 14:12.
        let bus = FakeBus::new(|_| 0);
        let gpio = Gpio::new(bus);

        gpio.set_function(14, PinFunction::Alt5);

        assert_eq!(gpio.bus.writes(), vec![(0x04, 0b010 << 12)]);
    }

    #[test]
    fn function_select_clears_previous_function() {
        // Pin 3 previously Alt3 (0b111), switching to Output must not
        // leave stale bits behind.
        let bus = FakeBus::new(|_| 0b111 << 9);
        let gpio = Gpio::new(bus);

        gpio.set_function(3, PinFunction::Output);

        assert_eq!(gpio.bus.writes(), vec![(0x00, 0b001 << 9)]);
    }

    #[test]
    fn set_and_clear_pick_the_right_bank() {
        let bus = FakeBus::new(|_| 0);
        let gpio = Gpio::new(bus);

        gpio.set(2);
        gpio.set(33);
        gpio.clear(2);
        gpio.clear(33);

        assert_eq!(
            gpio.bus.writes(),
            vec![
                (regs::SET0, 1 << 2),
                (regs::SET1, 1 << 1),
                (regs::CLR0, 1 << 2),
                (regs::CLR1, 1 << 1),
            ]
        );
    }

    #[test]
    fn level_reads_the_right_bank() {
        let bus = FakeBus::new(|offset| match offset {
            regs::LEV0 => 1 << 29,
            regs::LEV1 => 0,
            _ => 0,
        });
        let gpio = Gpio::new(bus);

        assert!(gpio.level(29));
        assert!(!gpio.level(5));
        assert!(!gpio.level(33));
    }

    #[test]
    fn pull_sequence_clocks_the_pad_then_releases() {
        let bus = FakeBus::new(|_| 0);
        let gpio = Gpio::new(bus);

        gpio.set_pull(15, Pull::Up);

        assert_eq!(
            gpio.bus.writes(),
            vec![
                (regs::PUD, 0b10),
                (regs::PUDCLK0, 1 << 15),
                (regs::PUD, 0),
                (regs::PUDCLK0, 0),
            ]
        );
    }
}
