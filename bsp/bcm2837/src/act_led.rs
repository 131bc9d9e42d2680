// =============================================================================
// ferropi - ACT LED
// =============================================================================
// The board's green activity LED, on GPIO 29. The timer service routine
// toggles it once per firing, which makes liveness observable without a
// serial cable.
// =============================================================================

use crate::gpio::{Gpio, PinFunction, Pull};
use crate::irq::StatusLed;
use crate::mmio::Bus;

/// GPIO pin wired to the ACT LED.
pub const ACT_LED_PIN: u32 = 29;

pub struct ActLed<B: Bus> {
    gpio: Gpio<B>,
    pin: u32,
}

impl<B: Bus> ActLed<B> {
    pub const fn new(gpio: Gpio<B>, pin: u32) -> Self {
        Self { gpio, pin }
    }

    /// Configure the pin as an output starting in a known (low) state.
    pub fn init(&self) {
        self.gpio.set_function(self.pin, PinFunction::Output);
        self.gpio.set_pull(self.pin, Pull::Down);
    }

    /// Invert the LED: read the pin level and drive the opposite one.
    pub fn toggle(&self) {
        if self.gpio.level(self.pin) {
            self.gpio.clear(self.pin);
        } else {
            self.gpio.set(self.pin);
        }
    }
}

impl<B: Bus> StatusLed for ActLed<B> {
    fn toggle(&self) {
        ActLed::toggle(self)
    }
}
