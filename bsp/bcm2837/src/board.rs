// =============================================================================
// ferropi - Board Wiring
// =============================================================================
// The one place that knows the physical layout: which peripheral sits at
// which base address, which GPIO pins feed which block, which interrupt
// source is owned by which service routine. Everything here is a static
// built with const constructors, so the dispatch table exists before the
// first instruction of kernel_main.
// =============================================================================

use crate::act_led::{ActLed, ACT_LED_PIN};
use crate::cpu;
use crate::gpio::{Gpio, PinFunction, Pull};
use crate::i2c::I2c;
use crate::intc::{InterruptController, IrqSources};
use crate::irq::{ConsoleEcho, IdleTimer, IrqDispatcher, IrqHandler, LedBlink};
use crate::memory_map;
use crate::mini_uart::{self, MiniUart, RXD_PIN, TXD_PIN};
use crate::mmio::Mmio;
use crate::system_timer::{Channel, SystemTimer, CLOCK_FREQ_HZ};

/// I2C data/clock pins on the header (ALT0 routes them to BSC1).
pub const SDA_PIN: u32 = 2;
pub const SCL_PIN: u32 = 3;

/// Channel 1 fires every half second; one toggle per firing puts the ACT
/// LED on a one-second cycle.
const LED_BLINK_PERIOD_TICKS: u32 = CLOCK_FREQ_HZ / 2;

// =============================================================================
// Peripheral Instances
// =============================================================================

static GPIO: Gpio<Mmio> = Gpio::new(unsafe { Mmio::new(memory_map::GPIO_BASE) });
static SYSTEM_TIMER: SystemTimer<Mmio> =
    SystemTimer::new(unsafe { Mmio::new(memory_map::SYSTEM_TIMER_BASE) });
static INTC: InterruptController<Mmio> =
    InterruptController::new(unsafe { Mmio::new(memory_map::INTC_BASE) });
static I2C: I2c<Mmio> = I2c::new(unsafe { Mmio::new(memory_map::BSC1_BASE) });

/// ACT LED with its own view of the GPIO block.
static ACT_LED: ActLed<Mmio> =
    ActLed::new(Gpio::new(unsafe { Mmio::new(memory_map::GPIO_BASE) }), ACT_LED_PIN);

/// Console as seen from interrupt context. The foreground console in
/// mini_uart sits behind a spinlock; the echo routine runs with interrupts
/// masked and must never wait on that lock, so it gets its own instance of
/// the same hardware.
static IRQ_CONSOLE: MiniUart<Mmio> = MiniUart::new(unsafe { Mmio::new(memory_map::AUX_BASE) });

// =============================================================================
// Service Routines and Dispatch Table
// =============================================================================

static CONSOLE_ECHO: ConsoleEcho<'static, MiniUart<Mmio>> = ConsoleEcho::new(&IRQ_CONSOLE);
static LED_TICK: LedBlink<'static, Mmio, ActLed<Mmio>> =
    LedBlink::new(&SYSTEM_TIMER, Channel::C1, LED_BLINK_PERIOD_TICKS, &ACT_LED);
static SPARE_TICK: IdleTimer<'static, Mmio> = IdleTimer::new(&SYSTEM_TIMER, Channel::C3);

/// Source-to-routine table. Order is dispatch priority within one pending
/// snapshot: console input is serviced before timer work.
static IRQ_TABLE: [(IrqSources, &dyn IrqHandler); 3] = [
    (IrqSources::AUX, &CONSOLE_ECHO),
    (IrqSources::SYSTEM_TIMER_1, &LED_TICK),
    (IrqSources::SYSTEM_TIMER_3, &SPARE_TICK),
];

// =============================================================================
// Bring-up
// =============================================================================

/// Foreground bring-up: pin functions, console, status LED. Interrupts
/// stay masked.
pub fn init() {
    GPIO.init();

    GPIO.set_function(TXD_PIN, PinFunction::Alt5);
    GPIO.set_function(RXD_PIN, PinFunction::Alt5);
    GPIO.set_pull(TXD_PIN, Pull::Off);
    GPIO.set_pull(RXD_PIN, Pull::Off);
    // Initializes the hardware once; IRQ_CONSOLE shares it uninitialized.
    mini_uart::init();

    ACT_LED.init();
}

/// Route SDA/SCL to the BSC1 controller. Call before touching the I2C
/// bus.
pub fn i2c_pins_init() {
    GPIO.set_function(SDA_PIN, PinFunction::Alt0);
    GPIO.set_function(SCL_PIN, PinFunction::Alt0);
    GPIO.set_pull(SDA_PIN, Pull::Up);
    GPIO.set_pull(SCL_PIN, Pull::Up);
}

/// Arm the timer channels, unmask the sources in the dispatch table and
/// open the CPU's IRQ gate. After this returns, all console echo and LED
/// activity happens in interrupt context.
///
/// # Safety
/// The vector table must already be installed (see [`crate::init`]), and
/// this must run exactly once.
pub unsafe fn interrupts_init() {
    SYSTEM_TIMER.arm(Channel::C1, LED_BLINK_PERIOD_TICKS);
    SYSTEM_TIMER.arm(Channel::C3, CLOCK_FREQ_HZ);
    IRQ_CONSOLE.enable_receive_interrupt();

    INTC.enable(IrqSources::AUX | IrqSources::SYSTEM_TIMER_1 | IrqSources::SYSTEM_TIMER_3);
    cpu::enable_interrupts();
}

/// Entered from the vector table on every IRQ.
pub fn dispatch_irq() {
    IrqDispatcher::new(&INTC, &IRQ_TABLE).dispatch();
}

/// Timer handle for foreground delays (LCD initialization timing).
pub fn system_timer() -> &'static SystemTimer<Mmio> {
    &SYSTEM_TIMER
}

/// I2C master handle for foreground transfers.
pub fn i2c() -> &'static I2c<Mmio> {
    &I2C
}
