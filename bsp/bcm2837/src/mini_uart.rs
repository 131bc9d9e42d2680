// =============================================================================
// ferropi - Mini UART Driver
// =============================================================================
// The BCM2837 auxiliary mini UART on GPIO 14/15, used as the serial
// console. Provides the global print!/println! macros and the byte-level
// console interface the IRQ echo path drains.
// =============================================================================

use core::fmt;

use spin::Mutex;

use crate::irq::Console;
use crate::memory_map;
use crate::mmio::{Bus, Mmio};

/// TXD/RXD pins; must be switched to ALT5 before `init`.
pub const TXD_PIN: u32 = 14;
pub const RXD_PIN: u32 = 15;

/// Divisor for 115200 baud with the 250 MHz core clock.
pub const BAUD_DIVISOR_115200: u32 = 271;

/// Register offsets from the auxiliary block base.
mod regs {
    /// Auxiliary enables (bit 0 turns the mini UART on)
    pub const ENABLES: usize = 0x04;

    /// Mini UART I/O data
    pub const MU_IO: usize = 0x40;
    /// Mini UART interrupt enable
    pub const MU_IER: usize = 0x44;
    /// Mini UART interrupt identification
    pub const MU_IIR: usize = 0x48;
    /// Mini UART line control
    pub const MU_LCR: usize = 0x4C;
    /// Mini UART modem control
    pub const MU_MCR: usize = 0x50;
    /// Mini UART line status
    pub const MU_LSR: usize = 0x54;
    /// Mini UART extra control
    pub const MU_CNTL: usize = 0x60;
    /// Mini UART baud rate
    pub const MU_BAUD: usize = 0x68;
}

/// Status and identification bits.
mod flags {
    /// LSR: receiver holds a byte
    pub const LSR_DATA_READY: u32 = 1 << 0;
    /// LSR: transmitter can accept a byte
    pub const LSR_TX_EMPTY: u32 = 1 << 5;
    /// IIR: a receive interrupt is the pending condition
    pub const IIR_RX_PENDING: u32 = 0x4;
}

/// The mini UART register block.
pub struct MiniUart<B: Bus> {
    bus: B,
}

impl<B: Bus> MiniUart<B> {
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    /// One-time configuration: mini UART on, 8 data bits, 115200 baud,
    /// interrupts off until the board wiring asks for them.
    ///
    /// The TXD/RXD pins must already be on ALT5 with their pulls off.
    pub fn init(&self) {
        self.bus.write_reg(regs::ENABLES, 1);
        self.bus.write_reg(regs::MU_CNTL, 0);
        self.bus.write_reg(regs::MU_IER, 0);
        self.bus.write_reg(regs::MU_LCR, 3);
        self.bus.write_reg(regs::MU_MCR, 0);
        self.bus.write_reg(regs::MU_BAUD, BAUD_DIVISOR_115200);
        self.bus.write_reg(regs::MU_CNTL, 3);
    }

    /// Let the receive side assert the auxiliary interrupt line.
    ///
    /// Bit 0 of IER: the datasheet labels bits 0/1 the other way around,
    /// but on this part bit 0 is the receive interrupt.
    pub fn enable_receive_interrupt(&self) {
        self.bus.write_reg(regs::MU_IER, 1);
    }

    /// Transmit one byte, waiting for transmit-ready first.
    /// Hardware-paced wait, no software timeout.
    pub fn send_byte(&self, byte: u8) {
        while self.bus.read_reg(regs::MU_LSR) & flags::LSR_TX_EMPTY == 0 {
            core::hint::spin_loop();
        }
        self.bus.write_reg(regs::MU_IO, u32::from(byte));
    }

    /// Receive one byte, blocking on the data-ready bit.
    pub fn receive_byte(&self) -> u8 {
        while self.bus.read_reg(regs::MU_LSR) & flags::LSR_DATA_READY == 0 {
            core::hint::spin_loop();
        }
        (self.bus.read_reg(regs::MU_IO) & 0xFF) as u8
    }

    /// True while a receive interrupt condition is pending, i.e. the FIFO
    /// holds unread bytes. This is the drain condition of the IRQ echo
    /// loop.
    pub fn receive_ready(&self) -> bool {
        self.bus.read_reg(regs::MU_IIR) & flags::IIR_RX_PENDING != 0
    }

    /// Transmit a string, expanding `\n` to CRLF for terminals.
    pub fn send_str(&self, s: &str) {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.send_byte(b'\r');
            }
            self.send_byte(byte);
        }
    }
}

impl<B: Bus> Console for MiniUart<B> {
    fn receive_ready(&self) -> bool {
        MiniUart::receive_ready(self)
    }

    fn receive_byte(&self) -> u8 {
        MiniUart::receive_byte(self)
    }

    fn send_byte(&self, byte: u8) {
        MiniUart::send_byte(self, byte)
    }
}

impl<B: Bus> fmt::Write for MiniUart<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.send_str(s);
        Ok(())
    }
}

// =============================================================================
// Global Console
// =============================================================================

/// Foreground console, behind a spinlock so concurrent printers do not
/// interleave. Interrupt and fault context must never take this lock: the
/// foreground may be suspended mid-print holding it. The echo path uses
/// its own instance (see board.rs) and diagnostics from those contexts go
/// through [`_print_unlocked`].
static UART: Mutex<MiniUart<Mmio>> =
    Mutex::new(MiniUart::new(unsafe { Mmio::new(memory_map::AUX_BASE) }));

/// Initialize the global console.
pub fn init() {
    UART.lock().init();
}

/// Print a formatted string to the console, from foreground context only.
pub fn _print(args: fmt::Arguments) {
    #[cfg(target_arch = "aarch64")]
    {
        use core::fmt::Write;
        UART.lock().write_fmt(args).ok();
    }
    // Host tests have no UART to write to, but still take the lock so
    // lock-discipline tests see the same contention the board does.
    #[cfg(all(test, not(target_arch = "aarch64")))]
    {
        let _guard = UART.lock();
        let _ = args;
    }
    #[cfg(all(not(test), not(target_arch = "aarch64")))]
    let _ = args;
}

/// Print from interrupt or fault context, bypassing the console lock.
///
/// Writes through a fresh handle to the same hardware. IRQs are masked in
/// those contexts, so nothing transmits concurrently; at worst the output
/// interleaves with a foreground line that was already in flight.
pub fn _print_unlocked(args: fmt::Arguments) {
    #[cfg(target_arch = "aarch64")]
    {
        use core::fmt::Write;
        // SAFETY: AUX_BASE is the mini UART register block.
        let mut uart = MiniUart::new(unsafe { Mmio::new(memory_map::AUX_BASE) });
        uart.write_fmt(args).ok();
    }
    #[cfg(not(target_arch = "aarch64"))]
    let _ = args;
}

/// Print to the serial console.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::mini_uart::_print(format_args!($($arg)*))
    };
}

/// Print to the serial console with a newline.
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::print!("{}\n", format_args!($($arg)*))
    };
}

/// Print with a newline from interrupt or fault context. Never touches
/// the console lock.
#[macro_export]
macro_rules! irq_println {
    ($($arg:tt)*) => {
        $crate::mini_uart::_print_unlocked(format_args!(
            "{}\n",
            format_args!($($arg)*)
        ))
    };
}

#[cfg(test)]
pub(crate) fn console_lock() -> spin::MutexGuard<'static, MiniUart<Mmio>> {
    UART.lock()
}
