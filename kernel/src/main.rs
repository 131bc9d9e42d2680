// =============================================================================
// ferropi - Kernel Entry Point
// =============================================================================
// Main Rust entry point, called from boot.S on core 0 with the stack set
// up and .bss zeroed. Brings the board up, puts a splash on the LCD, then
// unmasks interrupts and idles: from that point on, console echo and the
// LED tick run entirely in interrupt context.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use ferropi_bsp_bcm2837 as bsp;

use bsp::i2c::I2cError;
use bsp::lcd::Lcd2004;
use bsp::mmio::Mmio;
use bsp::{board, cpu, println};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kernel main entry point.
///
/// # Safety
/// Called exactly once, by the boot assembly, on core 0 only.
#[no_mangle]
pub extern "C" fn kernel_main() -> ! {
    // SAFETY: boot.S guarantees single entry on core 0.
    unsafe {
        bsp::init();
    }

    print_banner();

    // LCD bring-up happens in the foreground, before interrupts: its init
    // sequence is delay-timed and must not be stretched by IRQ work. A
    // missing or broken display is reported and otherwise ignored.
    board::i2c_pins_init();
    let mut lcd = Lcd2004::new(board::i2c(), board::system_timer());
    match lcd_splash(&mut lcd) {
        Ok(()) => println!("[kernel] LCD ready"),
        Err(err) => println!("[kernel] LCD unavailable: {:?}", err),
    }

    // SAFETY: the vector table was installed by bsp::init above.
    unsafe {
        board::interrupts_init();
    }
    println!("[kernel] interrupts live, console echo and LED tick are IRQ-driven");

    loop {
        cpu::wait_for_interrupt();
    }
}

fn lcd_splash(lcd: &mut Lcd2004<'_, Mmio>) -> Result<(), I2cError> {
    lcd.init()?;
    lcd.set_cursor(0, 0)?;
    lcd.write_str("ferropi v")?;
    lcd.write_str(VERSION)?;
    lcd.set_cursor(0, 1)?;
    lcd.write_str("console 115200 8N1")?;
    Ok(())
}

fn print_banner() {
    println!();
    println!("ferropi v{}", VERSION);
    println!("Raspberry Pi 3 board support, interrupt-driven console and timer");
    println!("running at EL{}", cpu::current_el());
    println!("============================================================");
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    cpu::disable_interrupts();
    println!();
    println!("KERNEL PANIC: {}", info);
    cpu::halt();
}
