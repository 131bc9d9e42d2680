// =============================================================================
// ferropi - 20x4 Character LCD
// =============================================================================
// HD44780-compatible 20x4 display behind a PCF8574 I2C port expander. The
// expander drives the LCD in 4-bit mode: each byte goes out as two
// nibbles, each latched by pulsing the ENABLE line. The expander's bit 3
// feeds the backlight, so every written byte carries the current
// backlight state.
// =============================================================================

use crate::i2c::{I2c, I2cError};
use crate::mmio::Bus;
use crate::system_timer::SystemTimer;

/// Default address of the PCF8574 expander.
pub const LCD_I2C_ADDRESS: u8 = 0x27;

/// Clock divider for the LCD's bus. The PCF8574 tops out well below fast
/// mode, so run well under 100 kHz.
pub const LCD_I2C_DIVIDER: u32 = 1500;

/// HD44780 instruction bytes.
mod cmd {
    pub const CLEAR_DISPLAY: u8 = 0x01;
    pub const RETURN_HOME: u8 = 0x02;
    pub const ENTRY_MODE_SET: u8 = 0x04;
    pub const DISPLAY_CONTROL: u8 = 0x08;
    pub const FUNCTION_SET: u8 = 0x20;
    pub const SET_DDRAM_ADDR: u8 = 0x80;

    /// Nibble-mode wake-up, sent three times during initialization.
    pub const WAKE_UP: u8 = 0x03;
}

/// Instruction option bits and expander control lines.
mod flags {
    /// ENTRY_MODE_SET: cursor moves left to right
    pub const ENTRY_LEFT: u8 = 0x02;
    /// DISPLAY_CONTROL: display on
    pub const DISPLAY_ON: u8 = 0x04;
    /// FUNCTION_SET: two logical lines (the 20x4 is wired as two banks)
    pub const TWO_LINE: u8 = 0x08;

    /// Expander bit 0: register select (data when set, command when clear)
    pub const REGISTER_SELECT: u8 = 1 << 0;
    /// Expander bit 2: enable line, data latches on its falling edge
    pub const ENABLE: u8 = 1 << 2;
    /// Expander bit 3: backlight anode
    pub const BACKLIGHT: u8 = 1 << 3;
}

/// DDRAM address of column 0 for each of the four rows. Rows 0/2 and 1/3
/// are interleaved banks, not contiguous.
const ROW_OFFSETS: [u8; 4] = [0x00, 0x40, 0x14, 0x54];

/// A 20x4 LCD on the I2C bus. Holds the backlight state, which is
/// replayed on every expander write.
pub struct Lcd2004<'a, B: Bus> {
    i2c: &'a I2c<B>,
    timer: &'a SystemTimer<B>,
    address: u8,
    backlight: u8,
}

impl<'a, B: Bus> Lcd2004<'a, B> {
    pub fn new(i2c: &'a I2c<B>, timer: &'a SystemTimer<B>) -> Self {
        Self {
            i2c,
            timer,
            address: LCD_I2C_ADDRESS,
            backlight: flags::BACKLIGHT,
        }
    }

    /// Bring the controller out of reset into 4-bit, 2-line mode with the
    /// display on and the cursor hidden.
    ///
    /// The wake-up command goes out three times with the delays the
    /// HD44780 datasheet requires; until the mode switch lands the
    /// controller may still be in 8-bit mode and only sees the low
    /// nibbles.
    pub fn init(&mut self) -> Result<(), I2cError> {
        self.i2c.init(LCD_I2C_DIVIDER);

        // Power-on stabilization.
        self.timer.delay_micros(50_000);

        self.write_command(cmd::WAKE_UP)?;
        self.timer.delay_micros(5_000);
        self.write_command(cmd::WAKE_UP)?;
        self.timer.delay_micros(160);
        self.write_command(cmd::WAKE_UP)?;
        self.timer.delay_micros(160);
        self.write_command(cmd::FUNCTION_SET)?;
        self.timer.delay_micros(160);

        self.write_command(cmd::FUNCTION_SET | flags::TWO_LINE)?;
        self.timer.delay_micros(160);
        self.write_command(cmd::DISPLAY_CONTROL | flags::DISPLAY_ON)?;
        self.timer.delay_micros(160);
        self.write_command(cmd::CLEAR_DISPLAY)?;
        self.timer.delay_micros(2_000);
        self.write_command(cmd::ENTRY_MODE_SET | flags::ENTRY_LEFT)?;
        self.timer.delay_micros(160);
        self.write_command(cmd::RETURN_HOME)?;
        self.timer.delay_micros(2_000);
        Ok(())
    }

    /// Blank the display and move the cursor home.
    pub fn clear(&mut self) -> Result<(), I2cError> {
        self.write_command(cmd::CLEAR_DISPLAY)?;
        self.timer.delay_micros(2_000);
        Ok(())
    }

    /// Move the cursor to the top-left corner and undo any display shift.
    pub fn home(&mut self) -> Result<(), I2cError> {
        self.write_command(cmd::RETURN_HOME)?;
        self.timer.delay_micros(2_000);
        Ok(())
    }

    /// Move the cursor to `col` (0..=19) in `row` (0..=3). Rows past the
    /// last are clamped to it.
    pub fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), I2cError> {
        let row = row.min(3);
        self.write_command(cmd::SET_DDRAM_ADDR | (col + ROW_OFFSETS[row as usize]))?;
        self.timer.delay_micros(50);
        Ok(())
    }

    /// Write `text` starting at the current cursor position.
    pub fn write_str(&mut self, text: &str) -> Result<(), I2cError> {
        for byte in text.bytes() {
            self.write_data(byte)?;
        }
        Ok(())
    }

    /// Switch the backlight. The state sticks to every subsequent write.
    pub fn backlight(&mut self, on: bool) -> Result<(), I2cError> {
        self.backlight = if on { flags::BACKLIGHT } else { 0 };
        // A no-op command flushes the new state to the expander.
        self.write_command(0)?;
        self.timer.delay_micros(37);
        Ok(())
    }

    fn write_command(&self, byte: u8) -> Result<(), I2cError> {
        self.send(byte, 0)
    }

    fn write_data(&self, byte: u8) -> Result<(), I2cError> {
        self.send(byte, flags::REGISTER_SELECT)
    }

    /// Send one byte as two nibbles, high first, each latched by an
    /// ENABLE pulse.
    fn send(&self, byte: u8, mode: u8) -> Result<(), I2cError> {
        let high = (byte & 0xF0) | mode;
        let low = ((byte << 4) & 0xF0) | mode;

        self.write_expander(high)?;
        self.pulse(high)?;
        self.write_expander(low)?;
        self.pulse(low)?;
        Ok(())
    }

    /// Raise and drop ENABLE around `bits`; the LCD samples on the
    /// falling edge.
    fn pulse(&self, bits: u8) -> Result<(), I2cError> {
        self.write_expander(bits | flags::ENABLE)?;
        self.timer.delay_micros(1);
        self.write_expander(bits & !flags::ENABLE)?;
        self.timer.delay_micros(1);
        Ok(())
    }

    fn write_expander(&self, bits: u8) -> Result<(), I2cError> {
        self.i2c.write(self.address, &[bits | self.backlight])
    }
}
