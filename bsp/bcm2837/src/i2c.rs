// =============================================================================
// ferropi - I2C Master Driver
// =============================================================================
// Polled master transfers on the BCM2837 BSC controller (BSC1 is the one
// routed to the header pins). Transfers are short (the LCD sends a few
// bytes at a time), so the whole payload fits in the 16-byte FIFO and is
// queued before the transfer starts.
// =============================================================================

use crate::mmio::Bus;

/// Register offsets from the BSC base.
mod regs {
    pub const CONTROL: usize = 0x00;
    pub const STATUS: usize = 0x04;
    pub const DLEN: usize = 0x08;
    pub const SLAVE_ADDR: usize = 0x0C;
    pub const FIFO: usize = 0x10;
    pub const DIV: usize = 0x14;
}

/// Control register bits.
mod control {
    /// Controller enable
    pub const I2CEN: u32 = 1 << 15;
    /// Start transfer
    pub const ST: u32 = 1 << 7;
    /// Clear FIFO
    pub const CLEAR_FIFO: u32 = 1 << 4;
    /// Read transfer (write when clear)
    pub const READ: u32 = 1 << 0;
}

/// Status register bits. Error and DONE bits clear on write-one.
mod status {
    /// Clock stretch timeout
    pub const CLKT: u32 = 1 << 9;
    /// Slave did not acknowledge
    pub const ERR: u32 = 1 << 8;
    /// FIFO holds at least one received byte
    pub const RXD: u32 = 1 << 5;
    /// Transfer complete
    pub const DONE: u32 = 1 << 1;
}

/// Ways a transfer can fail.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum I2cError {
    /// The slave did not acknowledge its address or a data byte.
    Nack,
    /// The slave held the clock longer than the stretch timeout.
    ClockStretchTimeout,
    /// A zero-length transfer was requested.
    EmptyTransfer,
}

/// A BSC I2C master.
pub struct I2c<B: Bus> {
    bus: B,
}

impl<B: Bus> I2c<B> {
    pub const fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Configure the bus clock and enable the controller.
    ///
    /// The divider is applied to the 250 MHz core clock; 2500 gives the
    /// standard 100 kHz rate.
    pub fn init(&self, clock_divider: u32) {
        self.bus.write_reg(regs::CONTROL, 0);
        self.bus.write_reg(regs::DIV, clock_divider);
        self.bus.write_reg(regs::CONTROL, control::I2CEN);
    }

    /// Send `data` to the slave at `address`.
    ///
    /// The payload is queued into the FIFO before the transfer starts, so
    /// it must not exceed the 16-byte FIFO depth.
    pub fn write(&self, address: u8, data: &[u8]) -> Result<(), I2cError> {
        if data.is_empty() {
            return Err(I2cError::EmptyTransfer);
        }

        self.begin_transfer(address, data.len() as u32);
        for &byte in data {
            self.bus.write_reg(regs::FIFO, u32::from(byte));
        }
        self.bus
            .write_reg(regs::CONTROL, control::I2CEN | control::ST);

        self.wait_for(status::DONE)?;
        self.bus.write_reg(regs::STATUS, status::DONE);
        Ok(())
    }

    /// Fill `buffer` with bytes read from the slave at `address`.
    pub fn read(&self, address: u8, buffer: &mut [u8]) -> Result<(), I2cError> {
        if buffer.is_empty() {
            return Err(I2cError::EmptyTransfer);
        }

        self.begin_transfer(address, buffer.len() as u32);
        self.bus.write_reg(
            regs::CONTROL,
            control::I2CEN | control::ST | control::READ,
        );

        for slot in buffer.iter_mut() {
            self.wait_for(status::RXD)?;
            *slot = (self.bus.read_reg(regs::FIFO) & 0xFF) as u8;
        }

        self.wait_for(status::DONE)?;
        self.bus.write_reg(regs::STATUS, status::DONE);
        Ok(())
    }

    /// Common transfer setup: empty FIFO, clear latched status, program
    /// the slave address and byte count.
    fn begin_transfer(&self, address: u8, length: u32) {
        self.bus.write_reg(regs::CONTROL, control::CLEAR_FIFO);
        self.bus
            .write_reg(regs::STATUS, status::CLKT | status::ERR | status::DONE);
        self.bus.write_reg(regs::SLAVE_ADDR, u32::from(address));
        self.bus.write_reg(regs::DLEN, length);
    }

    /// Spin until `condition` appears in the status register, failing fast
    /// on a NACK or clock stretch timeout.
    fn wait_for(&self, condition: u32) -> Result<(), I2cError> {
        loop {
            let st = self.bus.read_reg(regs::STATUS);
            if st & status::ERR != 0 {
                return Err(I2cError::Nack);
            }
            if st & status::CLKT != 0 {
                return Err(I2cError::ClockStretchTimeout);
            }
            if st & condition != 0 {
                return Ok(());
            }
            core::hint::spin_loop();
        }
    }
}

#[cfg(test)]
impl<B: Bus> I2c<B> {
    pub(crate) fn bus(&self) -> &B {
        &self.bus
    }
}
