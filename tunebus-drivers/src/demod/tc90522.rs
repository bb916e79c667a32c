//! TC90522 ISDB-T demodulator
//!
//! Only the parts the terrestrial front end needs: plain register access,
//! the I2C passthrough to the tuner, the AGC control registers and the
//! board power switches wired to the demodulator's GPIO register.
//!
//! # Passthrough
//!
//! ```text
//! tuner write   demod <- [0xFE, tuner << 1, payload...]
//! tuner read    demod <- [0xFE, tuner << 1, 0xFB, reg]
//!               demod <- [0xFE, tuner << 1 | 1]  (repeated start)
//!               demod -> 1 byte
//! ```

use core::fmt;

use heapless::Vec;
use tunebus_hal::{I2cBus, Message};

/// TC90522 register addresses
pub mod reg {
    /// IMS reset (bit 6)
    pub const IMSRST: u8 = 0x01;
    /// Tuner power / sleep control
    pub const SLEEP: u8 = 0x03;
    /// AGC mode
    pub const AGC_MODE: u8 = 0x23;
    /// AGC enable
    pub const AGC_ENABLE: u8 = 0x25;
    /// Terrestrial demodulator init
    pub const INIT_1C: u8 = 0x1C;
    /// Terrestrial TS pin mode
    pub const INIT_1D: u8 = 0x1D;
    /// Board power switches
    pub const POWER: u8 = 0x1E;
    /// Tuner read-pointer command (sent to the tuner)
    pub const TUNER_READ: u8 = 0xFB;
    /// Passthrough to the tuner
    pub const PASSTHROUGH: u8 = 0xFE;
}

/// Switch bits for [`reg::POWER`]
pub mod power {
    /// Everything off
    pub const OFF: u8 = 0x00;
    /// LNA amplifier supply
    pub const AMP_ON: u8 = 0x04;
    /// Tuner supply
    pub const TUNER_ON: u8 = 0x40;
    /// Bits that must always be written set
    pub const FIXED: u8 = 0b1001_1001;
}

/// Longest tuner payload carried in one passthrough write
pub const MAX_PASSTHROUGH: usize = 30;

/// AGC operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AgcMode {
    /// Demodulator controls the tuner gain
    Auto,
    /// Gain frozen, used while the synthesizer retunes
    Manual,
}

impl AgcMode {
    /// Values for the AGC enable and mode registers
    pub fn registers(self) -> (u8, u8) {
        match self {
            AgcMode::Auto => (0x40, 0x4C),
            AgcMode::Manual => (0x00, 0x4D),
        }
    }
}

/// Demodulator access errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DemodError<E> {
    /// Underlying bus error
    Bus(E),
    /// Payload longer than one passthrough write can carry
    PayloadTooLong,
}

impl<E> From<E> for DemodError<E> {
    fn from(e: E) -> Self {
        DemodError::Bus(e)
    }
}

impl<E: fmt::Display> fmt::Display for DemodError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemodError::Bus(e) => write!(f, "bus error: {}", e),
            DemodError::PayloadTooLong => write!(f, "passthrough payload too long"),
        }
    }
}

/// TC90522 demodulator with a tuner behind its passthrough
pub struct Tc90522<B: I2cBus> {
    bus: B,
    address: u8,
    tuner_address: u8,
}

impl<B: I2cBus> Tc90522<B> {
    /// Wrap a bus handle
    ///
    /// # Arguments
    /// * `bus` - Bus the demodulator sits on
    /// * `address` - 7-bit demodulator address
    /// * `tuner_address` - 7-bit address of the tuner behind the passthrough
    pub fn new(bus: B, address: u8, tuner_address: u8) -> Self {
        Self {
            bus,
            address,
            tuner_address,
        }
    }

    /// Demodulator address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Tuner address behind the passthrough
    pub fn tuner_address(&self) -> u8 {
        self.tuner_address
    }

    /// Release the bus
    pub fn release(self) -> B {
        self.bus
    }

    /// Write `data` starting at register `reg`
    pub fn write_reg(&mut self, reg: u8, data: &[u8]) -> Result<(), DemodError<B::Error>> {
        let mut buf: Vec<u8, { MAX_PASSTHROUGH + 2 }> = Vec::new();
        buf.push(reg).map_err(|_| DemodError::PayloadTooLong)?;
        buf.extend_from_slice(data)
            .map_err(|_| DemodError::PayloadTooLong)?;
        self.bus.write(self.address, &buf)?;
        Ok(())
    }

    /// Read `buf.len()` bytes starting at register `reg`
    pub fn read_reg(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), DemodError<B::Error>> {
        self.bus.write_read(self.address, &[reg], buf)?;
        Ok(())
    }

    /// Forward `payload` to the tuner in a single write
    pub fn tuner_write(&mut self, payload: &[u8]) -> Result<(), DemodError<B::Error>> {
        if payload.len() > MAX_PASSTHROUGH {
            return Err(DemodError::PayloadTooLong);
        }
        let mut buf: Vec<u8, { MAX_PASSTHROUGH + 2 }> = Vec::new();
        buf.push(reg::PASSTHROUGH)
            .map_err(|_| DemodError::PayloadTooLong)?;
        buf.push(self.tuner_address << 1)
            .map_err(|_| DemodError::PayloadTooLong)?;
        buf.extend_from_slice(payload)
            .map_err(|_| DemodError::PayloadTooLong)?;
        self.bus.write(self.address, &buf)?;
        Ok(())
    }

    /// Read one tuner register through the passthrough
    pub fn tuner_read(&mut self, tuner_reg: u8) -> Result<u8, DemodError<B::Error>> {
        self.tuner_write(&[reg::TUNER_READ, tuner_reg])?;

        let mut value = [0u8; 1];
        let select = [reg::PASSTHROUGH, (self.tuner_address << 1) | 1];
        self.bus.transfer(&mut [
            Message::write(self.address, &select),
            Message::read(self.address, &mut value),
        ])?;
        Ok(value[0])
    }

    /// Reset the IMS block
    pub fn ims_reset(&mut self) -> Result<(), DemodError<B::Error>> {
        self.write_reg(reg::IMSRST, &[1 << 6])
    }

    /// Switch the AGC and reset the IMS so the change takes effect
    pub fn set_agc(&mut self, mode: AgcMode) -> Result<(), DemodError<B::Error>> {
        let (enable, agc_mode) = mode.registers();
        self.write_reg(reg::AGC_ENABLE, &[enable])?;
        self.write_reg(reg::AGC_MODE, &[agc_mode])?;
        self.ims_reset()
    }

    /// Terrestrial power-up: IMS reset, demod init, default TS pin mode
    pub fn init_terrestrial(&mut self) -> Result<(), DemodError<B::Error>> {
        self.ims_reset()?;
        self.write_reg(reg::INIT_1C, &[0x10])?;
        self.write_reg(reg::INIT_1D, &[0x01])
    }

    /// Set the board power switches
    ///
    /// `switches` is a combination of the [`power`] bits.
    pub fn set_power(&mut self, switches: u8) -> Result<(), DemodError<B::Error>> {
        self.write_reg(reg::POWER, &[switches | power::FIXED])
    }

    /// Gate the tuner supply
    pub fn set_tuner_sleep(&mut self, sleep: bool) -> Result<(), DemodError<B::Error>> {
        let value = if sleep { 0x90 } else { 0x80 };
        self.write_reg(reg::SLEEP, &[value])
    }
}
