//! I2C transfer abstractions
//!
//! A transfer is an ordered list of addressed messages sharing one
//! start/stop pair. Each message gets its own (repeated) start and address
//! byte, so a register pointer write followed by a read works the same way
//! as two writes to a gateway chip followed by a read.

/// Highest 7-bit slave address
pub const MAX_ADDRESS: u8 = 0x7F;

/// Direction bit carried in the address byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Master transmits
    Write = 0,
    /// Master receives
    Read = 1,
}

/// Payload of one message
#[derive(Debug, PartialEq, Eq)]
pub enum Payload<'a> {
    /// Bytes to transmit
    Write(&'a [u8]),
    /// Buffer to fill; its length is the number of bytes to read
    Read(&'a mut [u8]),
}

/// One addressed operation within a transfer
#[derive(Debug, PartialEq, Eq)]
pub struct Message<'a> {
    /// 7-bit slave address
    pub address: u8,
    /// Data to send or buffer to receive into
    pub payload: Payload<'a>,
}

impl<'a> Message<'a> {
    /// Create a write message
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `data` - Bytes to write
    pub fn write(address: u8, data: &'a [u8]) -> Self {
        Self {
            address,
            payload: Payload::Write(data),
        }
    }

    /// Create a read message that fills `buf`
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `buf` - Buffer to read into; its length sets the read count
    pub fn read(address: u8, buf: &'a mut [u8]) -> Self {
        Self {
            address,
            payload: Payload::Read(buf),
        }
    }

    /// Transfer direction of this message
    pub fn direction(&self) -> Direction {
        match self.payload {
            Payload::Write(_) => Direction::Write,
            Payload::Read(_) => Direction::Read,
        }
    }

    /// Number of payload bytes (written or to be read)
    pub fn len(&self) -> usize {
        match &self.payload {
            Payload::Write(data) => data.len(),
            Payload::Read(buf) => buf.len(),
        }
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the address fits in 7 bits
    pub fn has_valid_address(&self) -> bool {
        self.address <= MAX_ADDRESS
    }

    /// Address byte as sent on the wire: `address << 1 | direction`
    ///
    /// Only meaningful for a valid 7-bit address; bit 7 is shifted out.
    pub fn address_byte(&self) -> u8 {
        (self.address << 1) | self.direction() as u8
    }
}

/// I2C bus master
///
/// Implemented by the transaction driver; chip drivers are written against
/// this trait so they can run on the simulator in tests.
pub trait I2cBus {
    /// Error type for I2C operations
    type Error;

    /// Execute all messages as one transaction (single start/stop pair)
    ///
    /// Read buffers are filled only when the whole transaction succeeds.
    ///
    /// # Arguments
    /// * `messages` - Messages in bus order, each with a 7-bit address
    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<(), Self::Error>;

    /// Write data to a device at the given address
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `data` - Bytes to write
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.transfer(&mut [Message::write(address, data)])
    }

    /// Write then read in a single transaction (repeated start)
    ///
    /// This is commonly used to write a register address then read data.
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `write_data` - Bytes to write (typically register address)
    /// * `read_buf` - Buffer to read into
    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.transfer(&mut [
            Message::write(address, write_data),
            Message::read(address, read_buf),
        ])
    }
}

impl<T: I2cBus + ?Sized> I2cBus for &mut T {
    type Error = T::Error;

    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<(), Self::Error> {
        (**self).transfer(messages)
    }
}
