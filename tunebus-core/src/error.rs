//! Bus error taxonomy

use core::fmt;

/// Errors returned by a bus transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Transaction shape the sequencer cannot express (message count, read
    /// first, zero-length read, program larger than the command memory).
    /// Nothing was written to the hardware.
    UnsupportedTransaction,
    /// A slave did not acknowledge a byte
    AckFailure,
    /// The sequencer was still busy with an earlier program
    Timeout,
    /// The triggered program never reported completion
    DriverMalfunction,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusError::UnsupportedTransaction => write!(f, "unsupported transaction"),
            BusError::AckFailure => write!(f, "slave did not acknowledge"),
            BusError::Timeout => write!(f, "sequencer busy timeout"),
            BusError::DriverMalfunction => write!(f, "sequencer did not complete"),
        }
    }
}

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

        match self {
            BusError::AckFailure => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            BusError::Timeout | BusError::DriverMalfunction => ErrorKind::Bus,
            BusError::UnsupportedTransaction => ErrorKind::Other,
        }
    }
}
