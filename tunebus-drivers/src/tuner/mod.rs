//! Terrestrial tuner drivers

pub mod channels;
pub mod mxl301rf;
pub mod state;
pub mod synth;

use core::fmt;

pub use mxl301rf::Mxl301rf;
pub use state::{TuneEvent, TuneState};

/// Errors returned by a tune operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TuneError<E> {
    /// A register write or read failed; the sequence was aborted
    Bus(E),
    /// The synthesizers did not lock within the budget
    Timeout,
    /// The target frequency is above the tuner's range; nothing was sent
    OutOfRange,
}

impl<E> From<E> for TuneError<E> {
    fn from(e: E) -> Self {
        TuneError::Bus(e)
    }
}

impl<E: fmt::Display> fmt::Display for TuneError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuneError::Bus(e) => write!(f, "tuner bus error: {}", e),
            TuneError::Timeout => write!(f, "tuner did not lock"),
            TuneError::OutOfRange => write!(f, "frequency out of tuner range"),
        }
    }
}
