//! Chip drivers for the tunebus front end
//!
//! The terrestrial front end is a demodulator with the tuner hanging off
//! its I2C passthrough. Both drivers are written against
//! [`tunebus_hal::I2cBus`], so they run on the sequencer-backed
//! transaction driver or on anything else that can issue multi-message
//! transfers.
//!
//! - [`demod::Tc90522`] - demodulator registers, tuner passthrough, AGC
//! - [`tuner::Mxl301rf`] - synthesizer programming, lock poll, power states
//! - [`tuner::channels`] - ISDB-T channel numbers to RF frequencies
//! - [`card`] - power sequencing of the front end on the sequencer bus

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to every module
mod fmt;

pub mod card;
pub mod demod;
pub mod tuner;

pub use demod::{AgcMode, DemodError, Tc90522};
pub use tuner::{Mxl301rf, TuneError, TuneState};
