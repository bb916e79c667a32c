//! Bus engine for the tunebus I2C sequencer
//!
//! The card has no I2C controller in the usual sense. A small sequencer
//! replays 4-bit opcodes from a command memory onto SCL/SDA, so every
//! transaction is compiled into a program, written into that memory and
//! triggered. This crate holds everything above the register windows:
//!
//! - Opcode alphabet and bus-action encoder
//! - Sequence writer packing opcodes two per byte
//! - Flush & status controller (trigger, bounded waits, status decode)
//! - Transaction driver with exclusive access and readback
//! - Configuration types
//! - An in-memory sequencer model (`sim` feature) for host tests

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to every module
mod fmt;

pub mod config;
pub mod driver;
pub mod error;
pub mod flush;
pub mod opcode;
pub mod sequence;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use config::{BusConfig, Config, TunerConfig};
pub use driver::TransactionDriver;
pub use error::BusError;
pub use flush::BusStatus;
pub use opcode::{BusAction, PrimitiveCommand};
