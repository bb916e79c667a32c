//! Tunebus Hardware Abstraction Layer
//!
//! This crate defines the two seams between the bus engine and the outside
//! world:
//!
//! - [`sequencer::SequencerPort`] - what the engine consumes from the
//!   memory-mapped sequencer block (command memory, control word, status word)
//! - [`i2c::I2cBus`] - what the engine exposes to chip drivers (addressed
//!   multi-message transfers)
//!
//! plus [`clock::Clock`], the monotonic time source chip drivers use for
//! deadlines.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Chip drivers (tunebus-drivers)         │
//! └─────────────────────────────────────────┘
//!                     │ I2cBus
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  Bus engine (tunebus-core)              │
//! └─────────────────────────────────────────┘
//!                     │ SequencerPort
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  Mapped card registers / simulator      │
//! └─────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod clock;
pub mod i2c;
pub mod sequencer;

// Re-export key traits at crate root for convenience
pub use clock::Clock;
pub use i2c::{Direction, I2cBus, Message, MAX_ADDRESS};
pub use sequencer::SequencerPort;
