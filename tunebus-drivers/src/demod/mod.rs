//! Demodulator drivers

pub mod tc90522;

pub use tc90522::{power, AgcMode, DemodError, Tc90522};
