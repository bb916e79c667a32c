//! Configuration types
//!
//! Hardware layout of the sequencer window and tuner timing. Everything has
//! a working default for the reference board; the optional `toml` feature
//! reads overrides from text.

#[cfg(feature = "toml")]
pub mod toml;
pub mod types;

#[cfg(feature = "toml")]
pub use self::toml::{parse_toml, ConfigError};
pub use types::*;
