//! TOML configuration loading
//!
//! Missing tables and keys keep their defaults, so a file only needs to
//! name what differs from the reference board:
//!
//! ```toml
//! [bus]
//! busy_poll_limit = 200
//!
//! [tuner]
//! tuner_address = 0x63
//! ```

use core::fmt;

use super::types::Config;

/// Configuration load error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Text is not valid TOML or has the wrong value types
    Parse,
    /// Values parse but cannot drive the hardware
    InvalidLayout,
    /// A chip address does not fit in 7 bits
    InvalidAddress,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse => write!(f, "invalid configuration text"),
            ConfigError::InvalidLayout => write!(f, "invalid sequencer layout"),
            ConfigError::InvalidAddress => write!(f, "chip address is not 7-bit"),
        }
    }
}

/// Parse TOML text into a [`Config`]
pub fn parse_toml(input: &str) -> Result<Config, ConfigError> {
    let config: Config = ::toml::from_str(input).map_err(|_| {
        warn!("config: TOML parse failed");
        ConfigError::Parse
    })?;

    if !config.bus.is_valid() {
        warn!("config: unusable bus layout");
        return Err(ConfigError::InvalidLayout);
    }

    if !config.tuner.is_valid() {
        warn!("config: tuner address out of range");
        return Err(ConfigError::InvalidAddress);
    }

    Ok(config)
}
