//! Configuration type definitions

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tunebus_hal::MAX_ADDRESS;

/// Highest program start the trigger word can address (13 bits)
pub const MAX_START_OFFSET: u32 = 1 << 13;

/// Sequencer memory layout and busy-wait bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BusConfig {
    /// Byte offset of the command region (also the readback window)
    pub data_offset: u32,
    /// Command region size in bytes
    pub capacity: u32,
    /// Start of the program resident in command memory (nibble offset)
    pub resident_start: u32,
    /// Status polls before a wait gives up
    pub busy_poll_limit: u32,
    /// Sleep between status polls
    pub busy_poll_interval_ms: u32,
}

impl BusConfig {
    /// Earthsoft PT3 layout
    pub const PT3: Self = Self {
        data_offset: 0x800,
        capacity: 2048,
        resident_start: 0x17FA,
        busy_poll_limit: 1000,
        busy_poll_interval_ms: 1,
    };

    /// Check the layout is usable by the trigger word
    pub fn is_valid(&self) -> bool {
        self.capacity > 0
            && self.resident_start < MAX_START_OFFSET
            && self.busy_poll_limit > 0
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::PT3
    }
}

/// Tuner addressing and lock timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TunerConfig {
    /// 7-bit address of the demodulator
    pub demod_address: u8,
    /// 7-bit address of the tuner behind the demodulator
    pub tuner_address: u8,
    /// Wall-clock time allowed for the synthesizers to lock, counted from
    /// the first lock poll
    pub lock_budget_ms: u32,
    /// Sleep between lock polls
    pub lock_poll_interval_ms: u32,
    /// Pause between the halves of the tune program
    pub settle_ms: u32,
}

impl TunerConfig {
    /// Terrestrial front end of the PT3 (first tuner pair)
    pub const PT3_TERRESTRIAL: Self = Self {
        demod_address: 0x10,
        tuner_address: 0x62,
        lock_budget_ms: 100,
        lock_poll_interval_ms: 1,
        settle_ms: 1,
    };

    /// Check both chips have 7-bit addresses
    pub fn is_valid(&self) -> bool {
        self.demod_address <= MAX_ADDRESS && self.tuner_address <= MAX_ADDRESS
    }
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self::PT3_TERRESTRIAL
    }
}

/// Complete configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    pub bus: BusConfig,
    pub tuner: TunerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pt3_defaults() {
        let bus = BusConfig::default();
        assert_eq!(bus.data_offset, 0x800);
        assert_eq!(bus.resident_start, 0x17FA);
        assert!(bus.is_valid());
    }

    #[test]
    fn test_resident_start_out_of_range() {
        let bus = BusConfig {
            resident_start: MAX_START_OFFSET,
            ..BusConfig::PT3
        };
        assert!(!bus.is_valid());
    }

    #[test]
    fn test_tuner_addresses() {
        assert!(TunerConfig::default().is_valid());
        let wide = TunerConfig {
            tuner_address: 0xC4,
            ..TunerConfig::default()
        };
        assert!(!wide.is_valid());
    }
}
