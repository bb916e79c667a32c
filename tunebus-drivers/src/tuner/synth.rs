//! Synthesizer program for the MxL301RF
//!
//! The RF frequency is programmed as a fixed-point word with 6 fractional
//! bits: integer MHz in the upper bits, then a binary expansion of the
//! sub-MHz remainder. Frequencies close to known spurs also get a spur
//! shift pair.

/// Tuner register addresses
pub mod reg {
    /// Tune control (0 abort, 1 start)
    pub const TUNE: u8 = 0x13;
    /// Channel bandwidth
    pub const BANDWIDTH: u8 = 0x10;
    /// Frequency word, low byte
    pub const FREQ_LO: u8 = 0x11;
    /// Frequency word, high byte
    pub const FREQ_HI: u8 = 0x12;
    /// Synthesizer lock status
    pub const LOCK: u8 = 0x16;
    /// Spur shift value
    pub const SPUR_VALUE: u8 = 0x61;
    /// Spur shift direction
    pub const SPUR_DIR: u8 = 0x62;
}

/// Spur-avoidance table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpurShift {
    /// Channel centre in kHz
    pub center_khz: u32,
    /// Half-width of the affected band in kHz
    pub tolerance_khz: u32,
    /// Shift value (register 0x61)
    pub value: u8,
    /// Shift direction (low bits of register 0x62)
    pub direction: u8,
}

impl SpurShift {
    const fn new(center_khz: u32, tolerance_khz: u32, value: u8, direction: u8) -> Self {
        Self {
            center_khz,
            tolerance_khz,
            value,
            direction,
        }
    }

    /// True if `hz` lies inside this entry's band, edges included
    pub fn contains(&self, hz: u32) -> bool {
        let low = (self.center_khz - self.tolerance_khz) as u64 * 1000;
        let high = (self.center_khz + self.tolerance_khz) as u64 * 1000;
        (low..=high).contains(&(hz as u64))
    }

    /// Register values (0x61, 0x62) for this entry
    pub fn registers(&self) -> (u8, u8) {
        (self.value, 0xA0 | self.direction)
    }
}

/// Spur table, searched in order; the first match wins
///
/// 191 500 ± 300 and 191 143 ± 300 kHz overlap between 191 200 and
/// 191 443 kHz, where the earlier entry applies.
pub const SPUR_TABLE: [SpurShift; 17] = [
    SpurShift::new(64_500, 500, 0x92, 0x07),
    SpurShift::new(191_500, 300, 0xE2, 0x07),
    SpurShift::new(205_500, 500, 0x2C, 0x04),
    SpurShift::new(212_500, 500, 0x1E, 0x04),
    SpurShift::new(226_500, 500, 0xD4, 0x07),
    SpurShift::new(99_143, 500, 0x9C, 0x07),
    SpurShift::new(173_143, 500, 0xD4, 0x07),
    SpurShift::new(191_143, 300, 0xD4, 0x07),
    SpurShift::new(207_143, 500, 0xCE, 0x07),
    SpurShift::new(225_143, 500, 0xCE, 0x07),
    SpurShift::new(243_143, 500, 0xD4, 0x07),
    SpurShift::new(261_143, 500, 0xD4, 0x07),
    SpurShift::new(291_143, 500, 0xD4, 0x07),
    SpurShift::new(339_143, 500, 0x2C, 0x04),
    SpurShift::new(117_143, 500, 0x7A, 0x07),
    SpurShift::new(135_143, 300, 0x7A, 0x07),
    SpurShift::new(153_143, 500, 0x01, 0x07),
];

/// Spur registers when no entry matches
pub const NO_SPUR: (u8, u8) = (0x00, 0xA0);

/// First spur entry covering `hz`
pub fn spur_shift(hz: u32) -> Option<&'static SpurShift> {
    SPUR_TABLE.iter().find(|s| s.contains(hz))
}

/// Highest RF frequency the tuner accepts
pub const MAX_FREQUENCY_HZ: u32 = 770_000_000;

/// Fixed-point frequency word for `hz`
///
/// Each of the 6 steps halves the divisor (starting at 1 MHz) and sets
/// the next fractional bit when the remainder is strictly larger. A
/// remainder above 7812 Hz (half of the last step) rounds up. `None` if
/// the word does not fit the 16-bit register pair.
pub fn frequency_word(hz: u32) -> Option<u16> {
    let mut word = hz / 1_000_000;
    let mut rest = hz % 1_000_000;
    let mut divisor = 1_000_000;

    for _ in 0..6 {
        word <<= 1;
        divisor /= 2;
        if rest > divisor {
            rest -= divisor;
            word += 1;
        }
    }
    if rest > 7812 {
        word += 1;
    }

    u16::try_from(word).ok()
}

/// Number of register pairs in a tune program
pub const PROGRAM_PAIRS: usize = 10;

/// Pairs written in the first passthrough transaction
pub const FIRST_HALF_PAIRS: usize = 7;

/// Register/value program that retunes the synthesizer to `hz`
///
/// Returned as flat `[reg, value, reg, value, ...]` bytes ready for the
/// passthrough, or `None` above [`MAX_FREQUENCY_HZ`].
#[rustfmt::skip]
pub fn program(hz: u32) -> Option<[u8; PROGRAM_PAIRS * 2]> {
    if hz > MAX_FREQUENCY_HZ {
        return None;
    }
    let word = frequency_word(hz)?;
    let (spur_value, spur_dir) = spur_shift(hz).map_or(NO_SPUR, SpurShift::registers);

    Some([
        reg::TUNE, 0x00,
        0x3B, 0xC0,
        0x3B, 0x80,
        reg::BANDWIDTH, 0x95,
        0x1A, 0x05,
        reg::SPUR_VALUE, spur_value,
        reg::SPUR_DIR, spur_dir,
        reg::FREQ_LO, word as u8,
        reg::FREQ_HI, (word >> 8) as u8,
        reg::TUNE, 0x01,
    ])
}

/// IDAC calibration block written after each tune
#[rustfmt::skip]
pub const IDAC_SETTING: [u8; 16] = [
    0x0D, 0x00,
    0x0C, 0x67,
    0x6F, 0x89,
    0x70, 0x0C,
    0x6F, 0x8A,
    0x70, 0x0E,
    0x6F, 0x8B,
    0x70, 0x1C,
];

/// Lock status: RF synthesizer (0x0C) and reference synthesizer (0x03)
pub fn is_locked(status: u8) -> bool {
    status & 0x0C == 0x0C && status & 0x03 == 0x03
}
