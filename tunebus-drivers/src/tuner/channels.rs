//! ISDB-T channel plan
//!
//! [`resolve`] accepts either a real frequency in Hz or one of the small
//! channel codes used by the recording tools, and returns the RF centre
//! frequency to program.
//!
//! | Code      | Meaning                          |
//! |-----------|----------------------------------|
//! | 1-3       | VHF 1-3                          |
//! | 4-12      | VHF 4-12                         |
//! | 13-62     | UHF 13-62                        |
//! | 77-86     | CATV C13-C22 (64 + channel)      |
//! | 87-126    | CATV C23-C62 (64 + channel)      |
//! | 128-239   | raw table index + 128            |
//!
//! Anything else falls back to [`NHK`].

/// Codes at or above this are frequencies in Hz
pub const MIN_FREQUENCY_HZ: u32 = 90_000_000;

/// Channel centre frequencies in Hz, in table index order
pub const RF_TABLE: [u32; 112] = [
    93_142_857, 99_142_857, 105_142_857, 111_142_857,
    117_142_857, 123_142_857, 129_142_857, 135_142_857,
    141_142_857, 147_142_857, 153_142_857, 159_142_857,
    167_142_857, 173_142_857, 179_142_857, 185_142_857,
    191_142_857, 195_142_857, 201_142_857, 207_142_857,
    213_142_857, 219_142_857, 225_142_857, 231_142_857,
    237_142_857, 243_142_857, 249_142_857, 255_142_857,
    261_142_857, 267_142_857, 273_142_857, 279_142_857,
    285_142_857, 291_142_857, 297_142_857, 303_142_857,
    309_142_857, 315_142_857, 321_142_857, 327_142_857,
    333_142_857, 339_142_857, 345_142_857, 351_142_857,
    357_142_857, 363_142_857, 369_142_857, 375_142_857,
    381_142_857, 387_142_857, 393_142_857, 399_142_857,
    405_142_857, 411_142_857, 417_142_857, 423_142_857,
    429_142_857, 435_142_857, 441_142_857, 447_142_857,
    453_142_857, 459_142_857, 465_142_857, 473_142_857,
    479_142_857, 485_142_857, 491_142_857, 497_142_857,
    503_142_857, 509_142_857, 515_142_857, 521_142_857,
    527_142_857, 533_142_857, 539_142_857, 545_142_857,
    551_142_857, 557_142_857, 563_142_857, 569_142_857,
    575_142_857, 581_142_857, 587_142_857, 593_142_857,
    599_142_857, 605_142_857, 611_142_857, 617_142_857,
    623_142_857, 629_142_857, 635_142_857, 641_142_857,
    647_142_857, 653_142_857, 659_142_857, 665_142_857,
    671_142_857, 677_142_857, 683_142_857, 689_142_857,
    695_142_857, 701_142_857, 707_142_857, 713_142_857,
    719_142_857, 725_142_857, 731_142_857, 737_142_857,
    743_142_857, 749_142_857, 755_142_857, 761_142_857,
];

/// Default channel (NHK General, Tokyo)
pub const NHK: u32 = RF_TABLE[77];

fn entry(index: u32) -> u32 {
    RF_TABLE.get(index as usize).copied().unwrap_or(NHK)
}

/// Resolve a frequency or channel code to an RF frequency in Hz
pub fn resolve(code: u32) -> u32 {
    match code {
        MIN_FREQUENCY_HZ.. => code,
        256.. => NHK,
        128.. => entry(code - 128),
        64.. => match code - 64 {
            c @ 23.. => entry(c - 1),
            c @ 13.. => entry(c - 10),
            _ => NHK,
        },
        63.. => NHK,
        13.. => entry(code + 50),
        4.. => entry(code + 9),
        1.. => entry(code - 1),
        0 => NHK,
    }
}

/// Broadcast identity of a table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelInfo {
    /// Cable channel (C-number) rather than terrestrial
    pub catv: bool,
    /// Channel number within its band
    pub number: u32,
    /// Nominal frequency in MHz
    pub mhz: u32,
}

/// (last index, catv, first number - first index) per band, in index order
const BANDS: [(u32, bool, u32); 5] = [
    (2, false, 3),
    (12, true, 22),
    (21, false, 12),
    (62, true, 63),
    (111, false, 61),
];

/// Describe table entry `index`, `None` past the end of [`RF_TABLE`]
pub fn channel_info(index: u32) -> Option<ChannelInfo> {
    let mut offset = 0i32;
    if index >= 12 {
        offset += 2;
    }
    if index >= 17 {
        offset -= 2;
    }
    if index >= 63 {
        offset += 2;
    }
    let mhz = (93 + index as i64 * 6 + offset as i64) as u32;

    BANDS
        .iter()
        .find(|(last, _, _)| index <= *last)
        .map(|&(last, catv, base)| ChannelInfo {
            catv,
            number: index + base - last,
            mhz,
        })
}
