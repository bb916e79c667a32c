//! Sequencer opcodes and the bus-action encoder
//!
//! The sequencer understands a fixed alphabet of 4-bit primitives. The
//! numeric values are the wire encoding decoded by the hardware, so the
//! discriminants below are part of the contract.
//!
//! # Encodings
//!
//! ```text
//! Start        DataHigh ClockHigh DataLow ClockLow
//! Stop         DataLow ClockHigh DataHigh
//! Write byte   8 x (DataHighNoAck | DataLowNoAck), MSB first, DataHighAck0
//! Read byte    8 x DataHighRead, then DataLowNoAck (ACK) or DataHighNoAck
//!              (NACK, last byte only)
//! ```

/// One sequencer primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PrimitiveCommand {
    /// Stop reading the command memory
    End = 0x00,
    /// Load address
    SetAddress = 0x01,
    /// Drive SCL low
    ClockLow = 0x02,
    /// Release SCL high
    ClockHigh = 0x03,
    /// Drive SDA low
    DataLow = 0x04,
    /// Release SDA high
    DataHigh = 0x05,
    /// Reset the sequencer
    Reset = 0x06,
    /// Wait roughly one millisecond
    Idle = 0x07,
    /// Clock one bit with SDA low, ack not sampled
    DataLowNoAck = 0x08,
    /// Clock one bit with SDA high, ack not sampled
    DataHighNoAck = 0x0C,
    /// Clock one bit with SDA released and capture it
    DataHighRead = 0x0D,
    /// Clock with SDA released and expect the slave to pull it low (ACK)
    DataHighAck0 = 0x0E,
    /// Clock with SDA released and expect it to stay high
    DataHighAck1 = 0x0F,
}

impl PrimitiveCommand {
    /// Raw 4-bit wire value
    pub const fn nibble(self) -> u8 {
        self as u8
    }

    /// Decode a raw nibble; unassigned values (0x09-0x0B) yield `None`
    pub const fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble & 0x0F {
            0x00 => Some(Self::End),
            0x01 => Some(Self::SetAddress),
            0x02 => Some(Self::ClockLow),
            0x03 => Some(Self::ClockHigh),
            0x04 => Some(Self::DataLow),
            0x05 => Some(Self::DataHigh),
            0x06 => Some(Self::Reset),
            0x07 => Some(Self::Idle),
            0x08 => Some(Self::DataLowNoAck),
            0x0C => Some(Self::DataHighNoAck),
            0x0D => Some(Self::DataHighRead),
            0x0E => Some(Self::DataHighAck0),
            0x0F => Some(Self::DataHighAck1),
            _ => None,
        }
    }

    /// Bit-command for one data bit of a written byte
    const fn for_bit(bit: bool) -> Self {
        if bit {
            Self::DataHighNoAck
        } else {
            Self::DataLowNoAck
        }
    }
}

/// Anything that accepts primitives in program order
pub trait CommandSink {
    /// Append one primitive
    fn push(&mut self, command: PrimitiveCommand);
}

impl<T: CommandSink + ?Sized> CommandSink for &mut T {
    fn push(&mut self, command: PrimitiveCommand) {
        (**self).push(command)
    }
}

/// Primitives emitted for a start condition
pub const START: [PrimitiveCommand; 4] = [
    PrimitiveCommand::DataHigh,
    PrimitiveCommand::ClockHigh,
    PrimitiveCommand::DataLow,
    PrimitiveCommand::ClockLow,
];

/// Primitives emitted for a stop condition
pub const STOP: [PrimitiveCommand; 3] = [
    PrimitiveCommand::DataLow,
    PrimitiveCommand::ClockHigh,
    PrimitiveCommand::DataHigh,
];

/// Primitives per transferred byte (8 data bits + acknowledge clock)
pub const BYTE_LEN: usize = 9;

/// A single bus intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusAction<'a> {
    /// Start (or repeated start) condition
    Start,
    /// Stop condition
    Stop,
    /// Transmit bytes, each followed by an acknowledge check
    Write(&'a [u8]),
    /// Receive this many bytes, ACKing all but the last
    Read(usize),
    /// In-sequence pause, in milliseconds
    Idle(u32),
    /// Sequencer reset
    Reset,
}

impl BusAction<'_> {
    /// Exact number of primitives [`encode`](Self::encode) will emit
    pub fn encoded_len(&self) -> usize {
        match *self {
            BusAction::Start => START.len(),
            BusAction::Stop => STOP.len(),
            BusAction::Write(data) => data.len() * BYTE_LEN,
            BusAction::Read(count) => count * BYTE_LEN,
            BusAction::Idle(ms) => ms as usize,
            BusAction::Reset => 1,
        }
    }

    /// Emit the primitives for this action
    pub fn encode<S: CommandSink + ?Sized>(&self, sink: &mut S) {
        match *self {
            BusAction::Start => START.iter().for_each(|&c| sink.push(c)),
            BusAction::Stop => STOP.iter().for_each(|&c| sink.push(c)),
            BusAction::Write(data) => {
                for &byte in data {
                    encode_write_byte(sink, byte);
                }
            }
            BusAction::Read(count) => encode_read(sink, count),
            BusAction::Idle(ms) => {
                for _ in 0..ms {
                    sink.push(PrimitiveCommand::Idle);
                }
            }
            BusAction::Reset => sink.push(PrimitiveCommand::Reset),
        }
    }
}

/// Emit one written byte, MSB first, followed by the acknowledge check
pub fn encode_write_byte<S: CommandSink + ?Sized>(sink: &mut S, byte: u8) {
    for bit in (0..8).rev() {
        sink.push(PrimitiveCommand::for_bit((byte >> bit) & 1 == 1));
    }
    sink.push(PrimitiveCommand::DataHighAck0);
}

/// Emit a read of `count` bytes
///
/// The master ACKs every byte except the last, which it NACKs to end the
/// read. `count == 0` emits nothing; callers reject empty reads earlier.
pub fn encode_read<S: CommandSink + ?Sized>(sink: &mut S, count: usize) {
    for i in 0..count {
        for _ in 0..8 {
            sink.push(PrimitiveCommand::DataHighRead);
        }
        if i + 1 == count {
            sink.push(PrimitiveCommand::DataHighNoAck);
        } else {
            sink.push(PrimitiveCommand::DataLowNoAck);
        }
    }
}

/// Rebuild a byte from its 8 bit-commands (high → 1, low → 0)
///
/// Returns `None` if any entry is not a data-bit primitive.
pub fn decode_write_bits(bits: &[PrimitiveCommand]) -> Option<u8> {
    if bits.len() != 8 {
        return None;
    }
    bits.iter().try_fold(0u8, |acc, cmd| match cmd {
        PrimitiveCommand::DataHighNoAck => Some(acc << 1 | 1),
        PrimitiveCommand::DataLowNoAck => Some(acc << 1),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::vec::Vec;

    #[derive(Default)]
    struct Recorder(Vec<PrimitiveCommand>);

    impl CommandSink for Recorder {
        fn push(&mut self, command: PrimitiveCommand) {
            self.0.push(command);
        }
    }

    fn encode(action: BusAction<'_>) -> Vec<PrimitiveCommand> {
        let mut rec = Recorder::default();
        action.encode(&mut rec);
        assert_eq!(rec.0.len(), action.encoded_len());
        rec.0
    }

    #[test]
    fn test_nibble_values() {
        assert_eq!(PrimitiveCommand::End.nibble(), 0x0);
        assert_eq!(PrimitiveCommand::Idle.nibble(), 0x7);
        assert_eq!(PrimitiveCommand::DataLowNoAck.nibble(), 0x8);
        assert_eq!(PrimitiveCommand::DataHighNoAck.nibble(), 0xC);
        assert_eq!(PrimitiveCommand::DataHighRead.nibble(), 0xD);
        assert_eq!(PrimitiveCommand::DataHighAck0.nibble(), 0xE);
        assert_eq!(PrimitiveCommand::DataHighAck1.nibble(), 0xF);
    }

    #[test]
    fn test_from_nibble_gaps() {
        for n in 0x09..=0x0B {
            assert_eq!(PrimitiveCommand::from_nibble(n), None);
        }
        for n in (0x00..=0x08).chain(0x0C..=0x0F) {
            let cmd = PrimitiveCommand::from_nibble(n).unwrap();
            assert_eq!(cmd.nibble(), n);
        }
    }

    #[test]
    fn test_start_stop() {
        use PrimitiveCommand::*;
        assert_eq!(
            encode(BusAction::Start),
            [DataHigh, ClockHigh, DataLow, ClockLow]
        );
        assert_eq!(encode(BusAction::Stop), [DataLow, ClockHigh, DataHigh]);
    }

    #[test]
    fn test_write_byte_msb_first() {
        use PrimitiveCommand::*;
        let cmds = encode(BusAction::Write(&[0xC0]));
        assert_eq!(
            cmds,
            [
                DataHighNoAck,
                DataHighNoAck,
                DataLowNoAck,
                DataLowNoAck,
                DataLowNoAck,
                DataLowNoAck,
                DataLowNoAck,
                DataLowNoAck,
                DataHighAck0,
            ]
        );
    }

    #[test]
    fn test_read_ack_then_nack() {
        use PrimitiveCommand::*;
        let cmds = encode(BusAction::Read(2));
        assert_eq!(cmds.len(), 18);
        assert!(cmds[..8].iter().all(|&c| c == DataHighRead));
        assert_eq!(cmds[8], DataLowNoAck);
        assert!(cmds[9..17].iter().all(|&c| c == DataHighRead));
        assert_eq!(cmds[17], DataHighNoAck);
    }

    #[test]
    fn test_single_byte_read_is_nacked() {
        let cmds = encode(BusAction::Read(1));
        assert_eq!(cmds.last(), Some(&PrimitiveCommand::DataHighNoAck));
    }

    #[test]
    fn test_idle_and_reset() {
        assert_eq!(encode(BusAction::Idle(3)), [PrimitiveCommand::Idle; 3]);
        assert_eq!(encode(BusAction::Reset), [PrimitiveCommand::Reset]);
        assert!(encode(BusAction::Read(0)).is_empty());
    }

    proptest! {
        #[test]
        fn prop_write_byte_is_nine_commands(byte in any::<u8>()) {
            let cmds = encode(BusAction::Write(&[byte]));
            prop_assert_eq!(cmds.len(), BYTE_LEN);
            prop_assert_eq!(cmds[8], PrimitiveCommand::DataHighAck0);
            prop_assert_eq!(decode_write_bits(&cmds[..8]), Some(byte));
        }

        #[test]
        fn prop_write_len_matches(data in proptest::collection::vec(any::<u8>(), 0..16)) {
            let cmds = encode(BusAction::Write(&data));
            prop_assert_eq!(cmds.len(), data.len() * BYTE_LEN);
            for (chunk, &byte) in cmds.chunks(BYTE_LEN).zip(data.iter()) {
                prop_assert_eq!(decode_write_bits(&chunk[..8]), Some(byte));
            }
        }
    }
}
