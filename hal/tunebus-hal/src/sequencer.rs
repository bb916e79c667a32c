//! Bus sequencer port
//!
//! The sequencer is a passive block on the card: it replays 4-bit opcodes
//! from its command memory onto the SCL/SDA pins and captures read bits back
//! into the same memory. The host sees two windows:
//!
//! - the memory window, byte addressed, holding command programs and the
//!   readback area
//! - the register window, where a single control word starts or resets the
//!   sequencer and a single status word reports progress
//!
//! Mapping the windows (PCI BARs, `/dev/mem`, a simulator) is the
//! implementor's business; accesses are treated as infallible, the same way
//! MMIO reads and writes are.

/// Access to one sequencer instance
pub trait SequencerPort {
    /// Write one byte into the memory window
    fn write_byte(&mut self, offset: u32, value: u8);

    /// Read one byte from the memory window
    fn read_byte(&mut self, offset: u32) -> u8;

    /// Write the control word (trigger / reset)
    fn write_control(&mut self, value: u32);

    /// Read the status word
    fn read_status(&mut self) -> u32;
}

impl<T: SequencerPort + ?Sized> SequencerPort for &mut T {
    fn write_byte(&mut self, offset: u32, value: u8) {
        (**self).write_byte(offset, value)
    }

    fn read_byte(&mut self, offset: u32) -> u8 {
        (**self).read_byte(offset)
    }

    fn write_control(&mut self, value: u32) {
        (**self).write_control(value)
    }

    fn read_status(&mut self) -> u32 {
        (**self).read_status()
    }
}
