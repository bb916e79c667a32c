//! Sequence buffer writer
//!
//! Packs primitives two per byte into the sequencer's command memory, low
//! nibble first. A writer is created for one transaction and dropped at its
//! end, so a transaction that fails half way cannot leave a stale half-byte
//! latch or cursor behind for the next one.

use tunebus_hal::SequencerPort;

use crate::opcode::{CommandSink, PrimitiveCommand};

/// Cursor over the command region for one transaction
pub struct SequenceWriter<'p, P: SequencerPort + ?Sized> {
    port: &'p mut P,
    /// Byte offset of the command region in the memory window
    base: u32,
    /// Region size in bytes
    capacity: u32,
    /// Bytes committed so far
    cursor: u32,
    /// Low nibble waiting for its partner
    latch: Option<u8>,
}

impl<'p, P: SequencerPort + ?Sized> SequenceWriter<'p, P> {
    /// Start a program at the beginning of the command region
    pub fn new(port: &'p mut P, base: u32, capacity: u32) -> Self {
        Self {
            port,
            base,
            capacity,
            cursor: 0,
            latch: None,
        }
    }

    /// Append one primitive
    ///
    /// The first primitive of a pair is held in the latch; the second
    /// commits the byte and advances the cursor.
    pub fn write(&mut self, command: PrimitiveCommand) {
        match self.latch.take() {
            None => self.latch = Some(command.nibble()),
            Some(low) => {
                let byte = low | (command.nibble() << 4);
                debug_assert!(self.cursor < self.capacity, "command region overflow");
                if self.cursor < self.capacity {
                    self.port.write_byte(self.base + self.cursor, byte);
                }
                self.cursor += 1;
            }
        }
    }

    /// Terminate the program
    ///
    /// Appends `End`, and a second `End` when that leaves a half-filled
    /// byte, so the sequencer never runs into stale memory.
    pub fn finish(&mut self) {
        self.write(PrimitiveCommand::End);
        if self.latch.is_some() {
            self.write(PrimitiveCommand::End);
        }
    }

    /// True if a low nibble is waiting in the latch
    pub fn is_half_filled(&self) -> bool {
        self.latch.is_some()
    }

    /// Bytes committed to the command region
    pub fn bytes_written(&self) -> u32 {
        self.cursor
    }

    /// Access the port once encoding is done (trigger, status, readback)
    pub fn port(&mut self) -> &mut P {
        self.port
    }
}

impl<P: SequencerPort + ?Sized> CommandSink for SequenceWriter<'_, P> {
    fn push(&mut self, command: PrimitiveCommand) {
        self.write(command);
    }
}

/// Bytes needed to hold `nibbles` primitives plus the `End` terminator(s)
pub const fn program_bytes(nibbles: usize) -> usize {
    // One End, padded by a second when the total is odd
    (nibbles + 2) / 2
}
