//! In-memory sequencer model
//!
//! [`SimSequencer`] implements [`SequencerPort`] on top of a plain byte
//! array. On trigger it replays the nibble program the same way the card
//! does: it tracks the SCL/SDA levels to spot start and stop conditions,
//! shifts bits into bytes and hands address, write and read phases to a
//! [`SimTarget`] standing in for the slaves on the wire. Read bytes land in
//! the readback window and acknowledge failures set the status bits, so
//! drivers can be exercised end to end on the host.

use core::cell::Cell;

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use tunebus_hal::{Clock, SequencerPort};

use crate::config::BusConfig;
use crate::flush::ctrl;
use crate::opcode::PrimitiveCommand;

/// Size of the modelled memory window
pub const MEMORY_SIZE: usize = 0x2000;

/// Events kept before further ones are dropped
pub const MAX_EVENTS: usize = 2048;

/// Something observed on the simulated wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// Start condition on an idle bus
    Start,
    /// Start condition while the bus was already owned
    RepeatedStart,
    Stop,
    /// Address byte and whether a slave answered
    Address { address: u8, read: bool, acked: bool },
    /// Master-written byte and the slave's acknowledge
    Write { byte: u8, acked: bool },
    /// Slave-driven byte and the master's acknowledge
    Read { byte: u8, acked: bool },
    /// Sequencer reset via the control word
    Reset,
}

/// The slaves behind the simulated bus
pub trait SimTarget {
    /// Address phase; true if some slave acknowledges
    fn select(&mut self, address: u8, read: bool) -> bool;

    /// Byte written by the master; true if acknowledged
    fn write(&mut self, byte: u8) -> bool;

    /// Next byte the selected slave drives
    fn read(&mut self) -> u8;

    /// Stop condition
    fn stop(&mut self) {}
}

impl<T: SimTarget + ?Sized> SimTarget for &mut T {
    fn select(&mut self, address: u8, read: bool) -> bool {
        (**self).select(address, read)
    }

    fn write(&mut self, byte: u8) -> bool {
        (**self).write(byte)
    }

    fn read(&mut self) -> u8 {
        (**self).read()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

/// Auto-incrementing register file at one address
///
/// The first byte of a write sets the register pointer, later bytes are
/// stored at the pointer which then advances. Reads return the register at
/// the pointer and advance it.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    pub address: u8,
    pub registers: [u8; 256],
    pointer: u8,
    selected: bool,
    pointer_pending: bool,
}

impl RegisterFile {
    /// Zeroed registers answering at `address`
    pub fn new(address: u8) -> Self {
        Self {
            address,
            registers: [0; 256],
            pointer: 0,
            selected: false,
            pointer_pending: false,
        }
    }
}

impl SimTarget for RegisterFile {
    fn select(&mut self, address: u8, read: bool) -> bool {
        self.selected = address == self.address;
        self.pointer_pending = self.selected && !read;
        self.selected
    }

    fn write(&mut self, byte: u8) -> bool {
        if !self.selected {
            return false;
        }
        if self.pointer_pending {
            self.pointer = byte;
            self.pointer_pending = false;
        } else {
            self.registers[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
        true
    }

    fn read(&mut self) -> u8 {
        if !self.selected {
            // Nobody drives SDA, the pull-up reads as ones
            return 0xFF;
        }
        let value = self.registers[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        value
    }

    fn stop(&mut self) {
        self.selected = false;
    }
}

/// Byte-level position within the current bus transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Address,
    Writing,
    Reading,
}

/// Simulated sequencer
pub struct SimSequencer<T: SimTarget> {
    memory: [u8; MEMORY_SIZE],
    data_offset: u32,
    target: T,
    events: Vec<BusEvent, MAX_EVENTS>,
    triggers: u32,
    resets: u32,
    memory_writes: u32,
    busy_reads: u32,
    latency: u32,
    hung: bool,
    ack_error: bool,
    clean: bool,
}

impl<T: SimTarget> SimSequencer<T> {
    /// Sequencer with the PT3 memory layout
    pub fn new(target: T) -> Self {
        Self::with_config(target, &BusConfig::PT3)
    }

    /// Sequencer with the readback window of `config`
    pub fn with_config(target: T, config: &BusConfig) -> Self {
        Self {
            memory: [0; MEMORY_SIZE],
            data_offset: config.data_offset,
            target,
            events: Vec::new(),
            triggers: 0,
            resets: 0,
            memory_writes: 0,
            busy_reads: 0,
            latency: 0,
            hung: false,
            ack_error: false,
            clean: true,
        }
    }

    /// Status polls that report running after each trigger
    pub fn set_latency(&mut self, polls: u32) {
        self.latency = polls;
    }

    /// Report running for the next `polls` status reads
    pub fn set_busy(&mut self, polls: u32) {
        self.busy_reads = polls;
    }

    /// Never report completion after the next trigger
    pub fn hang(&mut self) {
        self.hung = true;
    }

    /// Force the clean bit, as after a program that left the bus owned
    pub fn set_clean(&mut self, clean: bool) {
        self.clean = clean;
    }

    /// Slaves on the simulated wire
    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Everything seen on the wire since construction
    pub fn events(&self) -> &[BusEvent] {
        &self.events
    }

    /// Number of recorded events matching `f`
    pub fn count(&self, f: impl Fn(&BusEvent) -> bool) -> usize {
        self.events.iter().filter(|e| f(e)).count()
    }

    /// Programs triggered so far
    pub fn triggers(&self) -> u32 {
        self.triggers
    }

    /// Reset pulses so far
    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// Byte writes into the memory window so far
    pub fn memory_writes(&self) -> u32 {
        self.memory_writes
    }

    fn record(&mut self, event: BusEvent) {
        // Full log: later events are dropped
        let _ = self.events.push(event);
    }

    fn nibble_at(&self, nibble: u32) -> Option<u8> {
        let index = (self.data_offset + nibble / 2) as usize;
        let byte = *self.memory.get(index)?;
        Some(if nibble % 2 == 0 { byte & 0x0F } else { byte >> 4 })
    }

    /// Replay the program starting at nibble `start`
    fn execute(&mut self, start: u32) {
        self.ack_error = false;

        let (mut scl, mut sda) = (true, true);
        let mut owned = false;
        let mut phase = Phase::Idle;
        let mut shift = 0u8;
        let mut bits = 0u8;
        let mut outgoing = 0u8;
        let mut readback = 0u32;
        let mut pc = start;

        while let Some(nibble) = self.nibble_at(pc) {
            pc += 1;
            let Some(command) = PrimitiveCommand::from_nibble(nibble) else {
                break;
            };

            match command {
                PrimitiveCommand::End => break,
                PrimitiveCommand::SetAddress | PrimitiveCommand::Idle => {}
                PrimitiveCommand::Reset => self.record(BusEvent::Reset),
                PrimitiveCommand::ClockLow => scl = false,
                PrimitiveCommand::ClockHigh => scl = true,
                PrimitiveCommand::DataLow => {
                    if scl && sda {
                        self.record(if owned {
                            BusEvent::RepeatedStart
                        } else {
                            BusEvent::Start
                        });
                        owned = true;
                        phase = Phase::Address;
                        shift = 0;
                        bits = 0;
                    }
                    sda = false;
                }
                PrimitiveCommand::DataHigh => {
                    if scl && !sda {
                        self.record(BusEvent::Stop);
                        self.target.stop();
                        owned = false;
                        phase = Phase::Idle;
                    }
                    sda = true;
                }
                PrimitiveCommand::DataLowNoAck | PrimitiveCommand::DataHighNoAck => {
                    let bit = command == PrimitiveCommand::DataHighNoAck;
                    scl = false;
                    sda = bit;
                    match phase {
                        Phase::Address | Phase::Writing => {
                            shift = shift << 1 | bit as u8;
                            bits += 1;
                        }
                        Phase::Reading if bits == 8 => {
                            self.record(BusEvent::Read {
                                byte: shift,
                                acked: !bit,
                            });
                            shift = 0;
                            bits = 0;
                        }
                        _ => {}
                    }
                }
                PrimitiveCommand::DataHighRead => {
                    scl = false;
                    sda = true;
                    if phase == Phase::Reading && bits < 8 {
                        if bits == 0 {
                            outgoing = self.target.read();
                        }
                        shift = shift << 1 | (outgoing >> (7 - bits)) & 1;
                        bits += 1;
                        if bits == 8 {
                            let index = (self.data_offset + readback) as usize;
                            if let Some(slot) = self.memory.get_mut(index) {
                                *slot = shift;
                            }
                            readback += 1;
                        }
                    }
                }
                PrimitiveCommand::DataHighAck0 | PrimitiveCommand::DataHighAck1 => {
                    scl = false;
                    sda = true;
                    let expect_ack = command == PrimitiveCommand::DataHighAck0;
                    let acked = match phase {
                        Phase::Address => {
                            let address = shift >> 1;
                            let read = shift & 1 == 1;
                            let acked = self.target.select(address, read);
                            self.record(BusEvent::Address {
                                address,
                                read,
                                acked,
                            });
                            phase = if read { Phase::Reading } else { Phase::Writing };
                            acked
                        }
                        Phase::Writing => {
                            let acked = self.target.write(shift);
                            self.record(BusEvent::Write {
                                byte: shift,
                                acked,
                            });
                            acked
                        }
                        _ => expect_ack,
                    };
                    if acked != expect_ack {
                        self.ack_error = true;
                    }
                    shift = 0;
                    bits = 0;
                }
            }
        }

        self.clean = !owned;
    }
}

impl<T: SimTarget> SequencerPort for SimSequencer<T> {
    fn write_byte(&mut self, offset: u32, value: u8) {
        self.memory_writes += 1;
        if let Some(slot) = self.memory.get_mut(offset as usize) {
            *slot = value;
        }
    }

    fn read_byte(&mut self, offset: u32) -> u8 {
        self.memory.get(offset as usize).copied().unwrap_or(0)
    }

    fn write_control(&mut self, value: u32) {
        if value & ctrl::RESET != 0 {
            self.resets += 1;
            self.ack_error = false;
            self.record(BusEvent::Reset);
        }
        if value & ctrl::TRIGGER != 0 {
            self.triggers += 1;
            self.execute(value & ctrl::START_MASK);
            self.busy_reads = if self.hung { u32::MAX } else { self.latency };
        }
    }

    fn read_status(&mut self) -> u32 {
        let mut status = 0;
        if self.busy_reads > 0 {
            if !self.hung {
                self.busy_reads -= 1;
            }
            status |= 1;
        }
        if self.ack_error {
            status |= 0b0010;
        }
        if self.clean {
            status |= 0b1000;
        }
        status
    }
}

/// Delay that only accumulates the requested time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimDelay {
    pub elapsed_ns: u64,
}

impl SimDelay {
    /// Whole milliseconds slept so far
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}

impl Clock for SimDelay {
    fn now_ms(&self) -> u64 {
        self.elapsed_ms()
    }
}

/// Delay and clock over a shared nanosecond counter
///
/// Copies handed to the bus driver and to a chip driver advance the same
/// time, so deadlines see the sleeps of both.
#[derive(Debug, Clone, Copy)]
pub struct SimClock<'a> {
    elapsed_ns: &'a Cell<u64>,
}

impl<'a> SimClock<'a> {
    /// Clock over `elapsed_ns`
    pub fn new(elapsed_ns: &'a Cell<u64>) -> Self {
        Self { elapsed_ns }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns.get() / 1_000_000
    }
}

impl DelayNs for SimClock<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns.set(self.elapsed_ns.get() + u64::from(ns));
    }
}

impl Clock for SimClock<'_> {
    fn now_ms(&self) -> u64 {
        self.elapsed_ms()
    }
}
