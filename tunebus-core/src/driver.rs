//! Transaction driver
//!
//! Turns a list of I2C messages into one sequencer program, runs it and
//! copies read data back. The sequencer and its delay live behind a
//! blocking mutex held for exactly one encode/flush/readback cycle, so the
//! driver can be shared by reference between tasks or threads.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorType, I2c, Operation};
use tunebus_hal::i2c::Payload;
use tunebus_hal::{Direction, I2cBus, Message, SequencerPort};

use crate::config::BusConfig;
use crate::error::BusError;
use crate::flush::{self, FlushController};
use crate::opcode::{BusAction, BYTE_LEN};
use crate::sequence::{program_bytes, SequenceWriter};

/// Most messages a single transaction may carry
pub const MAX_MESSAGES: usize = 3;

struct Hardware<P, D> {
    port: P,
    delay: D,
}

/// Exclusive owner of one sequencer
pub struct TransactionDriver<M: RawMutex, P: SequencerPort, D: DelayNs> {
    hw: Mutex<M, RefCell<Hardware<P, D>>>,
    config: BusConfig,
}

impl<M: RawMutex, P: SequencerPort, D: DelayNs> TransactionDriver<M, P, D> {
    /// Take ownership of a sequencer and its delay
    ///
    /// # Arguments
    /// * `port` - Sequencer memory and register windows
    /// * `delay` - Sleeps used while the sequencer is running
    /// * `config` - Memory layout and busy-wait bounds
    pub fn new(port: P, delay: D, config: BusConfig) -> Self {
        Self {
            hw: Mutex::new(RefCell::new(Hardware { port, delay })),
            config,
        }
    }

    /// Layout and wait bounds this driver was built with
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Primitive count of the program for `messages`, without terminator
    fn program_nibbles(messages: &[Message<'_>]) -> usize {
        let per_message: usize = messages
            .iter()
            .map(|m| BusAction::Start.encoded_len() + BYTE_LEN + m.len() * BYTE_LEN)
            .sum();
        per_message + BusAction::Stop.encoded_len()
    }

    /// Reject anything the sequencer cannot express
    fn validate(&self, messages: &[Message<'_>]) -> Result<(), BusError> {
        let Some(first) = messages.first() else {
            debug!("xfer: empty transaction");
            return Err(BusError::UnsupportedTransaction);
        };

        if messages.len() > MAX_MESSAGES {
            debug!("xfer: {=usize} messages", messages.len());
            return Err(BusError::UnsupportedTransaction);
        }

        if let Some(m) = messages.iter().find(|m| !m.has_valid_address()) {
            debug!("xfer: address {=u8:#x} is not 7-bit", m.address);
            return Err(BusError::UnsupportedTransaction);
        }

        if first.direction() != Direction::Write {
            debug!("xfer: first message is a read");
            return Err(BusError::UnsupportedTransaction);
        }

        if messages
            .iter()
            .any(|m| m.direction() == Direction::Read && m.is_empty())
        {
            debug!("xfer: zero-length read");
            return Err(BusError::UnsupportedTransaction);
        }

        let bytes = program_bytes(Self::program_nibbles(messages));
        if bytes > self.config.capacity as usize {
            debug!(
                "xfer: program of {=usize} bytes exceeds {=u32}",
                bytes,
                self.config.capacity
            );
            return Err(BusError::UnsupportedTransaction);
        }

        Ok(())
    }

    /// Run `messages` as one transaction
    ///
    /// Each message gets a (repeated) start and its address byte; a single
    /// stop closes the transaction even if a slave NACKs. Read buffers are
    /// filled only on success, in message order.
    pub fn execute(&self, messages: &mut [Message<'_>]) -> Result<(), BusError> {
        self.validate(messages)?;

        self.hw.lock(|hw| {
            let mut hw = hw.borrow_mut();
            let Hardware { port, delay } = &mut *hw;

            let mut writer =
                SequenceWriter::new(&mut *port, self.config.data_offset, self.config.capacity);
            for message in messages.iter() {
                BusAction::Start.encode(&mut writer);
                BusAction::Write(&[message.address_byte()]).encode(&mut writer);
                match &message.payload {
                    Payload::Write(data) => BusAction::Write(*data).encode(&mut writer),
                    Payload::Read(buf) => BusAction::Read(buf.len()).encode(&mut writer),
                }
            }
            BusAction::Stop.encode(&mut writer);

            flush::flush(writer, delay, &self.config).inspect_err(|e| {
                if *e == BusError::AckFailure {
                    warn!("xfer: NACK from {=u8:#x}", messages[0].address);
                }
            })?;

            let mut offset = self.config.data_offset;
            for message in messages.iter_mut() {
                if let Payload::Read(buf) = &mut message.payload {
                    for byte in buf.iter_mut() {
                        *byte = port.read_byte(offset);
                        offset += 1;
                    }
                }
            }

            Ok(())
        })
    }

    /// Trigger a program already resident in command memory
    pub fn run_resident(&self, start: u32) -> Result<(), BusError> {
        self.hw.lock(|hw| {
            let mut hw = hw.borrow_mut();
            let Hardware { port, delay } = &mut *hw;
            FlushController::new(port, delay, &self.config).run(start)
        })
    }

    /// True if the last program left the bus idle
    pub fn is_clean(&self) -> bool {
        self.hw.lock(|hw| {
            let mut hw = hw.borrow_mut();
            let Hardware { port, delay } = &mut *hw;
            FlushController::new(port, delay, &self.config)
                .status()
                .is_clean()
        })
    }

    /// Reset the sequencer
    pub fn reset(&self) {
        self.hw.lock(|hw| {
            let mut hw = hw.borrow_mut();
            let Hardware { port, delay } = &mut *hw;
            FlushController::new(port, delay, &self.config).reset();
        })
    }

    /// Bring the bus to idle after power-up
    ///
    /// A bus left mid-transfer is released by running the program at the
    /// start of command memory.
    pub fn init(&self) -> Result<(), BusError> {
        if self.is_clean() {
            return Ok(());
        }
        info!("xfer: bus not clean, releasing");
        self.run_resident(0)
    }

    /// Lock the hardware and hand the port to `f`
    pub fn with_port<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        self.hw.lock(|hw| f(&mut hw.borrow_mut().port))
    }
}

impl<M: RawMutex, P: SequencerPort, D: DelayNs> I2cBus for TransactionDriver<M, P, D> {
    type Error = BusError;

    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<(), Self::Error> {
        self.execute(messages)
    }
}

impl<M: RawMutex, P: SequencerPort, D: DelayNs> I2cBus for &TransactionDriver<M, P, D> {
    type Error = BusError;

    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<(), Self::Error> {
        self.execute(messages)
    }
}

impl<M: RawMutex, P: SequencerPort, D: DelayNs> ErrorType for TransactionDriver<M, P, D> {
    type Error = BusError;
}

/// Single-address transactions for `embedded-hal` device crates
///
/// The sequencer always issues a repeated start between messages, so two
/// adjacent operations of the same kind cannot be merged and are rejected.
impl<M: RawMutex, P: SequencerPort, D: DelayNs> I2c for TransactionDriver<M, P, D> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut messages: heapless::Vec<Message<'_>, MAX_MESSAGES> = heapless::Vec::new();
        let mut last = None;

        for operation in operations.iter_mut() {
            let message = match operation {
                Operation::Write(data) => Message::write(address, *data),
                Operation::Read(buf) => Message::read(address, &mut **buf),
            };
            if last == Some(message.direction()) {
                debug!("xfer: adjacent operations of one kind");
                return Err(BusError::UnsupportedTransaction);
            }
            last = Some(message.direction());
            messages
                .push(message)
                .map_err(|_| BusError::UnsupportedTransaction)?;
        }

        self.execute(&mut messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flush::ctrl;
    use crate::sim::{BusEvent, RegisterFile, SimDelay, SimSequencer};
    use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
    use proptest::prelude::*;
    use std::vec::Vec;

    type Driver<M = NoopRawMutex> = TransactionDriver<M, SimSequencer<RegisterFile>, SimDelay>;

    fn driver(address: u8) -> Driver {
        driver_with(address, BusConfig::PT3)
    }

    fn driver_with(address: u8, config: BusConfig) -> Driver {
        TransactionDriver::new(
            SimSequencer::with_config(RegisterFile::new(address), &config),
            SimDelay::default(),
            config,
        )
    }

    fn events(driver: &Driver) -> Vec<BusEvent> {
        driver.with_port(|sim| sim.events().to_vec())
    }

    #[test]
    fn test_single_register_write() {
        let driver = driver(0x60);
        let result = driver.execute(&mut [Message::write(0x60, &[0x1C, 0x01])]);
        assert_eq!(result, Ok(()));
        assert_eq!(
            events(&driver),
            [
                BusEvent::Start,
                BusEvent::Address {
                    address: 0x60,
                    read: false,
                    acked: true
                },
                BusEvent::Write {
                    byte: 0x1C,
                    acked: true
                },
                BusEvent::Write {
                    byte: 0x01,
                    acked: true
                },
                BusEvent::Stop,
            ]
        );

        // Program begins with the start condition and the 0xC0 address byte
        let data = BusConfig::PT3.data_offset;
        let head: Vec<u8> = driver.with_port(|sim| (0..4).map(|i| sim.read_byte(data + i)).collect());
        assert_eq!(head, [0x35, 0x24, 0xCC, 0x88]);
        assert_eq!(driver.with_port(|sim| sim.target().registers[0x1C]), 0x01);
    }

    #[test]
    fn test_write_read() {
        let mut driver = driver(0x10);
        driver.with_port(|sim| sim.target_mut().registers[0x80] = 0x42);
        let mut buf = [0u8; 1];
        I2cBus::write_read(&mut driver, 0x10, &[0x80], &mut buf).unwrap();
        assert_eq!(buf, [0x42]);
    }

    #[test]
    fn test_readback_is_cumulative() {
        let driver = driver(0x10);
        driver.with_port(|sim| {
            sim.target_mut().registers[0x00..4].copy_from_slice(&[1, 2, 3, 4]);
        });
        let mut first = [0u8; 2];
        let mut second = [0u8; 2];
        driver
            .execute(&mut [
                Message::write(0x10, &[0x00]),
                Message::read(0x10, &mut first),
                Message::read(0x10, &mut second),
            ])
            .unwrap();
        assert_eq!(first, [1, 2]);
        assert_eq!(second, [3, 4]);
    }

    #[test]
    fn test_read_first_is_rejected() {
        let driver = driver(0x10);
        let mut buf = [0u8; 1];
        let result = driver.execute(&mut [Message::read(0x10, &mut buf)]);
        assert_eq!(result, Err(BusError::UnsupportedTransaction));
        assert_eq!(driver.with_port(|sim| sim.memory_writes()), 0);
        assert_eq!(driver.with_port(|sim| sim.triggers()), 0);
    }

    #[test]
    fn test_shape_rejections() {
        let driver = driver(0x10);
        let mut empty = [0u8; 0];
        assert_eq!(
            driver.execute(&mut [Message::write(0x10, &[0]), Message::read(0x10, &mut empty)]),
            Err(BusError::UnsupportedTransaction)
        );
        assert_eq!(driver.execute(&mut []), Err(BusError::UnsupportedTransaction));
        assert_eq!(
            driver.execute(&mut [
                Message::write(0x10, &[0]),
                Message::write(0x10, &[1]),
                Message::write(0x10, &[2]),
                Message::write(0x10, &[3]),
            ]),
            Err(BusError::UnsupportedTransaction)
        );
        assert_eq!(driver.with_port(|sim| sim.memory_writes()), 0);
    }

    #[test]
    fn test_wide_address_is_rejected() {
        let driver = driver(0x10);
        // 0x90 << 1 would reach 0x10
        assert_eq!(
            driver.execute(&mut [Message::write(0x90, &[0x1C, 0x01])]),
            Err(BusError::UnsupportedTransaction)
        );
        let mut buf = [0u8; 1];
        assert_eq!(
            driver.execute(&mut [Message::write(0x10, &[0x1C]), Message::read(0xFF, &mut buf)]),
            Err(BusError::UnsupportedTransaction)
        );
        assert_eq!(driver.with_port(|sim| sim.memory_writes()), 0);
        assert_eq!(driver.with_port(|sim| sim.target().registers[0x1C]), 0);
    }

    #[test]
    fn test_oversized_program_is_rejected() {
        let config = BusConfig {
            capacity: 32,
            ..BusConfig::PT3
        };
        let driver = driver_with(0x10, config);
        // 4 + 9 + 3 * 9 + 3 = 43 nibbles -> 22 bytes
        assert_eq!(driver.execute(&mut [Message::write(0x10, &[0; 3])]), Ok(()));
        // 4 + 9 + 6 * 9 + 3 = 70 nibbles -> 36 bytes
        assert_eq!(
            driver.execute(&mut [Message::write(0x10, &[0; 6])]),
            Err(BusError::UnsupportedTransaction)
        );
    }

    #[test]
    fn test_nack_still_stops() {
        let driver = driver(0x10);
        let mut buf = [0xEE; 1];
        let result = driver.execute(&mut [
            Message::write(0x11, &[0x00]),
            Message::read(0x11, &mut buf),
        ]);
        assert_eq!(result, Err(BusError::AckFailure));
        assert_eq!(buf, [0xEE]);
        assert_eq!(events(&driver).last(), Some(&BusEvent::Stop));
        assert!(driver.is_clean());
    }

    #[test]
    fn test_busy_sequencer_times_out() {
        let config = BusConfig {
            busy_poll_limit: 10,
            ..BusConfig::PT3
        };
        let driver = driver_with(0x10, config);
        driver.with_port(|sim| sim.set_busy(100));
        assert_eq!(
            driver.execute(&mut [Message::write(0x10, &[0])]),
            Err(BusError::Timeout)
        );
        assert_eq!(driver.with_port(|sim| sim.triggers()), 0);
    }

    #[test]
    fn test_hung_program_is_malfunction() {
        let config = BusConfig {
            busy_poll_limit: 10,
            ..BusConfig::PT3
        };
        let driver = driver_with(0x10, config);
        driver.with_port(|sim| sim.hang());
        assert_eq!(
            driver.execute(&mut [Message::write(0x10, &[0])]),
            Err(BusError::DriverMalfunction)
        );
    }

    #[test]
    fn test_latency_is_waited_out() {
        let driver = driver(0x10);
        driver.with_port(|sim| sim.set_latency(5));
        assert_eq!(driver.execute(&mut [Message::write(0x10, &[0])]), Ok(()));
        assert_eq!(driver.hw.lock(|hw| hw.borrow().delay.elapsed_ms()), 5);
    }

    #[test]
    fn test_init_releases_dirty_bus() {
        let driver = driver(0x10);
        assert_eq!(driver.init(), Ok(()));
        assert_eq!(driver.with_port(|sim| sim.triggers()), 0);

        driver.with_port(|sim| sim.set_clean(false));
        assert!(!driver.is_clean());
        assert_eq!(driver.init(), Ok(()));
        assert_eq!(driver.with_port(|sim| sim.triggers()), 1);
        assert!(driver.is_clean());
    }

    #[test]
    fn test_resident_and_reset() {
        let driver = driver(0x10);
        assert_eq!(driver.run_resident(driver.config().resident_start), Ok(()));
        assert_eq!(
            driver.run_resident(crate::config::MAX_START_OFFSET),
            Err(BusError::UnsupportedTransaction)
        );
        driver.reset();
        assert_eq!(driver.with_port(|sim| sim.resets()), 1);
        assert_eq!(ctrl::RESET, 1 << 17);
    }

    #[test]
    fn test_embedded_hal_transaction() {
        let mut driver = driver(0x10);
        driver.with_port(|sim| sim.target_mut().registers[0x05] = 0x99);
        let mut buf = [0u8; 1];
        I2c::write_read(&mut driver, 0x10, &[0x05], &mut buf).unwrap();
        assert_eq!(buf, [0x99]);

        assert_eq!(
            I2c::transaction(
                &mut driver,
                0x10,
                &mut [Operation::Write(&[0x05]), Operation::Write(&[0x06])]
            ),
            Err(BusError::UnsupportedTransaction)
        );
    }

    #[test]
    fn test_shared_between_threads() {
        let driver: Driver<CriticalSectionRawMutex> = TransactionDriver::new(
            SimSequencer::new(RegisterFile::new(0x10)),
            SimDelay::default(),
            BusConfig::PT3,
        );

        std::thread::scope(|s| {
            for reg in [0x20u8, 0x40] {
                let driver = &driver;
                s.spawn(move || {
                    let mut bus = driver;
                    for value in 0..50u8 {
                        bus.write(0x10, &[reg, value]).unwrap();
                        let mut buf = [0u8; 1];
                        bus.write_read(0x10, &[reg], &mut buf).unwrap();
                        assert_eq!(buf[0], value);
                    }
                });
            }
        });

        assert_eq!(driver.with_port(|sim| sim.triggers()), 200);
    }

    fn message_shape() -> impl Strategy<Value = Vec<(bool, usize)>> {
        proptest::collection::vec((any::<bool>(), 1usize..5), 0..3).prop_map(|rest| {
            let mut shape = vec![(false, 1)];
            shape.extend(rest);
            shape
        })
    }

    proptest! {
        #[test]
        fn prop_one_start_one_stop(shape in message_shape()) {
            let driver = driver(0x10);
            let writes: Vec<Vec<u8>> = shape.iter().map(|&(_, n)| vec![0u8; n]).collect();
            let mut reads: Vec<Vec<u8>> = shape.iter().map(|&(_, n)| vec![0u8; n]).collect();

            let mut messages: Vec<Message<'_>> = shape
                .iter()
                .zip(writes.iter())
                .zip(reads.iter_mut())
                .map(|((&(read, _), w), r)| {
                    if read {
                        Message::read(0x10, r)
                    } else {
                        Message::write(0x10, w)
                    }
                })
                .collect();

            prop_assert_eq!(driver.execute(&mut messages), Ok(()));
            let events = events(&driver);
            let count = |e: BusEvent| events.iter().filter(|&&x| x == e).count();
            prop_assert_eq!(count(BusEvent::Start), 1);
            prop_assert_eq!(count(BusEvent::Stop), 1);
            prop_assert_eq!(count(BusEvent::RepeatedStart), shape.len() - 1);
            prop_assert_eq!(events.first(), Some(&BusEvent::Start));
            prop_assert_eq!(events.last(), Some(&BusEvent::Stop));
        }
    }
}
