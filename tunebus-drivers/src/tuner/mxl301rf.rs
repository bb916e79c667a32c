//! MxL301RF terrestrial tuner
//!
//! The tuner is only reachable through the TC90522 passthrough. A tune
//! freezes the AGC, writes the synthesizer program in two halves with a
//! short settle between them, applies the IDAC block and then polls the
//! lock register until a wall-clock deadline. Each poll costs bus time as
//! well as the poll interval, so the deadline is taken from a [`Clock`]
//! rather than from counting sleeps. Once both synthesizers report lock the
//! AGC is handed back to the demodulator.
//!
//! Every register access is its own bus transaction, so other users of the
//! bus can interleave between steps of a tune.

use embedded_hal::delay::DelayNs;
use tunebus_core::config::TunerConfig;
use tunebus_hal::{Clock, I2cBus};

use super::channels;
use super::state::{TuneEvent, TuneState};
use super::synth::{self, reg};
use super::TuneError;
use crate::demod::{AgcMode, DemodError, Tc90522};

/// Error type of tuner operations on bus `B`
pub type Error<B> = TuneError<DemodError<<B as I2cBus>::Error>>;

/// Tuner power-down writes (sleep bit, abort tune)
const SLEEP_PROGRAM: [u8; 4] = [0x01, 0x00, reg::TUNE, 0x00];

/// Tuner power-up write
const WAKE_PROGRAM: [u8; 2] = [0x01, 0x01];

/// MxL301RF behind a TC90522
pub struct Mxl301rf<B: I2cBus, D: DelayNs + Clock> {
    demod: Tc90522<B>,
    delay: D,
    config: TunerConfig,
    state: TuneState,
    /// Last programmed RF frequency in Hz
    frequency: Option<u32>,
}

impl<B: I2cBus, D: DelayNs + Clock> Mxl301rf<B, D> {
    /// Tuner on `bus`, idle until the first tune
    ///
    /// # Arguments
    /// * `bus` - Bus the demodulator sits on
    /// * `delay` - Sleeps and the monotonic clock for the lock deadline
    /// * `config` - Chip addresses and lock timing
    pub fn new(bus: B, delay: D, config: TunerConfig) -> Self {
        Self {
            demod: Tc90522::new(bus, config.demod_address, config.tuner_address),
            delay,
            config,
            state: TuneState::Idle,
            frequency: None,
        }
    }

    /// Current tune state
    pub fn state(&self) -> TuneState {
        self.state
    }

    /// RF frequency of the last tune, in Hz
    pub fn frequency(&self) -> Option<u32> {
        self.frequency
    }

    /// Addresses and timing this tuner was built with
    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Direct access to the demodulator
    pub fn demod(&mut self) -> &mut Tc90522<B> {
        &mut self.demod
    }

    /// Release the bus and delay
    pub fn release(self) -> (B, D) {
        (self.demod.release(), self.delay)
    }

    fn apply(&mut self, event: TuneEvent) {
        self.state = self.state.transition(event);
    }

    /// Terrestrial power-up of the demodulator side
    pub fn init(&mut self) -> Result<(), Error<B>> {
        self.demod.init_terrestrial()?;
        Ok(())
    }

    /// Tune to `target`, a frequency in Hz or a channel code
    ///
    /// See [`channels::resolve`] for the accepted codes. On success the
    /// tuner is locked and the AGC is back in automatic mode. Frequencies
    /// above [`synth::MAX_FREQUENCY_HZ`] fail with
    /// [`TuneError::OutOfRange`] before anything is sent.
    pub fn tune(&mut self, target: u32) -> Result<(), Error<B>> {
        let hz = channels::resolve(target);
        let Some(program) = synth::program(hz) else {
            warn!("tune: {=u32} Hz out of range", hz);
            return Err(TuneError::OutOfRange);
        };
        info!("tune: {=u32} -> {=u32} Hz", target, hz);

        self.apply(TuneEvent::Begin);
        let result = self
            .program(hz, &program)
            .and_then(|()| self.wait_lock());
        if let Err(TuneError::Bus(_)) = result {
            error!("tune: bus error, aborted");
            self.apply(TuneEvent::BusFault);
        }
        result
    }

    /// Write the synthesizer program for `hz`
    fn program(&mut self, hz: u32, program: &[u8]) -> Result<(), Error<B>> {
        self.demod.set_agc(AgcMode::Manual)?;
        self.frequency = Some(hz);

        let (first, second) = program.split_at(synth::FIRST_HALF_PAIRS * 2);
        self.demod.tuner_write(first)?;
        self.delay.delay_ms(self.config.settle_ms);
        self.demod.tuner_write(second)?;
        self.delay.delay_ms(self.config.settle_ms);

        self.demod.tuner_write(&[0x1A, 0x0D])?;
        self.demod.tuner_write(&synth::IDAC_SETTING)?;

        self.apply(TuneEvent::Programmed);
        Ok(())
    }

    /// Poll for lock until the budget has elapsed on the clock
    ///
    /// The lock register is always read at least once.
    fn wait_lock(&mut self) -> Result<(), Error<B>> {
        let deadline = self.delay.now_ms() + u64::from(self.config.lock_budget_ms);
        let mut polls = 0u32;

        loop {
            let status = self.demod.tuner_read(reg::LOCK)?;
            polls += 1;
            if synth::is_locked(status) {
                self.demod.set_agc(AgcMode::Auto)?;
                self.apply(TuneEvent::LockDetected);
                debug!("tune: locked, status {=u8:#x}", status);
                return Ok(());
            }
            self.apply(TuneEvent::NotLocked);
            self.delay.delay_ms(self.config.lock_poll_interval_ms);
            if self.delay.now_ms() >= deadline {
                break;
            }
        }

        warn!("tune: no lock after {=u32} polls", polls);
        self.apply(TuneEvent::BudgetExhausted);
        Err(TuneError::Timeout)
    }

    /// Read the lock register once
    pub fn is_locked(&mut self) -> Result<bool, Error<B>> {
        Ok(synth::is_locked(self.demod.tuner_read(reg::LOCK)?))
    }

    /// Power the tuner down
    pub fn sleep(&mut self) -> Result<(), Error<B>> {
        info!("tune: sleep");
        self.demod.set_agc(AgcMode::Manual)?;
        self.demod.tuner_write(&SLEEP_PROGRAM)?;
        self.demod.set_tuner_sleep(true)?;
        self.apply(TuneEvent::Sleep);
        Ok(())
    }

    /// Power the tuner up and retune to the last frequency, if any
    pub fn wakeup(&mut self) -> Result<(), Error<B>> {
        info!("tune: wakeup");
        self.demod.set_tuner_sleep(false)?;
        self.demod.tuner_write(&WAKE_PROGRAM)?;
        match self.frequency {
            Some(hz) => self.tune(hz),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::vec::Vec;
    use tunebus_hal::i2c::Payload;
    use tunebus_hal::Message;

    /// Demodulator-level fake: logs writes, answers reads from a script
    #[derive(Default)]
    struct FakeBus {
        writes: Vec<Vec<u8>>,
        reads: usize,
        lock_script: VecDeque<u8>,
        fail_after: Option<usize>,
    }

    impl I2cBus for FakeBus {
        type Error = ();

        fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<(), ()> {
            if let Some(n) = self.fail_after {
                if self.writes.len() >= n {
                    return Err(());
                }
            }
            for m in messages.iter_mut() {
                match &mut m.payload {
                    Payload::Write(data) => self.writes.push(data.to_vec()),
                    Payload::Read(buf) => {
                        self.reads += 1;
                        buf[0] = self.lock_script.pop_front().unwrap_or(0x00);
                    }
                }
            }
            Ok(())
        }
    }

    /// Millisecond clock advanced only by sleeps
    #[derive(Default)]
    struct Ticks(u32);

    impl DelayNs for Ticks {
        fn delay_ns(&mut self, _ns: u32) {}

        fn delay_ms(&mut self, ms: u32) {
            self.0 += ms;
        }
    }

    impl Clock for Ticks {
        fn now_ms(&self) -> u64 {
            u64::from(self.0)
        }
    }

    fn tuner(script: &[u8]) -> Mxl301rf<FakeBus, Ticks> {
        let bus = FakeBus {
            lock_script: script.iter().copied().collect(),
            ..FakeBus::default()
        };
        Mxl301rf::new(bus, Ticks::default(), TunerConfig::default())
    }

    #[test]
    fn test_tune_sequence() {
        let mut tuner = tuner(&[0x0F]);
        assert_eq!(tuner.tune(557_142_857), Ok(()));
        assert_eq!(tuner.state(), TuneState::Locked);

        let (bus, clock) = tuner.release();
        let program = synth::program(557_142_857).unwrap();
        let mut first = std::vec![0xFE, 0xC4];
        first.extend_from_slice(&program[..14]);
        let mut second = std::vec![0xFE, 0xC4];
        second.extend_from_slice(&program[14..]);
        let mut idac = std::vec![0xFE, 0xC4];
        idac.extend_from_slice(&synth::IDAC_SETTING);

        let expected: Vec<Vec<u8>> = std::vec![
            std::vec![0x25, 0x00],
            std::vec![0x23, 0x4D],
            std::vec![0x01, 0x40],
            first,
            second,
            std::vec![0xFE, 0xC4, 0x1A, 0x0D],
            idac,
            std::vec![0xFE, 0xC4, 0xFB, 0x16],
            std::vec![0xFE, 0xC5],
            std::vec![0x25, 0x40],
            std::vec![0x23, 0x4C],
            std::vec![0x01, 0x40],
        ];
        assert_eq!(bus.writes, expected);
        assert_eq!(bus.reads, 1);
        assert_eq!(clock.0, 2);
    }

    #[test]
    fn test_lock_needs_both_synthesizers() {
        let mut tuner = tuner(&[0x0C, 0x03, 0x0F]);
        assert_eq!(tuner.tune(557_142_857), Ok(()));
        let (bus, clock) = tuner.release();
        assert_eq!(bus.reads, 3);
        // Two settle pauses plus two poll intervals
        assert_eq!(clock.0, 4);
    }

    #[test]
    fn test_never_locks() {
        let mut tuner = tuner(&[]);
        assert_eq!(tuner.tune(557_142_857), Err(TuneError::Timeout));
        assert_eq!(tuner.state(), TuneState::TimedOut);

        let (bus, clock) = tuner.release();
        assert_eq!(bus.reads, 100);
        assert_eq!(clock.0, 2 + 100);
        // AGC stays manual
        assert!(!bus.writes.contains(&std::vec![0x25, 0x40]));
    }

    #[test]
    fn test_bus_error_aborts() {
        let bus = FakeBus {
            fail_after: Some(4),
            ..FakeBus::default()
        };
        let mut tuner = Mxl301rf::new(bus, Ticks::default(), TunerConfig::default());
        assert_eq!(
            tuner.tune(557_142_857),
            Err(TuneError::Bus(DemodError::Bus(())))
        );
        assert_eq!(tuner.state(), TuneState::Failed);
        let (bus, _) = tuner.release();
        // AGC (3 writes) and the first program half, then nothing
        assert_eq!(bus.writes.len(), 4);
    }

    #[test]
    fn test_channel_code() {
        let mut tuner = tuner(&[0x0F]);
        assert_eq!(tuner.tune(27), Ok(()));
        assert_eq!(tuner.frequency(), Some(channels::NHK));
    }

    #[test]
    fn test_custom_lock_budget() {
        let config = TunerConfig {
            lock_budget_ms: 20,
            lock_poll_interval_ms: 2,
            ..TunerConfig::default()
        };
        let mut tuner = Mxl301rf::new(FakeBus::default(), Ticks::default(), config);
        assert_eq!(tuner.tune(600_000_000), Err(TuneError::Timeout));
        let (bus, clock) = tuner.release();
        assert_eq!(bus.reads, 10);
        assert_eq!(clock.0, 2 + 20);
    }

    #[test]
    fn test_zero_budget_still_polls_once() {
        let config = TunerConfig {
            lock_budget_ms: 0,
            ..TunerConfig::default()
        };
        let mut tuner = Mxl301rf::new(FakeBus::default(), Ticks::default(), config);
        assert_eq!(tuner.tune(600_000_000), Err(TuneError::Timeout));
        let (bus, _) = tuner.release();
        assert_eq!(bus.reads, 1);
    }

    #[test]
    fn test_out_of_range_sends_nothing() {
        let mut tuner = tuner(&[0x0F]);
        assert_eq!(tuner.tune(1_100_000_000), Err(TuneError::OutOfRange));
        assert_eq!(tuner.tune(4_000_000_000), Err(TuneError::OutOfRange));
        assert_eq!(tuner.state(), TuneState::Idle);
        assert_eq!(tuner.frequency(), None);

        // Top of the band still tunes
        assert_eq!(tuner.tune(synth::MAX_FREQUENCY_HZ), Ok(()));
        let (bus, _) = tuner.release();
        assert_eq!(bus.writes.len(), 12);
    }

    #[test]
    fn test_sleep_and_wakeup() {
        let mut tuner = tuner(&[0x0F, 0x0F]);
        assert_eq!(tuner.wakeup(), Ok(()));
        assert_eq!(tuner.state(), TuneState::Idle);

        tuner.tune(557_142_857).unwrap();
        tuner.sleep().unwrap();
        assert_eq!(tuner.state(), TuneState::Idle);
        tuner.wakeup().unwrap();
        assert_eq!(tuner.state(), TuneState::Locked);

        let (bus, _) = tuner.release();
        assert!(bus.writes.contains(&std::vec![0xFE, 0xC4, 0x01, 0x00, 0x13, 0x00]));
        assert!(bus.writes.contains(&std::vec![0x03, 0x90]));
        assert!(bus.writes.contains(&std::vec![0x03, 0x80]));
        assert!(bus.writes.contains(&std::vec![0xFE, 0xC4, 0x01, 0x01]));
    }
}
