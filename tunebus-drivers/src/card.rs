//! Card bring-up
//!
//! After reset the sequencer may still own the bus and the tuners are
//! unpowered. Power-up releases the bus, switches the tuner supply on
//! through the demodulator, runs the tuner initialisation program that
//! ships resident in command memory and finally enables the LNA amplifier.
//! The resident program talks to an unpowered tuner otherwise, so the order
//! is fixed.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::delay::DelayNs;
use tunebus_core::config::TunerConfig;
use tunebus_core::{BusError, TransactionDriver};
use tunebus_hal::SequencerPort;

use crate::demod::{power, DemodError, Tc90522};

/// Error type of card power operations
pub type Error = DemodError<BusError>;

/// Power the front end up
///
/// # Arguments
/// * `bus` - Transaction driver of the card's sequencer
/// * `config` - Addresses of the demodulator and tuner
pub fn power_up<M, P, D>(bus: &TransactionDriver<M, P, D>, config: &TunerConfig) -> Result<(), Error>
where
    M: RawMutex,
    P: SequencerPort,
    D: DelayNs,
{
    info!("card: power up");
    bus.run_resident(0)?;

    let mut demod = Tc90522::new(bus, config.demod_address, config.tuner_address);
    demod.set_power(power::TUNER_ON)?;

    let start = bus.config().resident_start;
    debug!("card: tuner init program at {=u32:#x}", start);
    bus.run_resident(start)?;

    demod.set_power(power::TUNER_ON | power::AMP_ON)
}

/// Switch every front-end supply off
pub fn power_down<M, P, D>(bus: &TransactionDriver<M, P, D>, config: &TunerConfig) -> Result<(), Error>
where
    M: RawMutex,
    P: SequencerPort,
    D: DelayNs,
{
    info!("card: power down");
    Tc90522::new(bus, config.demod_address, config.tuner_address).set_power(power::OFF)
}
