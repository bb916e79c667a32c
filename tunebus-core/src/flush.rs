//! Flush & status controller
//!
//! Commits a finished program, triggers playback and decodes the status
//! word once the sequencer goes idle.

use embedded_hal::delay::DelayNs;
use tunebus_hal::SequencerPort;

use crate::config::{BusConfig, MAX_START_OFFSET};
use crate::error::BusError;
use crate::sequence::SequenceWriter;

/// Control word bits
pub mod ctrl {
    /// Start playback at the offset in bits 0-12
    pub const TRIGGER: u32 = 1 << 16;
    /// Reset the sequencer
    pub const RESET: u32 = 1 << 17;
    /// Offset field of the trigger word
    pub const START_MASK: u32 = super::MAX_START_OFFSET - 1;
}

/// Decoded status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusStatus(pub u32);

impl BusStatus {
    const RUNNING: u32 = 1 << 0;
    const ACK_ERROR: u32 = 0b0110;
    const CLEAN: u32 = 1 << 3;

    /// Program still executing
    pub fn is_running(self) -> bool {
        self.0 & Self::RUNNING != 0
    }

    /// A slave failed to acknowledge
    pub fn ack_failed(self) -> bool {
        self.0 & Self::ACK_ERROR != 0
    }

    /// Bus left idle by the last program
    pub fn is_clean(self) -> bool {
        self.0 & Self::CLEAN != 0
    }
}

/// Triggers and supervises one program run
pub struct FlushController<'a, P: SequencerPort + ?Sized, D: DelayNs + ?Sized> {
    port: &'a mut P,
    delay: &'a mut D,
    config: &'a BusConfig,
}

impl<'a, P: SequencerPort + ?Sized, D: DelayNs + ?Sized> FlushController<'a, P, D> {
    /// Borrow the port and delay for one run
    ///
    /// # Arguments
    /// * `port` - Sequencer windows
    /// * `delay` - Sleeps between status polls
    /// * `config` - Poll bounds
    pub fn new(port: &'a mut P, delay: &'a mut D, config: &'a BusConfig) -> Self {
        Self {
            port,
            delay,
            config,
        }
    }

    /// Current status word
    pub fn status(&mut self) -> BusStatus {
        BusStatus(self.port.read_status())
    }

    /// Sleep until the running bit clears
    ///
    /// Returns the last status read, or `None` once `busy_poll_limit` polls
    /// have all seen the sequencer running.
    fn wait_idle(&mut self) -> Option<BusStatus> {
        for _ in 0..self.config.busy_poll_limit {
            let status = self.status();
            if !status.is_running() {
                return Some(status);
            }
            self.delay.delay_ms(self.config.busy_poll_interval_ms);
        }
        None
    }

    /// Trigger the program at `start` (nibble offset) and wait for it
    pub fn run(&mut self, start: u32) -> Result<(), BusError> {
        if start >= MAX_START_OFFSET {
            error!("flush: start offset {=u32:#x} out of range", start);
            return Err(BusError::UnsupportedTransaction);
        }

        if self.wait_idle().is_none() {
            warn!("flush: sequencer still busy, nothing triggered");
            return Err(BusError::Timeout);
        }

        self.port.write_control(ctrl::TRIGGER | start);

        let status = match self.wait_idle() {
            Some(status) => status,
            None => {
                error!("flush: program at {=u32:#x} never completed", start);
                return Err(BusError::DriverMalfunction);
            }
        };

        if status.ack_failed() {
            debug!("flush: ack failure, status {=u32:#x}", status.0);
            return Err(BusError::AckFailure);
        }

        Ok(())
    }

    /// Pulse the sequencer reset bit
    pub fn reset(&mut self) {
        self.port.write_control(ctrl::RESET);
    }
}

/// Terminate the writer's program and run it from the region start
pub fn flush<P, D>(
    mut writer: SequenceWriter<'_, P>,
    delay: &mut D,
    config: &BusConfig,
) -> Result<(), BusError>
where
    P: SequencerPort + ?Sized,
    D: DelayNs + ?Sized,
{
    writer.finish();
    trace!("flush: {=u32} command bytes", writer.bytes_written());
    FlushController::new(writer.port(), delay, config).run(0)
}
