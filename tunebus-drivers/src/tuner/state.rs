//! Tune state machine
//!
//! ```text
//! Idle -> Programming -> Polling(n) -> Locked
//!                            |-------> TimedOut
//! Programming / Polling --bus fault--> Failed
//! ```

/// Tuner states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TuneState {
    /// Not tuned since power-up or sleep
    #[default]
    Idle,
    /// Writing the synthesizer program
    Programming,
    /// Waiting for lock; carries the number of polls that saw no lock
    Polling(u32),
    /// Both synthesizers locked and AGC back in automatic mode
    Locked,
    /// Lock budget exhausted
    TimedOut,
    /// A bus error aborted the sequence
    Failed,
}

/// Inputs to the tune state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TuneEvent {
    /// New tune requested
    Begin,
    /// Program and IDAC block written
    Programmed,
    /// Lock poll saw at least one synthesizer unlocked
    NotLocked,
    /// Lock poll saw both synthesizers locked
    LockDetected,
    /// No polls left
    BudgetExhausted,
    /// Register access failed
    BusFault,
    /// Tuner put to sleep
    Sleep,
}

impl TuneState {
    /// Check if a tune is in progress
    pub fn is_busy(&self) -> bool {
        matches!(self, TuneState::Programming | TuneState::Polling(_))
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, TuneState::Locked)
    }

    /// Process an event and return the next state
    pub fn transition(self, event: TuneEvent) -> Self {
        use TuneEvent::*;
        use TuneState::*;

        match (self, event) {
            (_, Sleep) => Idle,
            (_, Begin) => Programming,

            (Programming, Programmed) => Polling(0),
            (Programming, BusFault) => Failed,

            (Polling(n), NotLocked) => Polling(n + 1),
            (Polling(_), LockDetected) => Locked,
            (Polling(_), BudgetExhausted) => TimedOut,
            (Polling(_), BusFault) => Failed,

            // Everything else is ignored
            (state, _) => state,
        }
    }
}
