//! Monotonic time source
//!
//! Delays alone cannot bound an operation whose steps also spend time on
//! the bus. Drivers that promise a wall-clock budget take a [`Clock`] and
//! compare against a deadline instead of counting their own sleeps.

/// Millisecond monotonic clock
pub trait Clock {
    /// Milliseconds since an arbitrary fixed origin
    ///
    /// Must never go backwards.
    fn now_ms(&self) -> u64;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

impl<T: Clock + ?Sized> Clock for &mut T {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
