/// Monotonic time source

/// Millisecond clock with a blocking delay.
///
/// The delay is part of the clock so that polling loops can be driven by a
/// simulated clock in tests, where delaying advances time instead of sleeping.
pub trait Clock {
    /// Milliseconds since boot. Wraps after ~49 days.
    fn now_ms(&self) -> u32;

    /// Block the caller for at least `ms` milliseconds
    fn delay_ms(&self, ms: u32);
}
