//! Monotonic tick counter.

use portable_atomic::{AtomicU32, Ordering};

/// Tick counter incremented by the timer interrupt.
///
/// This is the firmware's time base; it wraps after `u32::MAX` ticks
/// (about 49 days at 1 kHz).
pub struct TickCounter {
    ticks: AtomicU32,
    frequency: u32,
}

impl TickCounter {
    /// Create a counter for a tick source running at `frequency` Hz.
    ///
    /// # Panics
    ///
    /// Panics if `frequency` is 0; in a `static` this is a build error.
    pub const fn new(frequency: u32) -> Self {
        assert!(frequency > 0, "tick frequency must be non-zero");
        Self {
            ticks: AtomicU32::new(0),
            frequency,
        }
    }

    /// Count one tick. Only the timer interrupt calls this.
    pub fn increment(&self) -> u32 {
        self.ticks.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Ticks since start, modulo 2^32.
    pub fn ticks(&self) -> u32 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Tick frequency in Hz.
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Convert a tick count to milliseconds.
    pub fn ticks_to_millis(&self, ticks: u32) -> u64 {
        ticks as u64 * 1000 / self.frequency as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counter() {
        let counter = TickCounter::new(1000);
        assert_eq!(counter.ticks(), 0);
        assert_eq!(counter.frequency(), 1000);

        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.ticks(), 1);
        assert_eq!(counter.ticks_to_millis(1500), 1500);
    }

    #[test]
    fn test_tick_counter_wraps() {
        let counter = TickCounter::new(100);
        counter.ticks.store(u32::MAX, Ordering::Release);
        assert_eq!(counter.increment(), 0);
        assert_eq!(counter.ticks_to_millis(5), 50);
    }

    #[test]
    #[should_panic(expected = "tick frequency must be non-zero")]
    fn test_zero_frequency_rejected() {
        TickCounter::new(0);
    }
}
