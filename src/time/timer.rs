//! Polled periodic timers.

/// Software timer that fires every `period` ticks when polled.
///
/// A timer that is polled late does not try to catch up on every missed
/// period: if it fell more than one period behind it re-arms one period from
/// now, otherwise it advances by exactly one period to stay in phase.
///
/// Elapsed time is measured with wrapping arithmetic from the tick the timer
/// was last armed at, so the timer keeps its period across a wrap of the tick
/// counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTimer {
    armed_at: Option<u32>,
    period: u32,
}

impl PeriodicTimer {
    /// Unarmed timer; the first poll arms it.
    pub const fn new(period: u32) -> Self {
        Self { armed_at: None, period }
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Tick at which the timer next fires (modulo 2^32), or 0 if unarmed.
    pub fn deadline(&self) -> u32 {
        self.armed_at.map_or(0, |armed_at| armed_at.wrapping_add(self.period))
    }

    /// Check the timer against the current tick `now`.
    ///
    /// Returns `true` once per elapsed period.
    pub fn expired(&mut self, now: u32) -> bool {
        let Some(armed_at) = self.armed_at else {
            self.armed_at = Some(now);
            return false;
        };
        let elapsed = now.wrapping_sub(armed_at);
        if elapsed < self.period {
            return false;
        }
        self.armed_at = if elapsed - self.period > self.period {
            Some(now)
        } else {
            Some(armed_at.wrapping_add(self.period))
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_per_period() {
        let mut timer = PeriodicTimer::new(10);
        assert!(!timer.expired(100));
        assert_eq!(timer.deadline(), 110);

        assert!(!timer.expired(109));
        assert!(timer.expired(110));
        assert_eq!(timer.deadline(), 120);
        assert!(!timer.expired(115));
        assert!(timer.expired(121));
        assert_eq!(timer.deadline(), 130);
    }

    #[test]
    fn test_late_poll_rearms_from_now() {
        let mut timer = PeriodicTimer::new(10);
        timer.expired(0);
        assert_eq!(timer.deadline(), 10);

        assert!(timer.expired(50));
        assert_eq!(timer.deadline(), 60);
        assert!(!timer.expired(55));
    }

    #[test]
    fn test_fires_once_per_period_across_wrap() {
        let mut timer = PeriodicTimer::new(10);
        timer.expired(u32::MAX - 5);
        assert_eq!(timer.deadline(), 4);

        let mut fired = std::vec::Vec::new();
        let mut now = u32::MAX - 5;
        for _ in 0..26 {
            now = now.wrapping_add(1);
            if timer.expired(now) {
                fired.push(now);
            }
        }
        assert_eq!(fired, [4, 14]);
        assert_eq!(timer.deadline(), 24);
    }

    #[test]
    fn test_no_refire_in_last_period_before_wrap() {
        let mut timer = PeriodicTimer::new(10);
        timer.expired(u32::MAX - 20);
        let fired = (u32::MAX - 9..=u32::MAX).filter(|now| timer.expired(*now)).count();
        // Late by one tick at MAX - 9, then on time at MAX.
        assert_eq!(fired, 2);
    }
}
