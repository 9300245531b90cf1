//! Frame clock.
use std::{
    thread,
    time::{Duration, Instant},
};

use crate::{constants::*, vm::Hz};

/// Timer to synchronize a thread with the 60 Hz frame rate of the VM.
///
/// The interpreter itself has no notion of wall time. The driver of the
/// VM uses this to pace calls to [`crate::prelude::Chip8Vm::run_frame`]
/// and the timer ticks.
pub struct Clock {
    last: Instant,
    interval: Duration,
}

impl Default for Clock {
    /// Clock running at the timer frequency.
    fn default() -> Self {
        Self::new(Duration::from_nanos(TIMER_CYCLE_TIME))
    }
}

impl From<Hz> for Clock {
    fn from(freq: Hz) -> Self {
        Self::new(freq.into())
    }
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub fn new(interval: Duration) -> Self {
        Self {
            last: Instant::now(),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.last = Instant::now()
    }

    /// Check whether a cycle has elapsed, without blocking.
    ///
    /// Starts the next cycle when it has.
    pub fn tick(&mut self) -> bool {
        if self.last.elapsed() >= self.interval {
            self.reset();
            true
        } else {
            false
        }
    }

    /// Block the current thread until the next clock cycle.
    pub fn wait(&mut self) {
        while self.last.elapsed() < self.interval {
            // Sleep does not have enough resolution at 60 Hz.
            thread::yield_now();
        }

        // Reset back to zero, rather than trying to catch up after a pause.
        self.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clock_wait() {
        let mut clock = Clock::new(Duration::from_millis(5));
        let start = Instant::now();
        clock.wait();
        assert!(start.elapsed() >= Duration::from_millis(4));
        assert!(!clock.tick());
    }

    #[test]
    fn test_clock_from_hz() {
        assert_eq!(Clock::from(Hz(1000)).interval(), Duration::from_millis(1));
        assert_eq!(Clock::default().interval().as_millis(), 16);

        // zero interval always ticks
        let mut clock = Clock::from(Hz(0));
        assert!(clock.tick());
    }
}
