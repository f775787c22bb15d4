//! Frame timing.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source for the viewer.
pub trait Clock {
    /// Time since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// Wall-clock time since construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Sets the current time.
    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Timing of rendered frames since the last [`FrameStats::begin`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    /// When the current run of frames started.
    pub start_time: Duration,
    /// When the previous frame finished.
    pub prev_time: Duration,
    /// Frames since `start_time`.
    pub count: u64,
    pub last_duration: Duration,
    pub max_duration: Duration,
    pub min_duration: Option<Duration>,
    pub total_duration: Duration,
}

impl FrameStats {
    /// Starts a new run of frames.
    pub fn begin(&mut self, now: Duration) {
        self.start_time = now;
        self.prev_time = now;
        self.count = 0;
        self.total_duration = Duration::ZERO;
    }

    /// Records a finished frame.
    pub fn update(&mut self, now: Duration) {
        let delta = now.saturating_sub(self.prev_time);
        self.prev_time = now;
        self.count += 1;
        self.last_duration = delta;
        self.max_duration = self.max_duration.max(delta);
        self.min_duration = Some(self.min_duration.map_or(delta, |m| m.min(delta)));
        self.total_duration += delta;
    }

    /// Mean frame time of the current run.
    #[must_use]
    pub fn average_duration(&self) -> Duration {
        u32::try_from(self.count)
            .ok()
            .filter(|c| *c > 0)
            .map_or(Duration::ZERO, |c| self.total_duration / c)
    }

    /// Time since the run started.
    #[must_use]
    pub fn since_start(&self, now: Duration) -> Duration {
        now.saturating_sub(self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(Duration::from_millis(30));
        assert_eq!(other.now(), Duration::from_millis(30));
    }

    #[test]
    fn test_stats_update() {
        let mut stats = FrameStats::default();
        stats.begin(Duration::from_millis(100));
        stats.update(Duration::from_millis(110));
        stats.update(Duration::from_millis(130));
        assert_eq!(stats.count, 2);
        assert_eq!(stats.last_duration, Duration::from_millis(20));
        assert_eq!(stats.max_duration, Duration::from_millis(20));
        assert_eq!(stats.min_duration, Some(Duration::from_millis(10)));
        assert_eq!(stats.average_duration(), Duration::from_millis(15));
        assert_eq!(stats.since_start(Duration::from_millis(600)), Duration::from_millis(500));
    }
}
