use std::time::Duration;

use tokio::time::Instant;

/// Wall-clock bookkeeping for the tick loop.
///
/// `TickClock` measures the elapsed time between consecutive ticks and
/// counts them. Elapsed time is never negative and is not corrected when a
/// tick runs late: the late tick simply integrates a larger step.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use energy_sim::sim::clock::TickClock;
/// use tokio::time::Instant;
///
/// let start = Instant::now();
/// let mut clock = TickClock::new(start);
///
/// let (tick, dt) = clock.lap(start + Duration::from_millis(1500));
/// assert_eq!(tick, 0);
/// assert_eq!(dt, Duration::from_millis(1500));
/// ```
pub struct TickClock {
    /// Timestamp of the previous tick (startup time before the first tick).
    last: Instant,
    /// Number of ticks completed so far.
    ticks: u64,
}

impl TickClock {
    /// Creates a clock whose first lap is measured from `start`.
    pub fn new(start: Instant) -> Self {
        Self {
            last: start,
            ticks: 0,
        }
    }

    /// Closes the current tick at `now`.
    ///
    /// # Returns
    ///
    /// The tick index (starting from 0) and the time elapsed since the
    /// previous tick.
    pub fn lap(&mut self, now: Instant) -> (u64, Duration) {
        let dt = now.saturating_duration_since(self.last);
        let tick = self.ticks;
        self.last = now;
        self.ticks += 1;
        (tick, dt)
    }

    /// Number of ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// A periodic trigger that fires once strictly more than `period` has passed.
pub struct Cadence {
    period: Duration,
    last: Instant,
}

impl Cadence {
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            last: start,
        }
    }

    /// Returns `true` and restarts the period if it has elapsed at `now`.
    pub fn due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) > self.period {
            self.last = now;
            true
        } else {
            false
        }
    }
}
