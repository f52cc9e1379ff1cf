//! Drift-corrected tick timing.
//!
//! Each tick sleeps for whatever is left of the target period after the
//! tick's own work. An overrun yields a single zero-delay tick and the loop
//! settles back to the target rate; missed ticks are never replayed.

use std::time::Duration;

use tokio::time::Instant;

/// Delay before the next tick, given the target period and the time the
/// current tick took. Never negative.
pub const fn next_delay(target: Duration, elapsed: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

/// Achieved tick rate over one measurement window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    /// Ticks in the window.
    pub ticks: u64,
    /// Wall time the window spanned.
    pub elapsed: Duration,
}

impl RateSample {
    /// Ticks per second over the window, or `0.0` for an empty window.
    #[allow(clippy::cast_precision_loss)]
    pub fn rate_hz(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.ticks as f64 / secs
        } else {
            0.0
        }
    }
}

/// Counts ticks and reports the achieved rate every `window` ticks.
#[derive(Debug)]
pub struct TickRateMeter {
    window: u64,
    count: u64,
    window_start: Instant,
}

impl TickRateMeter {
    /// Create a meter reporting every `window` ticks. A window of zero
    /// disables reporting.
    pub fn new(window: u64) -> Self {
        Self {
            window,
            count: 0,
            window_start: Instant::now(),
        }
    }

    /// Begin a fresh window at `now`, discarding any partial count.
    pub const fn restart(&mut self, now: Instant) {
        self.count = 0;
        self.window_start = now;
    }

    /// Record one tick completed at `now`. Returns a sample when the window
    /// is full.
    pub fn record(&mut self, now: Instant) -> Option<RateSample> {
        if self.window == 0 {
            return None;
        }
        self.count = self.count.saturating_add(1);
        if self.count < self.window {
            return None;
        }
        let sample = RateSample {
            ticks: self.count,
            elapsed: now.saturating_duration_since(self.window_start),
        };
        self.count = 0;
        self.window_start = now;
        Some(sample)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TARGET: Duration = Duration::from_micros(16_667);

    #[test]
    fn fast_tick_sleeps_the_remainder() {
        assert_eq!(
            next_delay(TARGET, Duration::from_millis(4)),
            Duration::from_micros(12_667)
        );
    }

    #[test]
    fn overrun_yields_zero_delay() {
        assert_eq!(next_delay(TARGET, Duration::from_millis(40)), Duration::ZERO);
        assert_eq!(next_delay(TARGET, TARGET), Duration::ZERO);
    }

    #[test]
    fn single_overrun_does_not_cause_catch_up_burst() {
        // One slow tick, then normal ones: exactly one zero delay.
        let durations = [
            Duration::from_millis(2),
            Duration::from_millis(50),
            Duration::from_millis(2),
            Duration::from_millis(2),
            Duration::from_millis(2),
        ];
        let delays: Vec<Duration> = durations.iter().map(|d| next_delay(TARGET, *d)).collect();
        let zero_delays = delays.iter().filter(|d| d.is_zero()).count();
        assert_eq!(zero_delays, 1);
        assert!(delays.get(2..).unwrap().iter().all(|d| *d == Duration::from_micros(14_667)));
    }

    #[test]
    fn meter_reports_once_per_window() {
        let mut meter = TickRateMeter::new(3);
        let start = meter.window_start;
        assert!(meter.record(start + Duration::from_millis(10)).is_none());
        assert!(meter.record(start + Duration::from_millis(20)).is_none());
        let sample = meter.record(start + Duration::from_millis(30)).unwrap();
        assert_eq!(sample.ticks, 3);
        assert_eq!(sample.elapsed, Duration::from_millis(30));
        assert!((sample.rate_hz() - 100.0).abs() < 1e-9);
        assert!(meter.record(start + Duration::from_millis(40)).is_none());
    }

    #[test]
    fn restart_excludes_idle_time() {
        let mut meter = TickRateMeter::new(2);
        let built = meter.window_start;
        assert!(meter.record(built + Duration::from_millis(5)).is_none());

        // The loop sat stopped for a minute before running again.
        let resumed = built + Duration::from_secs(60);
        meter.restart(resumed);
        assert!(meter.record(resumed + Duration::from_millis(10)).is_none());
        let sample = meter.record(resumed + Duration::from_millis(20)).unwrap();
        assert_eq!(sample.ticks, 2);
        assert_eq!(sample.elapsed, Duration::from_millis(20));
    }

    #[test]
    fn zero_window_disables_reporting() {
        let mut meter = TickRateMeter::new(0);
        for _ in 0..10 {
            assert!(meter.record(Instant::now()).is_none());
        }
    }
}
