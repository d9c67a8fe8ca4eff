//! Short rolling windows feeding the safety monitor
//!
//! - `RateWindow` - time-bounded (timestamp, value) pairs for rate-of-change
//! - `BaselineTracker` - count-bounded readings for spike-over-baseline

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Common interface for a bounded sample window
pub trait RollingWindow {
    /// Add a sample observed at `at`
    fn push(&mut self, at: DateTime<Utc>, value: f64);

    /// Check if the window is empty
    fn is_empty(&self) -> bool;

    /// Get the number of samples in this window
    fn len(&self) -> usize;
}

/// Time-bounded window used for pressure leak detection
///
/// Samples older than `span` relative to the newest sample are pruned on
/// every push.
#[derive(Debug, Clone)]
pub struct RateWindow {
    samples: VecDeque<(DateTime<Utc>, f64)>,
    span: Duration,
}

impl RateWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(64),
            span,
        }
    }

    /// Five-minute window
    pub fn five_minutes() -> Self {
        Self::new(Duration::minutes(5))
    }

    fn evict_before(&mut self, cutoff: DateTime<Utc>) {
        while let Some((ts, _)) = self.samples.front() {
            if *ts >= cutoff {
                break;
            }
            self.samples.pop_front();
        }
    }

    /// Percent change per minute between the oldest and newest samples
    ///
    /// Only the endpoint pair is used, not a regression over the window.
    /// Returns `None` with fewer than two samples, zero elapsed time, or a
    /// zero oldest value.
    pub fn rate_per_minute(&self) -> Option<f64> {
        if self.samples.len() < 2 {
            return None;
        }
        let (oldest_ts, oldest) = *self.samples.front()?;
        let (newest_ts, newest) = *self.samples.back()?;

        let elapsed_minutes = (newest_ts - oldest_ts).num_milliseconds() as f64 / 60_000.0;
        if elapsed_minutes == 0.0 || oldest == 0.0 {
            return None;
        }

        let change_pct = (newest - oldest) / oldest * 100.0;
        Some(change_pct / elapsed_minutes)
    }

    pub fn span(&self) -> Duration {
        self.span
    }
}

impl RollingWindow for RateWindow {
    fn push(&mut self, at: DateTime<Utc>, value: f64) {
        self.samples.push_back((at, value));
        self.evict_before(at - self.span);
    }

    fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Count-bounded window with a moving baseline
///
/// Keeps the last `capacity` readings; once `baseline_len` readings exist
/// the baseline is the mean of the most recent `baseline_len` (the newest
/// reading included).
#[derive(Debug, Clone)]
pub struct BaselineTracker {
    readings: VecDeque<f64>,
    capacity: usize,
    baseline_len: usize,
    baseline: Option<f64>,
}

impl BaselineTracker {
    pub fn new(capacity: usize, baseline_len: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
            baseline_len: baseline_len.clamp(1, capacity),
            baseline: None,
        }
    }

    pub fn add_reading(&mut self, value: f64) {
        self.readings.push_back(value);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }

        if self.readings.len() >= self.baseline_len {
            let recent = self.readings.iter().rev().take(self.baseline_len);
            self.baseline = Some(recent.sum::<f64>() / self.baseline_len as f64);
        }
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline
    }

    /// True when `current` exceeds the baseline by more than `margin`
    pub fn is_spike(&self, current: f64, margin: f64) -> bool {
        match self.baseline {
            Some(baseline) => current > baseline + margin,
            None => false,
        }
    }
}

impl Default for BaselineTracker {
    fn default() -> Self {
        Self::new(10, 5)
    }
}

impl RollingWindow for BaselineTracker {
    fn push(&mut self, _at: DateTime<Utc>, value: f64) {
        self.add_reading(value);
    }

    fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    fn len(&self) -> usize {
        self.readings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_rate_requires_two_samples() {
        let mut window = RateWindow::five_minutes();
        assert!(window.rate_per_minute().is_none());
        window.push(t(0), 101.0);
        assert!(window.rate_per_minute().is_none());
    }

    #[test]
    fn test_rate_uses_oldest_and_newest_only() {
        let mut window = RateWindow::five_minutes();
        window.push(t(0), 100.0);
        window.push(t(30), 50.0); // ignored by the endpoint rate
        window.push(t(60), 97.0);

        let rate = window.rate_per_minute().unwrap();
        assert!((rate - (-3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_rate_undefined_for_zero_elapsed_or_zero_oldest() {
        let mut window = RateWindow::five_minutes();
        window.push(t(0), 100.0);
        window.push(t(0), 90.0);
        assert!(window.rate_per_minute().is_none());

        let mut window = RateWindow::five_minutes();
        window.push(t(0), 0.0);
        window.push(t(60), 10.0);
        assert!(window.rate_per_minute().is_none());
    }

    #[test]
    fn test_rate_window_prunes_older_than_span() {
        let mut window = RateWindow::five_minutes();
        window.push(t(0), 100.0);
        window.push(t(200), 99.0);
        window.push(t(300), 98.0); // cutoff == t(0): kept
        assert_eq!(window.len(), 3);

        window.push(t(301), 97.0);
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn test_baseline_needs_five_readings() {
        let mut tracker = BaselineTracker::default();
        for _ in 0..4 {
            tracker.add_reading(0.02);
        }
        assert!(tracker.baseline().is_none());
        assert!(!tracker.is_spike(10.0, 0.1));

        tracker.add_reading(0.02);
        assert!((tracker.baseline().unwrap() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_is_mean_of_most_recent_five() {
        let mut tracker = BaselineTracker::default();
        for v in [10.0, 10.0, 10.0, 1.0, 2.0, 3.0, 4.0, 5.0] {
            tracker.add_reading(v);
        }
        assert_eq!(tracker.baseline(), Some(3.0));
    }

    #[test]
    fn test_baseline_history_bounded_to_ten() {
        let mut tracker = BaselineTracker::default();
        for i in 0..25 {
            tracker.add_reading(i as f64);
        }
        assert_eq!(tracker.len(), 10);
    }
}
