//! Rolling per-metric statistics
//!
//! Each tracker keeps a bounded FIFO of raw samples (mean/std are computed over
//! the window) plus running values that are never affected by eviction
//! (EWMA, min, max, last value, sample count).

use super::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Smoothing factor for the exponentially weighted moving average
pub const EWMA_ALPHA: f64 = 0.3;

/// Samples retained for mean/std computation
pub const DEFAULT_HISTORY_SIZE: usize = 100;

/// Metrics tracked by the anomaly detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Pressure,
    Radiation,
    Battery,
}

/// Which z-score directions count as anomalous for a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directionality {
    /// Both high and low deviations
    Both,
    /// Only positive deviations (spikes)
    SpikeOnly,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Pressure => "pressure",
            MetricKind::Radiation => "radiation",
            MetricKind::Battery => "battery",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, PipelineError> {
        match s {
            "pressure" => Ok(MetricKind::Pressure),
            "radiation" => Ok(MetricKind::Radiation),
            "battery" => Ok(MetricKind::Battery),
            other => Err(PipelineError::InvalidMetric(other.to_string())),
        }
    }

    pub fn all() -> [MetricKind; 3] {
        [MetricKind::Pressure, MetricKind::Radiation, MetricKind::Battery]
    }

    /// Rounding precision used in evidence bundles and statistics reports
    pub fn precision(&self) -> u32 {
        match self {
            MetricKind::Pressure => 4,
            MetricKind::Radiation => 6,
            MetricKind::Battery => 2,
        }
    }

    pub fn directionality(&self) -> Directionality {
        match self {
            MetricKind::Pressure | MetricKind::Battery => Directionality::Both,
            // Low radiation is never a hazard
            MetricKind::Radiation => Directionality::SpikeOnly,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Pressure => "kPa",
            MetricKind::Radiation => "mSv/hr",
            MetricKind::Battery => "kWh",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a metric's statistics
///
/// Mean and standard deviation are reported from the first sample on; a
/// single sample yields `std_dev == 0.0`. Anomaly scoring applies its own
/// minimum-sample gate before any of this is used to alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricStatistics {
    pub mean: f64,
    /// Population standard deviation over the window, always >= 0
    pub std_dev: f64,
    pub ewma: f64,
    /// Running minimum since construction or last reset
    pub min: f64,
    /// Running maximum since construction or last reset
    pub max: f64,
    pub sample_count: u64,
    pub last_value: f64,
}

#[derive(Debug, Clone)]
pub struct MetricStatisticsTracker {
    stats: MetricStatistics,
    history: VecDeque<f64>,
    capacity: usize,
}

impl MetricStatisticsTracker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            stats: MetricStatistics::default(),
            history: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a new sample and recompute statistics
    pub fn update(&mut self, value: f64) {
        self.history.push_back(value);
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        let n = self.history.len() as f64;
        let mean = self.history.iter().sum::<f64>() / n;
        let variance = self.history.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        let stats = &mut self.stats;
        stats.mean = mean;
        stats.std_dev = variance.max(0.0).sqrt();

        if stats.sample_count == 0 {
            stats.ewma = value;
            stats.min = value;
            stats.max = value;
        } else {
            stats.ewma = EWMA_ALPHA * value + (1.0 - EWMA_ALPHA) * stats.ewma;
            stats.min = stats.min.min(value);
            stats.max = stats.max.max(value);
        }

        stats.last_value = value;
        stats.sample_count += 1;
    }

    pub fn snapshot(&self) -> MetricStatistics {
        self.stats
    }

    pub fn reset(&mut self) {
        self.stats = MetricStatistics::default();
        self.history.clear();
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for MetricStatisticsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_from_str() {
        assert_eq!(MetricKind::from_str("pressure").unwrap(), MetricKind::Pressure);
        assert_eq!(MetricKind::from_str("battery").unwrap(), MetricKind::Battery);
        assert!(matches!(
            MetricKind::from_str("humidity"),
            Err(PipelineError::InvalidMetric(name)) if name == "humidity"
        ));
    }

    #[test]
    fn test_ewma_recursive_blend() {
        let mut tracker = MetricStatisticsTracker::new();
        let samples = [10.0, 20.0, 15.0, 30.0];

        let mut expected = 0.0;
        for (i, &v) in samples.iter().enumerate() {
            tracker.update(v);
            expected = if i == 0 { v } else { 0.3 * v + 0.7 * expected };
            assert!((tracker.snapshot().ewma - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_mean_and_population_std() {
        let mut tracker = MetricStatisticsTracker::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            tracker.update(v);
        }

        let stats = tracker.snapshot();
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(stats.sample_count, 8);
        assert_eq!(stats.last_value, 9.0);
    }

    #[test]
    fn test_single_sample_has_zero_std() {
        let mut tracker = MetricStatisticsTracker::new();
        tracker.update(101.325);

        let stats = tracker.snapshot();
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.mean, 101.325);
        assert_eq!(stats.min, 101.325);
        assert_eq!(stats.max, 101.325);
    }

    #[test]
    fn test_history_is_bounded_but_extrema_survive_eviction() {
        let mut tracker = MetricStatisticsTracker::with_capacity(5);
        tracker.update(-50.0);
        tracker.update(500.0);
        for _ in 0..10 {
            tracker.update(1.0);
        }

        assert_eq!(tracker.history_len(), 5);
        let stats = tracker.snapshot();
        assert_eq!(stats.mean, 1.0);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.min, -50.0);
        assert_eq!(stats.max, 500.0);
        assert_eq!(stats.sample_count, 12);
    }

    #[test]
    fn test_std_never_negative_for_constant_input() {
        let mut tracker = MetricStatisticsTracker::new();
        for _ in 0..150 {
            tracker.update(0.1 + 0.2);
            assert!(tracker.snapshot().std_dev >= 0.0);
        }
        assert_eq!(tracker.history_len(), DEFAULT_HISTORY_SIZE);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut tracker = MetricStatisticsTracker::new();
        for v in [1.0, 2.0, 3.0] {
            tracker.update(v);
        }
        tracker.reset();

        assert_eq!(tracker.snapshot(), MetricStatistics::default());
        assert_eq!(tracker.history_len(), 0);

        // First sample after reset re-seeds EWMA and extrema
        tracker.update(42.0);
        let stats = tracker.snapshot();
        assert_eq!(stats.ewma, 42.0);
        assert_eq!(stats.min, 42.0);
        assert_eq!(stats.sample_count, 1);
    }
}
