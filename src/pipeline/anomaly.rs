//! Statistical anomaly detection (z-score over rolling statistics)
//!
//! # Severity
//! - |z| >= 3.5 → CRITICAL, confidence = min(0.99, 0.7 + (|z| - 3.5) * 0.1)
//! - |z| >= 2.5 → WARNING, confidence = min(0.95, 0.5 + (|z| - 2.5) * 0.15)
//!
//! # Directionality
//! Pressure and battery flag high and low deviations; radiation flags spikes only.
//!
//! No alert is produced until a metric has at least 10 samples and a non-zero
//! standard deviation.

use super::error::PipelineError;
use super::stats::{Directionality, MetricKind, MetricStatistics, MetricStatisticsTracker};
use super::types::{
    round_to, Alert, AlertSeverity, AnomalyAlert, AnomalyEvidence, AnomalyType, SettlementState,
    Significance,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub const Z_SCORE_THRESHOLD: f64 = 2.5;
pub const Z_SCORE_CRITICAL: f64 = 3.5;
pub const MIN_SAMPLES: u64 = 10;

/// Stateless classifier: tracker statistics + new sample → zero or one alert
pub struct AnomalyClassifier;

impl AnomalyClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(
        &self,
        metric: MetricKind,
        value: f64,
        stats: &MetricStatistics,
    ) -> Option<AnomalyAlert> {
        self.evaluate_at(metric, value, stats, Utc::now())
    }

    pub fn evaluate_at(
        &self,
        metric: MetricKind,
        value: f64,
        stats: &MetricStatistics,
        now: DateTime<Utc>,
    ) -> Option<AnomalyAlert> {
        if stats.sample_count < MIN_SAMPLES || stats.std_dev <= 0.0 {
            return None;
        }

        let z_score = (value - stats.mean) / stats.std_dev;
        if metric.directionality() == Directionality::SpikeOnly && z_score <= 0.0 {
            return None;
        }

        let abs_z = z_score.abs();
        let (severity, confidence) = if abs_z >= Z_SCORE_CRITICAL {
            (
                AlertSeverity::Critical,
                (0.7 + (abs_z - Z_SCORE_CRITICAL) * 0.1).min(0.99),
            )
        } else if abs_z >= Z_SCORE_THRESHOLD {
            (
                AlertSeverity::Warning,
                (0.5 + (abs_z - Z_SCORE_THRESHOLD) * 0.15).min(0.95),
            )
        } else {
            return None;
        };

        let anomaly_type = match metric.directionality() {
            Directionality::SpikeOnly => AnomalyType::Spike,
            Directionality::Both if z_score > 0.0 => AnomalyType::High,
            Directionality::Both => AnomalyType::Low,
        };

        let evidence = build_evidence(metric, value, z_score, stats, anomaly_type);
        let (message, recommendation) = describe(metric, value, z_score, stats, anomaly_type);

        let alert = Alert::new(
            severity,
            format!("anomaly_{}", metric.as_str()),
            message,
            metric.as_str(),
            now,
        );

        Some(AnomalyAlert {
            alert,
            metric,
            current_value: value,
            z_score,
            confidence,
            evidence,
            recommendation,
        })
    }
}

impl Default for AnomalyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn build_evidence(
    metric: MetricKind,
    value: f64,
    z_score: f64,
    stats: &MetricStatistics,
    anomaly_type: AnomalyType,
) -> AnomalyEvidence {
    let p = metric.precision();
    let deviation = value - stats.mean;
    let deviation_percent = if stats.mean != 0.0 {
        deviation / stats.mean * 100.0
    } else {
        0.0
    };

    let ewma_deviation = match metric {
        MetricKind::Pressure => None,
        MetricKind::Radiation | MetricKind::Battery => Some(round_to(value - stats.ewma, p)),
    };

    // % change from EWMA
    let charge_rate = match metric {
        MetricKind::Battery if stats.ewma != 0.0 => {
            Some(round_to((value - stats.ewma) / stats.ewma * 100.0, 2))
        }
        MetricKind::Battery => Some(0.0),
        _ => None,
    };

    let significance = if z_score.abs() >= Z_SCORE_CRITICAL {
        Significance::Critical
    } else {
        Significance::Significant
    };

    AnomalyEvidence {
        current_value: value,
        mean: round_to(stats.mean, p),
        std_dev: round_to(stats.std_dev, p),
        ewma: round_to(stats.ewma, p),
        z_score: round_to(z_score, 4),
        z_score_threshold: Z_SCORE_THRESHOLD,
        z_score_critical: Z_SCORE_CRITICAL,
        deviation_from_mean: round_to(deviation, p),
        deviation_percent: round_to(deviation_percent, 2),
        sample_count: stats.sample_count,
        min_value: round_to(stats.min, p),
        max_value: round_to(stats.max, p),
        anomaly_type,
        significance,
        precision: p,
        ewma_deviation,
        charge_rate,
    }
}

fn describe(
    metric: MetricKind,
    value: f64,
    z_score: f64,
    stats: &MetricStatistics,
    anomaly_type: AnomalyType,
) -> (String, String) {
    let deviation = value - stats.mean;
    let is_high = anomaly_type != AnomalyType::Low;

    match metric {
        MetricKind::Pressure => (
            format!(
                "Pressure anomaly detected: {:.2} kPa (z-score: {:.2}, {} mean by {:.2} kPa)",
                value,
                z_score,
                if is_high { "above" } else { "below" },
                deviation.abs()
            ),
            format!(
                "Pressure is {} ({:.2} kPa deviation from mean {:.2} kPa). \
                 Investigate pressure systems and verify sensor readings.",
                if is_high { "abnormally high" } else { "abnormally low" },
                deviation.abs(),
                stats.mean
            ),
        ),
        MetricKind::Radiation => (
            format!(
                "Radiation anomaly detected: {:.6} mSv/hr (z-score: {:.2}, {:.6} mSv/hr above mean)",
                value, z_score, deviation
            ),
            format!(
                "Radiation spike detected ({:.6} mSv/hr, {:.6} mSv/hr above mean). \
                 Verify sensor readings and check for solar events or shielding issues.",
                value, deviation
            ),
        ),
        MetricKind::Battery => {
            let message = format!(
                "Battery anomaly detected: {:.2} kWh (z-score: {:.2}, {} mean by {:.2} kWh)",
                value,
                z_score,
                if is_high { "above" } else { "below" },
                deviation.abs()
            );
            let recommendation = if is_high {
                format!(
                    "Battery level is abnormally high ({:.2} kWh, {:.2} kWh above mean). \
                     Possible overcharging or sensor malfunction. Verify charging systems.",
                    value, deviation
                )
            } else {
                format!(
                    "Battery level is abnormally low ({:.2} kWh, {:.2} kWh below mean). \
                     Possible rapid discharge or system issue. Investigate power consumption and battery health.",
                    value,
                    deviation.abs()
                )
            };
            (message, recommendation)
        }
    }
}

/// Per-metric trackers bound to the shared classifier
///
/// Owned by the anomaly cycle; no other component touches these trackers.
pub struct AnomalyDetector {
    trackers: BTreeMap<MetricKind, MetricStatisticsTracker>,
    classifier: AnomalyClassifier,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self::with_history_size(super::stats::DEFAULT_HISTORY_SIZE)
    }

    pub fn with_history_size(history_size: usize) -> Self {
        let trackers = MetricKind::all()
            .into_iter()
            .map(|m| (m, MetricStatisticsTracker::with_capacity(history_size)))
            .collect();

        Self {
            trackers,
            classifier: AnomalyClassifier::new(),
        }
    }

    fn tracker_mut(&mut self, metric: MetricKind) -> &mut MetricStatisticsTracker {
        self.trackers.entry(metric).or_default()
    }

    /// Feed one sample into the metric's tracker, then classify it
    ///
    /// The sample is part of the window used to compute mean/std.
    pub fn evaluate_anomaly(&mut self, metric: MetricKind, value: f64) -> Option<AnomalyAlert> {
        let tracker = self.tracker_mut(metric);
        tracker.update(value);
        let stats = tracker.snapshot();
        self.classifier.evaluate(metric, value, &stats)
    }

    /// String-keyed variant for external request paths
    pub fn evaluate_anomaly_by_name(
        &mut self,
        metric: &str,
        value: f64,
    ) -> Result<Option<AnomalyAlert>, PipelineError> {
        let metric = MetricKind::from_str(metric)?;
        Ok(self.evaluate_anomaly(metric, value))
    }

    /// Update and evaluate pressure, radiation and battery from one snapshot
    pub fn detect_anomalies(&mut self, state: &SettlementState) -> Vec<AnomalyAlert> {
        let readings = [
            (MetricKind::Pressure, state.pressure_kpa),
            (MetricKind::Radiation, state.radiation_msv_hr),
            (MetricKind::Battery, state.battery_kwh),
        ];

        readings
            .into_iter()
            .filter_map(|(metric, value)| self.evaluate_anomaly(metric, value))
            .collect()
    }

    pub fn get_statistics(&self) -> BTreeMap<MetricKind, MetricStatistics> {
        self.trackers
            .iter()
            .map(|(metric, tracker)| (*metric, tracker.snapshot()))
            .collect()
    }

    /// Statistics rounded to each metric's reporting precision
    pub fn get_statistics_rounded(&self) -> BTreeMap<MetricKind, MetricStatistics> {
        self.get_statistics()
            .into_iter()
            .map(|(metric, s)| {
                let p = metric.precision();
                let rounded = MetricStatistics {
                    mean: round_to(s.mean, p),
                    std_dev: round_to(s.std_dev, p),
                    ewma: round_to(s.ewma, p),
                    min: round_to(s.min, p),
                    max: round_to(s.max, p),
                    ..s
                };
                (metric, rounded)
            })
            .collect()
    }

    pub fn statistics(&self, metric: MetricKind) -> MetricStatistics {
        self.trackers
            .get(&metric)
            .map(|t| t.snapshot())
            .unwrap_or_default()
    }

    pub fn statistics_for(&self, metric: &str) -> Result<MetricStatistics, PipelineError> {
        Ok(self.statistics(MetricKind::from_str(metric)?))
    }

    /// Reset one metric, or all of them when `metric` is `None`
    pub fn reset_statistics(&mut self, metric: Option<MetricKind>) {
        match metric {
            Some(metric) => self.tracker_mut(metric).reset(),
            None => self.trackers.values_mut().for_each(|t| t.reset()),
        }
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new()
    }
}
