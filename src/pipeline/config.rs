//! Pipeline configuration from environment variables

use super::approval::DEFAULT_APPROVAL_CAPACITY;
use super::fault::{Scenario, DEFAULT_LEAK_PCT_PER_MIN};
use super::sinks::DEFAULT_STORE_CAPACITY;
use std::env;
use std::time::Duration;

/// Configuration for pipeline runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Path to the append-only JSONL audit log
    pub audit_log_path: String,

    /// Telemetry simulator update interval in milliseconds
    pub telemetry_interval_ms: u64,

    /// Safety monitor cycle interval in milliseconds
    pub safety_interval_ms: u64,

    /// Anomaly detection cycle interval in milliseconds
    pub anomaly_interval_ms: u64,

    /// Decision engine cycle interval in milliseconds
    pub decision_interval_ms: u64,

    /// Master enable flag for pipeline
    pub enabled: bool,

    /// Fault scenario scheduled at startup, if any
    pub fault_scenario: Option<Scenario>,

    /// Delay before the scheduled fault scenario starts
    pub fault_delay_secs: u64,

    /// Scenario duration; scenario default when unset
    pub fault_duration_secs: Option<u64>,

    /// Alerts kept by the in-memory alert store
    pub alert_store_capacity: usize,

    /// Recommendations kept by the in-memory recommendation store
    pub recommendation_store_capacity: usize,

    /// Entries kept by the approval gate
    pub approval_capacity: usize,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `HELIOS_AUDIT_LOG_PATH` (default: audit_log.jsonl)
    /// - `TELEMETRY_INTERVAL_MS` (default: 1000)
    /// - `SAFETY_CHECK_INTERVAL_MS` (default: 5000)
    /// - `ANOMALY_CHECK_INTERVAL_MS` (default: 10000)
    /// - `DECISION_INTERVAL_MS` (default: 30000)
    /// - `ENABLE_PIPELINE` (default: true)
    /// - `FAULT_SCENARIO` (radiation_storm | pressure_leak, default: none)
    /// - `FAULT_DELAY_SECS` (default: 30)
    /// - `FAULT_DURATION_SECS` (default: scenario-specific)
    /// - `FAULT_LEAK_PCT_PER_MIN` (default: 3.0)
    /// - `ALERT_STORE_CAPACITY` (default: 1000)
    /// - `RECOMMENDATION_STORE_CAPACITY` (default: 1000)
    /// - `APPROVAL_CAPACITY` (default: 1000)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let capacity = |key: &str| {
            lookup(key)
                .and_then(|s| s.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
        };

        let fault_scenario = lookup("FAULT_SCENARIO")
            .filter(|s| !s.trim().is_empty())
            .and_then(|name| match Scenario::from_name(name.trim()) {
                Some(Scenario::PressureLeak { .. }) => Some(Scenario::PressureLeak {
                    leak_pct_per_min: lookup("FAULT_LEAK_PCT_PER_MIN")
                        .and_then(|s| s.trim().parse::<f64>().ok())
                        .filter(|rate| *rate > 0.0)
                        .unwrap_or(DEFAULT_LEAK_PCT_PER_MIN),
                }),
                Some(scenario) => Some(scenario),
                None => {
                    log::warn!("⚠️  Unknown FAULT_SCENARIO '{}' ignored", name);
                    None
                }
            });

        Self {
            audit_log_path: lookup("HELIOS_AUDIT_LOG_PATH")
                .unwrap_or_else(|| "audit_log.jsonl".to_string()),

            telemetry_interval_ms: parsed("TELEMETRY_INTERVAL_MS").unwrap_or(1_000),

            safety_interval_ms: parsed("SAFETY_CHECK_INTERVAL_MS").unwrap_or(5_000),

            anomaly_interval_ms: parsed("ANOMALY_CHECK_INTERVAL_MS").unwrap_or(10_000),

            decision_interval_ms: parsed("DECISION_INTERVAL_MS").unwrap_or(30_000),

            enabled: lookup("ENABLE_PIPELINE")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(true),

            fault_scenario,

            fault_delay_secs: parsed("FAULT_DELAY_SECS").unwrap_or(30),

            fault_duration_secs: parsed("FAULT_DURATION_SECS"),

            alert_store_capacity: capacity("ALERT_STORE_CAPACITY").unwrap_or(DEFAULT_STORE_CAPACITY),

            recommendation_store_capacity: capacity("RECOMMENDATION_STORE_CAPACITY")
                .unwrap_or(DEFAULT_STORE_CAPACITY),

            approval_capacity: capacity("APPROVAL_CAPACITY").unwrap_or(DEFAULT_APPROVAL_CAPACITY),
        }
    }

    /// Duration of the configured fault scenario
    pub fn fault_duration(&self) -> Option<Duration> {
        let scenario = self.fault_scenario?;
        Some(
            self.fault_duration_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| scenario.default_duration()),
        )
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> PipelineConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PipelineConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();

        assert_eq!(config.audit_log_path, "audit_log.jsonl");
        assert_eq!(config.telemetry_interval_ms, 1_000);
        assert_eq!(config.safety_interval_ms, 5_000);
        assert_eq!(config.anomaly_interval_ms, 10_000);
        assert_eq!(config.decision_interval_ms, 30_000);
        assert!(config.enabled);
        assert_eq!(config.fault_scenario, None);
        assert_eq!(config.fault_delay_secs, 30);
        assert_eq!(config.fault_duration(), None);
        assert_eq!(config.alert_store_capacity, 1_000);
        assert_eq!(config.recommendation_store_capacity, 1_000);
        assert_eq!(config.approval_capacity, 1_000);
    }

    #[test]
    fn test_store_capacities() {
        let config = config_from(&[
            ("ALERT_STORE_CAPACITY", "50"),
            ("RECOMMENDATION_STORE_CAPACITY", "0"),
            ("APPROVAL_CAPACITY", "lots"),
        ]);

        assert_eq!(config.alert_store_capacity, 50);
        // zero would make the store useless
        assert_eq!(config.recommendation_store_capacity, 1_000);
        assert_eq!(config.approval_capacity, 1_000);
    }

    #[test]
    fn test_custom_config() {
        let config = config_from(&[
            ("HELIOS_AUDIT_LOG_PATH", "/tmp/audit.jsonl"),
            ("SAFETY_CHECK_INTERVAL_MS", "250"),
            ("ENABLE_PIPELINE", "false"),
            ("FAULT_SCENARIO", "radiation_storm"),
            ("FAULT_DURATION_SECS", "90"),
        ]);

        assert_eq!(config.audit_log_path, "/tmp/audit.jsonl");
        assert_eq!(config.safety_interval_ms, 250);
        assert!(!config.enabled);
        assert_eq!(config.fault_scenario, Some(Scenario::RadiationStorm));
        assert_eq!(config.fault_duration(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("TELEMETRY_INTERVAL_MS", "fast"),
            ("DECISION_INTERVAL_MS", "-5"),
            ("ENABLE_PIPELINE", "maybe"),
            ("FAULT_SCENARIO", "meteor_shower"),
        ]);

        assert_eq!(config.telemetry_interval_ms, 1_000);
        assert_eq!(config.decision_interval_ms, 30_000);
        assert!(config.enabled);
        assert_eq!(config.fault_scenario, None);
    }

    #[test]
    fn test_leak_scenario_uses_default_duration_and_rate() {
        let config = config_from(&[("FAULT_SCENARIO", "pressure_leak")]);
        assert_eq!(
            config.fault_scenario,
            Some(Scenario::PressureLeak {
                leak_pct_per_min: DEFAULT_LEAK_PCT_PER_MIN
            })
        );
        assert_eq!(config.fault_duration(), Some(Duration::from_secs(180)));

        let config = config_from(&[
            ("FAULT_SCENARIO", "pressure_leak"),
            ("FAULT_LEAK_PCT_PER_MIN", "5.5"),
        ]);
        assert_eq!(
            config.fault_scenario,
            Some(Scenario::PressureLeak {
                leak_pct_per_min: 5.5
            })
        );
    }
}
