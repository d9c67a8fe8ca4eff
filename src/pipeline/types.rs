//! Core data types shared by every pipeline component
//!
//! - `SettlementState` - immutable telemetry snapshot consumed once per cycle
//! - `Alert` / `AnomalyAlert` - detection outputs
//! - `Recommendation` - ranked, explainable operator guidance
//! - `PendingApproval` - human sign-off record for critical recommendations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unified numeric snapshot of habitat conditions
///
/// Defaults are the nominal operating point of the habitat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettlementState {
    /// Oxygen percentage
    pub o2_pct: f64,
    /// CO2 in parts per million
    pub co2_ppm: f64,
    /// Atmospheric pressure (kPa)
    pub pressure_kpa: f64,
    /// Temperature (°C)
    pub temp_c: f64,
    /// Relative humidity percentage
    pub humidity_pct: f64,
    /// Solar generation (kW)
    pub solar_kw: f64,
    /// Battery energy storage (kWh)
    pub battery_kwh: f64,
    /// Power load (kW)
    pub load_kw: f64,
    /// Crop health index (0-100)
    pub crop_health_index: f64,
    /// Radiation (mSv/hr)
    pub radiation_msv_hr: f64,
    /// Structural strain index (0-1)
    pub strain_index: f64,
}

impl Default for SettlementState {
    fn default() -> Self {
        Self {
            o2_pct: 21.0,
            co2_ppm: 400.0,
            pressure_kpa: 101.325,
            temp_c: 20.0,
            humidity_pct: 50.0,
            solar_kw: 1000.0,
            battery_kwh: 500.0,
            load_kw: 800.0,
            crop_health_index: 85.0,
            radiation_msv_hr: 0.02,
            strain_index: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub category: String,
    pub message: String,
    pub system: String,
    pub resolved: bool,
}

impl Alert {
    pub fn new(
        severity: AlertSeverity,
        category: impl Into<String>,
        message: impl Into<String>,
        system: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            severity,
            category: category.into(),
            message: message.into(),
            system: system.into(),
            resolved: false,
        }
    }
}

/// Direction of a statistical anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyType {
    High,
    Low,
    Spike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    Critical,
    Significant,
}

/// Evidence bundle attached to every anomaly alert
///
/// Values are rounded to the metric's precision (pressure 4, radiation 6,
/// battery 2 decimals) so a recorded alert can be reproduced exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvidence {
    pub current_value: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub ewma: f64,
    pub z_score: f64,
    pub z_score_threshold: f64,
    pub z_score_critical: f64,
    pub deviation_from_mean: f64,
    pub deviation_percent: f64,
    pub sample_count: u64,
    pub min_value: f64,
    pub max_value: f64,
    pub anomaly_type: AnomalyType,
    pub significance: Significance,
    pub precision: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ewma_deviation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub alert: Alert,
    pub metric: super::stats::MetricKind,
    pub current_value: f64,
    pub z_score: f64,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub evidence: AnomalyEvidence,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    LifeSupport,
    EnergyDispatch,
    Pressure,
    Radiation,
}

impl RecommendationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationCategory::LifeSupport => "life_support",
            RecommendationCategory::EnergyDispatch => "energy_dispatch",
            RecommendationCategory::Pressure => "pressure",
            RecommendationCategory::Radiation => "radiation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    High,
    Medium,
    Low,
}

impl Impact {
    /// Multiplier applied to the base priority score
    pub fn factor(&self) -> f64 {
        match self {
            Impact::Critical => 2.0,
            Impact::High => 1.5,
            Impact::Medium => 1.0,
            Impact::Low => 0.5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Critical => "critical",
            Impact::High => "high",
            Impact::Medium => "medium",
            Impact::Low => "low",
        }
    }
}

/// Operator action a recommendation asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    IncreaseO2Generation,
    ReduceO2Generation,
    IncreaseCo2Scrubbing,
    IncreasePressure,
    ReducePressure,
    IncreaseTemperature,
    DecreaseTemperature,
    IncreaseHumidity,
    DecreaseHumidity,
    ImproveCropHealth,
    OptimizeCropHealth,
    PrioritizeCharging,
    IncreaseCharging,
    OptimizeCharging,
    IncreaseLoad,
    ReduceNonEssentialLoad,
    ReduceLoad,
    OptimizeLoad,
    EmergencyLoadShedding,
    ReduceLoadOrIncreaseGeneration,
    ChargeBattery,
    ImmediateEvacuation,
    IsolateCompartments,
    ActivateStormShelter,
    PrepareStormShelter,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::IncreaseO2Generation => "INCREASE_O2_GENERATION",
            Action::ReduceO2Generation => "REDUCE_O2_GENERATION",
            Action::IncreaseCo2Scrubbing => "INCREASE_CO2_SCRUBBING",
            Action::IncreasePressure => "INCREASE_PRESSURE",
            Action::ReducePressure => "REDUCE_PRESSURE",
            Action::IncreaseTemperature => "INCREASE_TEMPERATURE",
            Action::DecreaseTemperature => "DECREASE_TEMPERATURE",
            Action::IncreaseHumidity => "INCREASE_HUMIDITY",
            Action::DecreaseHumidity => "DECREASE_HUMIDITY",
            Action::ImproveCropHealth => "IMPROVE_CROP_HEALTH",
            Action::OptimizeCropHealth => "OPTIMIZE_CROP_HEALTH",
            Action::PrioritizeCharging => "PRIORITIZE_CHARGING",
            Action::IncreaseCharging => "INCREASE_CHARGING",
            Action::OptimizeCharging => "OPTIMIZE_CHARGING",
            Action::IncreaseLoad => "INCREASE_LOAD",
            Action::ReduceNonEssentialLoad => "REDUCE_NON_ESSENTIAL_LOAD",
            Action::ReduceLoad => "REDUCE_LOAD",
            Action::OptimizeLoad => "OPTIMIZE_LOAD",
            Action::EmergencyLoadShedding => "EMERGENCY_LOAD_SHEDDING",
            Action::ReduceLoadOrIncreaseGeneration => "REDUCE_LOAD_OR_INCREASE_GENERATION",
            Action::ChargeBattery => "CHARGE_BATTERY",
            Action::ImmediateEvacuation => "IMMEDIATE_EVACUATION",
            Action::IsolateCompartments => "ISOLATE_COMPARTMENTS",
            Action::ActivateStormShelter => "ACTIVATE_STORM_SHELTER",
            Action::PrepareStormShelter => "PREPARE_STORM_SHELTER",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranked, explainable recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Always in [1, 10]; higher is more urgent
    pub priority: u8,
    pub category: RecommendationCategory,
    pub action: Action,
    pub title: String,
    pub description: String,
    pub reasoning: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub impact: Impact,
    pub estimated_effect: String,
    pub confidence: f64,
    /// True when the action is gated on human approval
    pub requires_approval: bool,
}

/// Approval record for a critical recommendation
///
/// `approved` moves from false to true exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub recommendation_id: Uuid,
    pub action_id: Action,
    pub category: RecommendationCategory,
    pub title: String,
    pub description: String,
    pub requested_at: DateTime<Utc>,
    pub approved: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

/// Round `value` to `decimals` places
///
/// Used for evidence bundles and summaries.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_nominal() {
        let state = SettlementState::default();
        assert_eq!(state.pressure_kpa, 101.325);
        assert_eq!(state.radiation_msv_hr, 0.02);
        assert_eq!(state.battery_kwh, 500.0);
    }

    #[test]
    fn test_action_serializes_screaming_snake() {
        let json = serde_json::to_string(&Action::IncreaseO2Generation).unwrap();
        assert_eq!(json, "\"INCREASE_O2_GENERATION\"");
        assert_eq!(Action::IncreaseCo2Scrubbing.as_str(), "INCREASE_CO2_SCRUBBING");

        let json = serde_json::to_string(&Action::ReduceLoadOrIncreaseGeneration).unwrap();
        assert_eq!(json, format!("\"{}\"", Action::ReduceLoadOrIncreaseGeneration.as_str()));
    }

    #[test]
    fn test_severity_and_impact_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&AlertSeverity::Critical).unwrap(), "\"critical\"");
        assert_eq!(serde_json::to_string(&Impact::Medium).unwrap(), "\"medium\"");
        assert_eq!(
            serde_json::to_string(&RecommendationCategory::EnergyDispatch).unwrap(),
            "\"energy_dispatch\""
        );
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(0.1234567, 6), 0.123457);
        assert_eq!(round_to(-2.5, 0), -3.0);
    }
}
