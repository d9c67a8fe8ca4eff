//! Rule-based recommendation engine for life support and energy dispatch
//!
//! Each monitored dimension owns an ordered list of band rules; the first band
//! the current value falls into produces that dimension's recommendation, so a
//! dimension yields at most one recommendation per cycle.
//!
//! Priority scoring:
//! ```text
//! base = 5 (+3 if |dev| > 20, +2 if > 10, +1 if > 5)
//! score = trunc(base * impact_factor) (+2 if critical)
//! priority = clamp(score, 1, 10)
//! ```

use super::types::{Action, Impact, Recommendation, RecommendationCategory, SettlementState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Score a recommendation on the 1-10 scale
///
/// `deviation` is in the dimension's native units; it is never normalized.
pub fn calculate_priority(deviation: f64, impact: Impact, is_critical: bool) -> u8 {
    let deviation = deviation.abs();
    let mut base = 5.0;
    if deviation > 20.0 {
        base += 3.0;
    } else if deviation > 10.0 {
        base += 2.0;
    } else if deviation > 5.0 {
        base += 1.0;
    }

    let mut score = (base * impact.factor()).trunc() as i64;
    if is_critical {
        score += 2;
    }

    score.clamp(1, 10) as u8
}

/// Static decision thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionThresholds {
    pub o2_min: f64,
    pub o2_optimal_min: f64,
    pub o2_optimal_max: f64,
    pub co2_max: f64,
    pub co2_warning: f64,
    pub pressure_min: f64,
    pub pressure_optimal_min: f64,
    pub pressure_optimal_max: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity_min: f64,
    pub humidity_max: f64,
    pub crop_health_min: f64,
    pub crop_health_optimal: f64,
    pub battery_min: f64,
    pub battery_warning: f64,
    pub battery_optimal_min: f64,
    pub battery_optimal_max: f64,
    pub solar_min: f64,
    pub load_max: f64,
    pub load_optimal_max: f64,
    /// Minimum battery reserve as a fraction of capacity
    pub energy_reserve_min: f64,
    /// Total battery capacity (kWh)
    pub battery_capacity_kwh: f64,
    /// Battery percentage below which surplus power is sent to charging
    pub surplus_charge_target_pct: f64,
}

impl Default for DecisionThresholds {
    fn default() -> Self {
        Self {
            o2_min: 20.0,
            o2_optimal_min: 20.5,
            o2_optimal_max: 21.5,
            co2_max: 500.0,
            co2_warning: 450.0,
            pressure_min: 95.0,
            pressure_optimal_min: 98.0,
            pressure_optimal_max: 103.0,
            temp_min: 18.0,
            temp_max: 22.0,
            humidity_min: 40.0,
            humidity_max: 60.0,
            crop_health_min: 75.0,
            crop_health_optimal: 85.0,
            battery_min: 30.0,
            battery_warning: 50.0,
            battery_optimal_min: 60.0,
            battery_optimal_max: 90.0,
            solar_min: 500.0,
            load_max: 900.0,
            load_optimal_max: 850.0,
            energy_reserve_min: 0.2,
            battery_capacity_kwh: 500.0,
            surplus_charge_target_pct: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Below(f64),
    Above(f64),
}

impl Bound {
    /// Deviation past the bound, if the value breaches it
    fn breach(&self, value: f64) -> Option<(f64, f64)> {
        match *self {
            Bound::Below(threshold) if value < threshold => Some((threshold, threshold - value)),
            Bound::Above(threshold) if value > threshold => Some((threshold, value - threshold)),
            _ => None,
        }
    }
}

/// Reasoning text from (value, threshold, deviation)
type Reasoning = fn(f64, f64, f64) -> String;

struct BandRule {
    bound: Bound,
    action: Action,
    impact: Impact,
    critical: bool,
    title: &'static str,
    description: &'static str,
    reasoning: Reasoning,
    estimated_effect: &'static str,
    confidence: f64,
}

struct Dimension {
    category: RecommendationCategory,
    read: fn(&SettlementState) -> f64,
    bands: Vec<BandRule>,
}

impl Dimension {
    fn evaluate(&self, state: &SettlementState, now: DateTime<Utc>) -> Option<Recommendation> {
        let value = (self.read)(state);

        self.bands.iter().find_map(|band| {
            let (threshold, deviation) = band.bound.breach(value)?;
            Some(Recommendation {
                id: Uuid::new_v4(),
                timestamp: now,
                priority: calculate_priority(deviation, band.impact, band.critical),
                category: self.category,
                action: band.action,
                title: band.title.to_string(),
                description: band.description.to_string(),
                reasoning: (band.reasoning)(value, threshold, deviation),
                current_value: value,
                threshold_value: threshold,
                impact: band.impact,
                estimated_effect: band.estimated_effect.to_string(),
                confidence: band.confidence,
                requires_approval: false,
            })
        })
    }
}

fn life_support_dimensions(t: &DecisionThresholds) -> Vec<Dimension> {
    use RecommendationCategory::LifeSupport;

    vec![
        Dimension {
            category: LifeSupport,
            read: |s| s.o2_pct,
            bands: vec![
                BandRule {
                    bound: Bound::Below(t.o2_min),
                    action: Action::IncreaseO2Generation,
                    impact: Impact::Critical,
                    critical: true,
                    title: "Critical: Increase Oxygen Generation",
                    description: "Oxygen level is below minimum safe threshold. Immediate action required.",
                    reasoning: |v, th, d| format!(
                        "Current O2: {:.2}% is below critical threshold of {}% (deviation: -{:.2}%). \
                         Life support systems must increase O2 generation immediately to prevent hypoxia risk.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore O2 to safe levels within 5-10 minutes",
                    confidence: 0.95,
                },
                BandRule {
                    bound: Bound::Below(t.o2_optimal_min),
                    action: Action::IncreaseO2Generation,
                    impact: Impact::High,
                    critical: false,
                    title: "Increase Oxygen Generation",
                    description: "Oxygen level is below optimal range.",
                    reasoning: |v, th, d| format!(
                        "Current O2: {:.2}% is below optimal minimum of {}% (deviation: -{:.2}%). \
                         Increasing O2 generation will restore optimal conditions.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore O2 to optimal range within 10-15 minutes",
                    confidence: 0.85,
                },
                BandRule {
                    bound: Bound::Above(t.o2_optimal_max),
                    action: Action::ReduceO2Generation,
                    impact: Impact::Medium,
                    critical: false,
                    title: "Reduce Oxygen Generation",
                    description: "Oxygen level is above optimal range.",
                    reasoning: |v, th, d| format!(
                        "Current O2: {:.2}% exceeds optimal maximum of {}% (deviation: +{:.2}%). \
                         Reducing O2 generation will optimize resource usage.",
                        v, th, d
                    ),
                    estimated_effect: "Will reduce O2 to optimal range and save energy",
                    confidence: 0.80,
                },
            ],
        },
        Dimension {
            category: LifeSupport,
            read: |s| s.co2_ppm,
            bands: vec![
                BandRule {
                    bound: Bound::Above(t.co2_max),
                    action: Action::IncreaseCo2Scrubbing,
                    impact: Impact::Critical,
                    critical: true,
                    title: "Critical: Increase CO2 Scrubbing",
                    description: "CO2 level exceeds maximum safe threshold.",
                    reasoning: |v, th, d| format!(
                        "Current CO2: {:.1} ppm exceeds critical threshold of {} ppm (deviation: +{:.1} ppm). \
                         CO2 scrubbing systems must be increased immediately to prevent health risks.",
                        v, th, d
                    ),
                    estimated_effect: "Will reduce CO2 to safe levels within 5-10 minutes",
                    confidence: 0.95,
                },
                BandRule {
                    bound: Bound::Above(t.co2_warning),
                    action: Action::IncreaseCo2Scrubbing,
                    impact: Impact::High,
                    critical: false,
                    title: "Increase CO2 Scrubbing",
                    description: "CO2 level is approaching maximum safe threshold.",
                    reasoning: |v, th, d| format!(
                        "Current CO2: {:.1} ppm is above warning level of {} ppm (deviation: +{:.1} ppm). \
                         Increasing scrubbing will prevent reaching critical levels.",
                        v, th, d
                    ),
                    estimated_effect: "Will reduce CO2 to safe range within 10-15 minutes",
                    confidence: 0.85,
                },
            ],
        },
        Dimension {
            category: LifeSupport,
            read: |s| s.pressure_kpa,
            bands: vec![
                BandRule {
                    bound: Bound::Below(t.pressure_min),
                    action: Action::IncreasePressure,
                    impact: Impact::Critical,
                    critical: true,
                    title: "Critical: Increase Atmospheric Pressure",
                    description: "Pressure is below minimum safe threshold.",
                    reasoning: |v, th, d| format!(
                        "Current pressure: {:.2} kPa is below critical threshold of {} kPa (deviation: -{:.2} kPa). \
                         Pressure systems must be activated immediately.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore pressure to safe levels within 3-5 minutes",
                    confidence: 0.95,
                },
                BandRule {
                    bound: Bound::Below(t.pressure_optimal_min),
                    action: Action::IncreasePressure,
                    impact: Impact::High,
                    critical: false,
                    title: "Increase Atmospheric Pressure",
                    description: "Pressure is below optimal range.",
                    reasoning: |v, th, d| format!(
                        "Current pressure: {:.2} kPa is below optimal minimum of {} kPa (deviation: -{:.2} kPa). \
                         Adjusting pressure will restore comfort.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore pressure to optimal range within 5-10 minutes",
                    confidence: 0.85,
                },
                BandRule {
                    bound: Bound::Above(t.pressure_optimal_max),
                    action: Action::ReducePressure,
                    impact: Impact::Medium,
                    critical: false,
                    title: "Reduce Atmospheric Pressure",
                    description: "Pressure is above optimal range.",
                    reasoning: |v, th, d| format!(
                        "Current pressure: {:.2} kPa exceeds optimal maximum of {} kPa (deviation: +{:.2} kPa). \
                         Reducing pressure will optimize conditions.",
                        v, th, d
                    ),
                    estimated_effect: "Will reduce pressure to optimal range",
                    confidence: 0.80,
                },
            ],
        },
        Dimension {
            category: LifeSupport,
            read: |s| s.temp_c,
            bands: vec![
                BandRule {
                    bound: Bound::Below(t.temp_min),
                    action: Action::IncreaseTemperature,
                    impact: Impact::High,
                    critical: false,
                    title: "Increase Temperature",
                    description: "Temperature is below comfortable range.",
                    reasoning: |v, th, d| format!(
                        "Current temperature: {:.2}°C is below minimum comfortable level of {}°C (deviation: -{:.2}°C). \
                         Heating systems should be activated.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore temperature to comfortable range within 10-15 minutes",
                    confidence: 0.85,
                },
                BandRule {
                    bound: Bound::Above(t.temp_max),
                    action: Action::DecreaseTemperature,
                    impact: Impact::High,
                    critical: false,
                    title: "Decrease Temperature",
                    description: "Temperature is above comfortable range.",
                    reasoning: |v, th, d| format!(
                        "Current temperature: {:.2}°C exceeds maximum comfortable level of {}°C (deviation: +{:.2}°C). \
                         Cooling systems should be activated.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore temperature to comfortable range within 10-15 minutes",
                    confidence: 0.85,
                },
            ],
        },
        Dimension {
            category: LifeSupport,
            read: |s| s.humidity_pct,
            bands: vec![
                BandRule {
                    bound: Bound::Below(t.humidity_min),
                    action: Action::IncreaseHumidity,
                    impact: Impact::Medium,
                    critical: false,
                    title: "Increase Humidity",
                    description: "Humidity is below comfortable range.",
                    reasoning: |v, th, d| format!(
                        "Current humidity: {:.2}% is below minimum comfortable level of {}% (deviation: -{:.2}%). \
                         Humidification systems should be activated.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore humidity to comfortable range within 15-20 minutes",
                    confidence: 0.80,
                },
                BandRule {
                    bound: Bound::Above(t.humidity_max),
                    action: Action::DecreaseHumidity,
                    impact: Impact::Medium,
                    critical: false,
                    title: "Decrease Humidity",
                    description: "Humidity is above comfortable range.",
                    reasoning: |v, th, d| format!(
                        "Current humidity: {:.2}% exceeds maximum comfortable level of {}% (deviation: +{:.2}%). \
                         Dehumidification systems should be activated.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore humidity to comfortable range within 15-20 minutes",
                    confidence: 0.80,
                },
            ],
        },
        Dimension {
            category: LifeSupport,
            read: |s| s.crop_health_index,
            bands: vec![
                BandRule {
                    bound: Bound::Below(t.crop_health_min),
                    action: Action::ImproveCropHealth,
                    impact: Impact::High,
                    critical: false,
                    title: "Improve Crop Health",
                    description: "Crop health is below acceptable threshold.",
                    reasoning: |v, th, d| format!(
                        "Current crop health index: {:.2} is below minimum acceptable level of {} (deviation: -{:.2}). \
                         Review nutrient levels, lighting, and irrigation systems.",
                        v, th, d
                    ),
                    estimated_effect: "Will improve crop health over 24-48 hours with proper intervention",
                    confidence: 0.75,
                },
                BandRule {
                    bound: Bound::Below(t.crop_health_optimal),
                    action: Action::OptimizeCropHealth,
                    impact: Impact::Medium,
                    critical: false,
                    title: "Optimize Crop Health",
                    description: "Crop health is below optimal level.",
                    reasoning: |v, th, d| format!(
                        "Current crop health index: {:.2} is below optimal level of {} (deviation: -{:.2}). \
                         Optimizing nutrients and conditions will improve yield.",
                        v, th, d
                    ),
                    estimated_effect: "Will improve crop health to optimal levels over 48-72 hours",
                    confidence: 0.70,
                },
            ],
        },
    ]
}

fn energy_dimensions(t: &DecisionThresholds) -> Vec<Dimension> {
    use RecommendationCategory::EnergyDispatch;

    vec![
        Dimension {
            category: EnergyDispatch,
            read: |s| s.battery_kwh,
            bands: vec![
                BandRule {
                    bound: Bound::Below(t.battery_min),
                    action: Action::PrioritizeCharging,
                    impact: Impact::Critical,
                    critical: true,
                    title: "Critical: Prioritize Battery Charging",
                    description: "Battery storage is critically low.",
                    reasoning: |v, th, d| format!(
                        "Current battery: {:.2} kWh is below critical threshold of {} kWh (deviation: -{:.2} kWh). \
                         All available solar power should be directed to battery charging. \
                         Non-essential loads should be reduced.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore battery to safe levels within 30-60 minutes with full solar charging",
                    confidence: 0.90,
                },
                BandRule {
                    bound: Bound::Below(t.battery_warning),
                    action: Action::IncreaseCharging,
                    impact: Impact::High,
                    critical: false,
                    title: "Increase Battery Charging",
                    description: "Battery storage is below warning level.",
                    reasoning: |v, th, d| format!(
                        "Current battery: {:.2} kWh is below warning threshold of {} kWh (deviation: -{:.2} kWh). \
                         Increase solar power allocation to battery charging.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore battery to safe levels within 1-2 hours",
                    confidence: 0.85,
                },
                BandRule {
                    bound: Bound::Below(t.battery_optimal_min),
                    action: Action::OptimizeCharging,
                    impact: Impact::Medium,
                    critical: false,
                    title: "Optimize Battery Charging",
                    description: "Battery storage is below optimal level.",
                    reasoning: |v, th, d| format!(
                        "Current battery: {:.2} kWh is below optimal minimum of {} kWh (deviation: -{:.2} kWh). \
                         Allocate more solar power to charging to build reserves.",
                        v, th, d
                    ),
                    estimated_effect: "Will restore battery to optimal levels within 2-3 hours",
                    confidence: 0.80,
                },
                BandRule {
                    bound: Bound::Above(t.battery_optimal_max),
                    action: Action::IncreaseLoad,
                    impact: Impact::Low,
                    critical: false,
                    title: "Increase Power Load",
                    description: "Battery storage is above optimal level.",
                    reasoning: |v, th, d| format!(
                        "Current battery: {:.2} kWh exceeds optimal maximum of {} kWh (deviation: +{:.2} kWh). \
                         Battery is well-charged; can increase load or reduce charging.",
                        v, th, d
                    ),
                    estimated_effect: "Will optimize energy usage and prevent overcharging",
                    confidence: 0.75,
                },
            ],
        },
        Dimension {
            category: EnergyDispatch,
            read: |s| s.solar_kw,
            bands: vec![BandRule {
                bound: Bound::Below(t.solar_min),
                action: Action::ReduceNonEssentialLoad,
                impact: Impact::High,
                critical: false,
                title: "Reduce Non-Essential Load",
                description: "Solar generation is below minimum acceptable level.",
                reasoning: |v, th, d| format!(
                    "Current solar generation: {:.2} kW is below minimum threshold of {} kW (deviation: -{:.2} kW). \
                     This may indicate eclipse period or panel issues. Reduce non-essential loads to preserve battery.",
                    v, th, d
                ),
                estimated_effect: "Will preserve battery reserves during low generation period",
                confidence: 0.85,
            }],
        },
        Dimension {
            category: EnergyDispatch,
            read: |s| s.load_kw,
            bands: vec![
                BandRule {
                    bound: Bound::Above(t.load_max),
                    action: Action::ReduceLoad,
                    impact: Impact::Critical,
                    critical: true,
                    title: "Critical: Reduce Power Load",
                    description: "Power load exceeds maximum safe threshold.",
                    reasoning: |v, th, d| format!(
                        "Current load: {:.2} kW exceeds maximum safe threshold of {} kW (deviation: +{:.2} kW). \
                         Immediate load reduction required to prevent system overload.",
                        v, th, d
                    ),
                    estimated_effect: "Will prevent system overload and maintain stability",
                    confidence: 0.95,
                },
                BandRule {
                    bound: Bound::Above(t.load_optimal_max),
                    action: Action::OptimizeLoad,
                    impact: Impact::High,
                    critical: false,
                    title: "Optimize Power Load",
                    description: "Power load is above optimal maximum.",
                    reasoning: |v, th, d| format!(
                        "Current load: {:.2} kW exceeds optimal maximum of {} kW (deviation: +{:.2} kW). \
                         Optimize load distribution to improve efficiency.",
                        v, th, d
                    ),
                    estimated_effect: "Will improve energy efficiency and reduce strain on systems",
                    confidence: 0.85,
                },
            ],
        },
    ]
}

/// Aggregate view of one decision cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSummary {
    pub total_recommendations: usize,
    pub life_support_count: usize,
    pub energy_dispatch_count: usize,
    pub highest_priority: Option<u8>,
    /// Recommendations with critical impact
    pub critical_count: usize,
    /// Highest-ranked recommendations (at most five)
    pub top_recommendations: Vec<Recommendation>,
}

pub const TOP_RECOMMENDATIONS: usize = 5;

pub struct DecisionEngine {
    thresholds: DecisionThresholds,
    life_support: Vec<Dimension>,
    energy: Vec<Dimension>,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::with_thresholds(DecisionThresholds::default())
    }

    pub fn with_thresholds(thresholds: DecisionThresholds) -> Self {
        Self {
            life_support: life_support_dimensions(&thresholds),
            energy: energy_dimensions(&thresholds),
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &DecisionThresholds {
        &self.thresholds
    }

    pub fn generate_recommendations(&self, state: &SettlementState) -> Vec<Recommendation> {
        self.generate_recommendations_at(state, Utc::now())
    }

    /// Ranked recommendations, highest priority first
    ///
    /// The sort is stable, so equal priorities keep evaluation order: life
    /// support (O2, CO2, pressure, temperature, humidity, crop health) before
    /// energy (battery, solar, load, energy balance).
    pub fn generate_recommendations_at(
        &self,
        state: &SettlementState,
        now: DateTime<Utc>,
    ) -> Vec<Recommendation> {
        let mut recommendations: Vec<Recommendation> = self
            .life_support
            .iter()
            .chain(self.energy.iter())
            .filter_map(|dimension| dimension.evaluate(state, now))
            .collect();

        if let Some(balance) = self.energy_balance(state, now) {
            recommendations.push(balance);
        }

        recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));

        log::debug!(
            "📋 Decision cycle: {} recommendations (top priority {:?})",
            recommendations.len(),
            recommendations.first().map(|r| r.priority)
        );

        recommendations
    }

    /// Ranked recommendations restricted to a category and minimum priority
    pub fn generate_filtered(
        &self,
        state: &SettlementState,
        category: Option<RecommendationCategory>,
        min_priority: u8,
    ) -> Vec<Recommendation> {
        self.generate_recommendations(state)
            .into_iter()
            .filter(|r| category.map_or(true, |c| r.category == c))
            .filter(|r| r.priority >= min_priority)
            .collect()
    }

    pub fn analyze(&self, state: &SettlementState) -> DecisionSummary {
        summarize(self.generate_recommendations(state))
    }

    fn energy_balance(&self, state: &SettlementState, now: DateTime<Utc>) -> Option<Recommendation> {
        let t = &self.thresholds;
        let solar = state.solar_kw;
        let load = state.load_kw;
        let battery_pct = state.battery_kwh / t.battery_capacity_kwh * 100.0;
        let reserve_ratio = battery_pct / 100.0;
        let net_power = solar - load;

        let (action, impact, critical, title, description, reasoning, current, threshold, effect, confidence) =
            if net_power < 0.0 && reserve_ratio < t.energy_reserve_min {
                (
                    Action::EmergencyLoadShedding,
                    Impact::Critical,
                    true,
                    "Critical: Emergency Load Shedding Required",
                    "Energy deficit with insufficient reserves.",
                    format!(
                        "Energy deficit: {:.2} kW (solar {:.2} kW < load {:.2} kW) with battery reserves at \
                         {:.1}% (below {:.0}% minimum). Emergency load shedding required to prevent blackout.",
                        net_power.abs(),
                        solar,
                        load,
                        battery_pct,
                        t.energy_reserve_min * 100.0
                    ),
                    reserve_ratio,
                    t.energy_reserve_min,
                    "Will prevent blackout by reducing load to match generation",
                    0.95,
                )
            } else if net_power < 0.0 {
                (
                    Action::ReduceLoadOrIncreaseGeneration,
                    Impact::High,
                    false,
                    "Reduce Load or Increase Generation",
                    "Energy deficit detected.",
                    format!(
                        "Energy deficit: {:.2} kW (solar {:.2} kW < load {:.2} kW). Battery is being drained. \
                         Reduce load or wait for increased solar generation.",
                        net_power.abs(),
                        solar,
                        load
                    ),
                    net_power,
                    0.0,
                    "Will balance energy supply and demand",
                    0.85,
                )
            } else if net_power > 0.0 && battery_pct < t.surplus_charge_target_pct {
                (
                    Action::ChargeBattery,
                    Impact::Medium,
                    false,
                    "Charge Battery with Surplus",
                    "Energy surplus available for battery charging.",
                    format!(
                        "Energy surplus: {:.2} kW (solar {:.2} kW > load {:.2} kW) with battery at {:.1}%. \
                         Direct surplus to battery charging to build reserves.",
                        net_power, solar, load, battery_pct
                    ),
                    battery_pct,
                    t.surplus_charge_target_pct,
                    "Will increase battery reserves for future use",
                    0.80,
                )
            } else {
                return None;
            };

        Some(Recommendation {
            id: Uuid::new_v4(),
            timestamp: now,
            priority: calculate_priority(net_power.abs(), impact, critical),
            category: RecommendationCategory::EnergyDispatch,
            action,
            title: title.to_string(),
            description: description.to_string(),
            reasoning,
            current_value: current,
            threshold_value: threshold,
            impact,
            estimated_effect: effect.to_string(),
            confidence,
            requires_approval: false,
        })
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Summarize an already-ranked recommendation list
pub fn summarize(recommendations: Vec<Recommendation>) -> DecisionSummary {
    let count_of = |category| {
        recommendations
            .iter()
            .filter(|r| r.category == category)
            .count()
    };

    DecisionSummary {
        total_recommendations: recommendations.len(),
        life_support_count: count_of(RecommendationCategory::LifeSupport),
        energy_dispatch_count: count_of(RecommendationCategory::EnergyDispatch),
        highest_priority: recommendations.first().map(|r| r.priority),
        critical_count: recommendations
            .iter()
            .filter(|r| r.impact == Impact::Critical)
            .count(),
        top_recommendations: recommendations.iter().take(TOP_RECOMMENDATIONS).cloned().collect(),
    }
}
