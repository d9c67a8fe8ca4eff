//! Threshold, rate and spike based safety monitoring
//!
//! Four independent Idle ↔ Active hazards:
//! - **PRESSURE_CRITICAL**: pressure < 90.0 kPa
//! - **PRESSURE_LEAK**: oldest/newest rate over the last 5 minutes < -2.0 %/min
//! - **RADIATION_CRITICAL**: radiation >= 0.5 mSv/hr
//! - **RADIATION_SPIKE**: radiation > baseline + 0.1 mSv/hr, only while
//!   RADIATION_CRITICAL is idle
//!
//! Each Idle→Active transition emits exactly one alert and one recommendation
//! that is registered with the approval gate. A hazard clears on the first
//! reading that no longer satisfies its condition.
//!
//! Boundary values are not debounced: a reading sitting exactly on a
//! threshold can toggle the hazard on consecutive cycles.

use super::approval::ApprovalGate;
use super::types::{
    Action, Alert, AlertSeverity, Impact, Recommendation, RecommendationCategory, SettlementState,
};
use super::windows::{BaselineTracker, RateWindow, RollingWindow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Safety thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyThresholds {
    /// Leak threshold (% per minute, compared as a negative rate)
    pub pressure_leak_pct_per_min: f64,
    /// Critical low pressure (kPa)
    pub pressure_critical_kpa: f64,
    /// Spike margin above baseline (mSv/hr)
    pub radiation_spike_msv_hr: f64,
    /// Critical radiation level (mSv/hr)
    pub radiation_critical_msv_hr: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            pressure_leak_pct_per_min: 2.0,
            pressure_critical_kpa: 90.0,
            radiation_spike_msv_hr: 0.1,
            radiation_critical_msv_hr: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HazardKind {
    PressureLeak,
    PressureCritical,
    RadiationCritical,
    RadiationSpike,
}

impl HazardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardKind::PressureLeak => "PRESSURE_LEAK",
            HazardKind::PressureCritical => "PRESSURE_CRITICAL",
            HazardKind::RadiationCritical => "RADIATION_CRITICAL",
            HazardKind::RadiationSpike => "RADIATION_SPIKE",
        }
    }

    pub fn all() -> [HazardKind; 4] {
        [
            HazardKind::PressureLeak,
            HazardKind::PressureCritical,
            HazardKind::RadiationCritical,
            HazardKind::RadiationSpike,
        ]
    }

    fn severity(&self) -> AlertSeverity {
        match self {
            HazardKind::RadiationSpike => AlertSeverity::Warning,
            _ => AlertSeverity::Critical,
        }
    }

    fn category(&self) -> RecommendationCategory {
        match self {
            HazardKind::PressureLeak | HazardKind::PressureCritical => {
                RecommendationCategory::Pressure
            }
            HazardKind::RadiationCritical | HazardKind::RadiationSpike => {
                RecommendationCategory::Radiation
            }
        }
    }

    fn system(&self) -> &'static str {
        match self.category() {
            RecommendationCategory::Pressure => "atmosphere",
            _ => "radiation",
        }
    }

    fn action(&self) -> Action {
        match self {
            HazardKind::PressureLeak => Action::IsolateCompartments,
            HazardKind::PressureCritical => Action::ImmediateEvacuation,
            HazardKind::RadiationCritical => Action::ActivateStormShelter,
            HazardKind::RadiationSpike => Action::PrepareStormShelter,
        }
    }

    /// Priority of the gated recommendation
    fn priority(&self) -> u8 {
        match self.severity() {
            AlertSeverity::Critical => 10,
            _ => 8,
        }
    }
}

impl std::fmt::Display for HazardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open hazard and the outputs it produced when it became active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveHazard {
    pub kind: HazardKind,
    pub alert: Alert,
    pub recommendation_id: Uuid,
    pub since: DateTime<Utc>,
}

/// Open hazard as seen through the approval gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardStatus {
    pub hazard: ActiveHazard,
    pub approved: bool,
}

/// Output of one safety evaluation
#[derive(Debug, Clone, Default)]
pub struct SafetyReport {
    /// Hazards that went Idle → Active, parallel to `alerts` and `recommendations`
    pub raised: Vec<HazardKind>,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
    /// Hazards that went Active → Idle on this reading
    pub cleared: Vec<HazardKind>,
}

/// Hazard details captured at activation time, used for alert text
struct Trigger {
    kind: HazardKind,
    message: String,
    title: &'static str,
    description: String,
    reasoning: String,
    current_value: f64,
    threshold_value: f64,
}

pub struct SafetyMonitor {
    thresholds: SafetyThresholds,
    pressure_window: RateWindow,
    radiation_baseline: BaselineTracker,
    active: BTreeMap<HazardKind, ActiveHazard>,
    approvals: Arc<ApprovalGate>,
    now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl SafetyMonitor {
    pub fn new(approvals: Arc<ApprovalGate>) -> Self {
        Self::with_thresholds(approvals, SafetyThresholds::default())
    }

    pub fn with_thresholds(approvals: Arc<ApprovalGate>, thresholds: SafetyThresholds) -> Self {
        Self {
            thresholds,
            pressure_window: RateWindow::five_minutes(),
            radiation_baseline: BaselineTracker::default(),
            active: BTreeMap::new(),
            approvals,
            now_fn: Box::new(Utc::now),
        }
    }

    /// Replace the clock (for deterministic timestamps in tests and replays)
    pub fn with_clock(mut self, now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.now_fn = now_fn;
        self
    }

    pub fn thresholds(&self) -> &SafetyThresholds {
        &self.thresholds
    }

    pub fn check_safety(&mut self, state: &SettlementState) -> SafetyReport {
        let now = (self.now_fn)();
        self.check_safety_at(state, now)
    }

    /// Evaluate one snapshot observed at `now`
    ///
    /// Hazards are evaluated in a fixed order: leak, critical pressure,
    /// critical radiation, radiation spike.
    pub fn check_safety_at(&mut self, state: &SettlementState, now: DateTime<Utc>) -> SafetyReport {
        let t = self.thresholds;
        let mut report = SafetyReport::default();

        self.pressure_window.push(now, state.pressure_kpa);
        self.radiation_baseline.push(now, state.radiation_msv_hr);

        // PRESSURE_LEAK: rate undefined counts as "not leaking"
        let rate = self.pressure_window.rate_per_minute();
        let span_minutes = self.pressure_window.span().num_minutes();
        let leaking = matches!(rate, Some(r) if r < -t.pressure_leak_pct_per_min);
        self.transition(&mut report, HazardKind::PressureLeak, leaking, now, || {
            let drop = rate.map(f64::abs).unwrap_or_default();
            Trigger {
                kind: HazardKind::PressureLeak,
                message: format!(
                    "PRESSURE LEAK DETECTED: Pressure dropping at {:.2}% per minute",
                    drop
                ),
                title: "Isolate Compartments",
                description: format!(
                    "Pressure leak detected (dropping at {:.2}% per minute). Recommend immediate \
                     compartment isolation to prevent further pressure loss.",
                    drop
                ),
                reasoning: format!(
                    "Pressure rate of change {:.2}%/min over the last {} minutes is below -{}%/min.",
                    rate.unwrap_or_default(),
                    span_minutes,
                    t.pressure_leak_pct_per_min
                ),
                current_value: rate.unwrap_or_default(),
                threshold_value: -t.pressure_leak_pct_per_min,
            }
        });

        // PRESSURE_CRITICAL
        let pressure = state.pressure_kpa;
        let pressure_low = pressure < t.pressure_critical_kpa;
        self.transition(&mut report, HazardKind::PressureCritical, pressure_low, now, || {
            Trigger {
                kind: HazardKind::PressureCritical,
                message: format!("CRITICAL: Pressure critically low at {:.2} kPa", pressure),
                title: "Immediate Evacuation Required",
                description: format!(
                    "Pressure has dropped to critical level ({:.2} kPa). Immediate evacuation \
                     to emergency shelters required.",
                    pressure
                ),
                reasoning: format!(
                    "Pressure {:.2} kPa is below the critical threshold of {} kPa.",
                    pressure, t.pressure_critical_kpa
                ),
                current_value: pressure,
                threshold_value: t.pressure_critical_kpa,
            }
        });

        // RADIATION_CRITICAL takes precedence over RADIATION_SPIKE
        let radiation = state.radiation_msv_hr;
        let radiation_critical = radiation >= t.radiation_critical_msv_hr;
        self.transition(
            &mut report,
            HazardKind::RadiationCritical,
            radiation_critical,
            now,
            || Trigger {
                kind: HazardKind::RadiationCritical,
                message: format!(
                    "CRITICAL: Radiation level at {:.4} mSv/hr (threshold: {} mSv/hr)",
                    radiation, t.radiation_critical_msv_hr
                ),
                title: "Activate Storm Shelter Protocol",
                description: format!(
                    "Radiation level critical ({:.4} mSv/hr). All personnel must immediately \
                     proceed to storm shelters.",
                    radiation
                ),
                reasoning: format!(
                    "Radiation {:.4} mSv/hr is at or above the critical level of {} mSv/hr.",
                    radiation, t.radiation_critical_msv_hr
                ),
                current_value: radiation,
                threshold_value: t.radiation_critical_msv_hr,
            },
        );

        let baseline = self.radiation_baseline.baseline().unwrap_or_default();
        let spiking = !radiation_critical
            && self
                .radiation_baseline
                .is_spike(radiation, t.radiation_spike_msv_hr);
        self.transition(&mut report, HazardKind::RadiationSpike, spiking, now, || {
            Trigger {
                kind: HazardKind::RadiationSpike,
                message: format!(
                    "Radiation spike detected: {:.4} mSv/hr (baseline: {:.4} mSv/hr)",
                    radiation, baseline
                ),
                title: "Prepare Storm Shelter",
                description: format!(
                    "Radiation spike detected ({:.4} mSv/hr). Prepare to move to storm shelters \
                     if levels continue to rise.",
                    radiation
                ),
                reasoning: format!(
                    "Radiation {:.4} mSv/hr exceeds the recent baseline {:.4} mSv/hr by more \
                     than {} mSv/hr.",
                    radiation, baseline, t.radiation_spike_msv_hr
                ),
                current_value: radiation,
                threshold_value: baseline + t.radiation_spike_msv_hr,
            }
        });

        report
    }

    /// Drive one hazard's state machine
    fn transition<F>(
        &mut self,
        report: &mut SafetyReport,
        kind: HazardKind,
        condition: bool,
        now: DateTime<Utc>,
        trigger: F,
    ) where
        F: FnOnce() -> Trigger,
    {
        let is_active = self.active.contains_key(&kind);

        match (is_active, condition) {
            (false, true) => {
                let trigger = trigger();
                let (alert, recommendation) = self.raise(trigger, now);
                log::warn!("🚨 Hazard {} active: {}", kind, alert.message);

                self.active.insert(
                    kind,
                    ActiveHazard {
                        kind,
                        alert: alert.clone(),
                        recommendation_id: recommendation.id,
                        since: now,
                    },
                );
                report.raised.push(kind);
                report.alerts.push(alert);
                report.recommendations.push(recommendation);
            }
            (true, false) => {
                self.active.remove(&kind);
                log::info!("✅ Hazard {} cleared", kind);
                report.cleared.push(kind);
            }
            _ => {}
        }
    }

    fn raise(&self, trigger: Trigger, now: DateTime<Utc>) -> (Alert, Recommendation) {
        let kind = trigger.kind;
        let category = kind.category();

        let alert = Alert::new(
            kind.severity(),
            category.as_str(),
            trigger.message,
            kind.system(),
            now,
        );

        let recommendation = Recommendation {
            id: Uuid::new_v4(),
            timestamp: now,
            priority: kind.priority(),
            category,
            action: kind.action(),
            title: trigger.title.to_string(),
            description: trigger.description,
            reasoning: trigger.reasoning,
            current_value: trigger.current_value,
            threshold_value: trigger.threshold_value,
            impact: match kind.severity() {
                AlertSeverity::Critical => Impact::Critical,
                _ => Impact::High,
            },
            estimated_effect: "Requires operator approval before execution".to_string(),
            confidence: 0.95,
            requires_approval: true,
        };

        self.approvals.register(&recommendation);
        (alert, recommendation)
    }

    /// Put an active hazard back to Idle and withdraw its unapproved request
    ///
    /// Used when the outputs of an activation could not be delivered, so the
    /// next reading that still satisfies the condition raises it again.
    /// Returns false if the hazard was not active.
    pub fn rearm(&mut self, kind: HazardKind) -> bool {
        match self.active.remove(&kind) {
            Some(hazard) => {
                self.approvals.withdraw(&hazard.recommendation_id);
                log::warn!("🔁 Hazard {} re-armed", kind);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, kind: HazardKind) -> bool {
        self.active.contains_key(&kind)
    }

    /// Open hazards with the approval state of their recommendation
    pub fn active_hazards(&self) -> Vec<HazardStatus> {
        self.active
            .values()
            .map(|hazard| HazardStatus {
                approved: self.approvals.is_approved(&hazard.recommendation_id),
                hazard: hazard.clone(),
            })
            .collect()
    }

    pub fn approvals(&self) -> &Arc<ApprovalGate> {
        &self.approvals
    }

    /// Current pressure rate of change (%/min), if defined
    pub fn pressure_rate(&self) -> Option<f64> {
        self.pressure_window.rate_per_minute()
    }

    pub fn radiation_baseline(&self) -> Option<f64> {
        self.radiation_baseline.baseline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn monitor() -> SafetyMonitor {
        SafetyMonitor::new(Arc::new(ApprovalGate::new()))
    }

    fn state(pressure_kpa: f64, radiation_msv_hr: f64) -> SettlementState {
        SettlementState {
            pressure_kpa,
            radiation_msv_hr,
            ..SettlementState::default()
        }
    }

    #[test]
    fn test_nominal_state_is_quiet() {
        let mut m = monitor();
        for i in 0..20 {
            let report = m.check_safety_at(&SettlementState::default(), t(i * 5));
            assert!(report.alerts.is_empty());
            assert!(report.recommendations.is_empty());
        }
        assert!(m.approvals().is_empty());
    }

    #[test]
    fn test_pressure_critical_fires_once_and_clears() {
        let mut m = monitor();

        let report = m.check_safety_at(&state(89.9, 0.02), t(0));
        let kinds: Vec<_> = report.recommendations.iter().map(|r| r.action).collect();
        assert!(kinds.contains(&Action::ImmediateEvacuation));
        assert!(m.is_active(HazardKind::PressureCritical));

        // Still breached: no repeat alert
        let report = m.check_safety_at(&state(89.0, 0.02), t(600));
        assert!(report
            .recommendations
            .iter()
            .all(|r| r.action != Action::ImmediateEvacuation));

        // Boundary value clears (condition is strictly < 90.0)
        let report = m.check_safety_at(&state(90.0, 0.02), t(1200));
        assert!(report.cleared.contains(&HazardKind::PressureCritical));
        assert!(!m.is_active(HazardKind::PressureCritical));
    }

    #[test]
    fn test_pressure_leak_episode() {
        let mut m = monitor();

        assert!(m.check_safety_at(&state(100.0, 0.02), t(0)).alerts.is_empty());

        // -3% in one minute → -3 %/min
        let report = m.check_safety_at(&state(97.0, 0.02), t(60));
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(report.recommendations[0].action, Action::IsolateCompartments);
        assert!(m.is_active(HazardKind::PressureLeak));

        // Continued breach: still active, no new alert
        let report = m.check_safety_at(&state(94.0, 0.02), t(120));
        assert!(report.alerts.is_empty());
        assert!(m.is_active(HazardKind::PressureLeak));

        // Rate over window: (94 - 100)/100*100 / 3 min = -2.0 → clears (>= -2.0)
        let report = m.check_safety_at(&state(94.0, 0.02), t(180));
        assert_eq!(report.cleared, vec![HazardKind::PressureLeak]);
        assert!(!m.is_active(HazardKind::PressureLeak));
    }

    #[test]
    fn test_leak_rate_uses_only_window_endpoints() {
        let mut m = monitor();
        m.check_safety_at(&state(100.0, 0.02), t(0));
        m.check_safety_at(&state(80.0, 0.02), t(30)); // intermediate dip
        let report = m.check_safety_at(&state(99.5, 0.02), t(60));

        // endpoint rate is -0.5 %/min: no leak even though the dip was steep
        assert!(!m.is_active(HazardKind::PressureLeak));
        assert!(report
            .recommendations
            .iter()
            .all(|r| r.action != Action::IsolateCompartments));
    }

    #[test]
    fn test_radiation_critical_and_spike_are_exclusive() {
        let mut m = monitor();
        for i in 0..5 {
            m.check_safety_at(&state(101.325, 0.02), t(i * 5));
        }

        // Spike above baseline, below critical
        let report = m.check_safety_at(&state(101.325, 0.3), t(25));
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].severity, AlertSeverity::Warning);
        assert!(m.is_active(HazardKind::RadiationSpike));

        // Critical: spike must go idle
        let report = m.check_safety_at(&state(101.325, 0.8), t(30));
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.recommendations[0].action, Action::ActivateStormShelter);
        assert!(report.cleared.contains(&HazardKind::RadiationSpike));
        assert!(m.is_active(HazardKind::RadiationCritical));
        assert!(!m.is_active(HazardKind::RadiationSpike));
    }

    #[test]
    fn test_spike_suppressed_while_critical_active() {
        let mut m = monitor();
        for i in 0..5 {
            m.check_safety_at(&state(101.325, 0.02), t(i * 5));
        }

        let report = m.check_safety_at(&state(101.325, 1.5), t(25));
        assert_eq!(report.alerts.len(), 1);
        assert!(m.is_active(HazardKind::RadiationCritical));
        assert!(!m.is_active(HazardKind::RadiationSpike));
    }

    #[test]
    fn test_each_activation_registers_one_pending_approval() {
        let gate = Arc::new(ApprovalGate::new());
        let mut m = SafetyMonitor::new(gate.clone());

        m.check_safety_at(&state(100.0, 0.02), t(0));
        let report = m.check_safety_at(&state(85.0, 0.02), t(60));

        // leak + critical pressure
        assert_eq!(report.alerts.len(), 2);
        assert_eq!(report.recommendations.len(), 2);
        assert_eq!(gate.len(), 2);
        for rec in &report.recommendations {
            assert!(rec.requires_approval);
            assert!((1..=10).contains(&rec.priority));
            assert!(gate.status(&rec.id).is_some());
        }
    }

    #[test]
    fn test_active_hazards_reflect_approval() {
        let gate = Arc::new(ApprovalGate::new());
        let mut m = SafetyMonitor::new(gate.clone()).with_clock(Box::new(|| t(0)));

        let report = m.check_safety(&state(85.0, 0.02));
        let rec_id = report.recommendations[0].id;

        let hazards = m.active_hazards();
        assert_eq!(hazards.len(), 1);
        assert!(!hazards[0].approved);
        assert_eq!(hazards[0].hazard.since, t(0));

        assert!(gate.approve(&rec_id, "commander"));
        assert!(m.active_hazards()[0].approved);
    }

    #[test]
    fn test_rearmed_hazard_is_raised_again() {
        let gate = Arc::new(ApprovalGate::new());
        let mut m = SafetyMonitor::new(gate.clone());

        let first = m.check_safety_at(&state(85.0, 0.02), t(0));
        assert_eq!(first.raised, vec![HazardKind::PressureCritical]);
        let first_id = first.recommendations[0].id;

        assert!(m.rearm(HazardKind::PressureCritical));
        assert!(!m.rearm(HazardKind::PressureCritical));
        assert!(!m.is_active(HazardKind::PressureCritical));
        assert!(gate.status(&first_id).is_none());

        // Condition still holds: raised once more with a fresh request
        let second = m.check_safety_at(&state(85.0, 0.02), t(5));
        assert_eq!(second.raised, vec![HazardKind::PressureCritical]);
        assert_ne!(second.recommendations[0].id, first_id);
        assert_eq!(gate.list_pending().len(), 1);
    }

    #[test]
    fn test_old_pressure_samples_leave_the_window() {
        let mut m = monitor();
        m.check_safety_at(&state(120.0, 0.02), t(0));
        m.check_safety_at(&state(101.0, 0.02), t(400));
        m.check_safety_at(&state(101.0, 0.02), t(400) + Duration::seconds(60));

        // 120 kPa sample is older than 5 minutes: rate is computed from 101 → 101
        assert_eq!(m.pressure_rate(), Some(0.0));
        assert!(!m.is_active(HazardKind::PressureLeak));
    }
}
