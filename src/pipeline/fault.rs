//! Scripted fault scenarios for validating detection end to end
//!
//! A scenario pins the telemetry fields it drives, recomputes them every tick
//! from the elapsed time, and on completion or cancellation restores those
//! fields from the snapshot taken when it started. One scenario at a time.

use super::error::PipelineError;
use super::sinks::{AuditRecord, AuditSink};
use super::source::{SimulatedTelemetry, TelemetryField, TelemetrySource};
use super::types::SettlementState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

/// Radiation storm: quiet level before the storm (mSv/hr)
pub const STORM_BASE_MSV_HR: f64 = 0.02;
/// Radiation storm: peak level (mSv/hr)
pub const STORM_PEAK_MSV_HR: f64 = 2.0;
/// Radiation storm: seconds until peak
pub const STORM_PEAK_SECS: f64 = 60.0;
/// Pressure never drops below this during a leak (kPa)
pub const LEAK_PRESSURE_FLOOR_KPA: f64 = 68.95;
/// Default leak rate (% per minute, exponential)
pub const DEFAULT_LEAK_PCT_PER_MIN: f64 = 3.0;
/// CO2 starts rising this long into a leak
pub const LEAK_CO2_DELAY_SECS: f64 = 30.0;
pub const LEAK_CO2_PPM_PER_MIN: f64 = 100.0;
pub const LEAK_CO2_CAP_PPM: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Scenario {
    RadiationStorm,
    PressureLeak { leak_pct_per_min: f64 },
}

impl Scenario {
    pub fn pressure_leak() -> Self {
        Scenario::PressureLeak {
            leak_pct_per_min: DEFAULT_LEAK_PCT_PER_MIN,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "radiation_storm" => Some(Scenario::RadiationStorm),
            "pressure_leak" => Some(Scenario::pressure_leak()),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::RadiationStorm => "radiation_storm",
            Scenario::PressureLeak { .. } => "pressure_leak",
        }
    }

    pub fn default_duration(&self) -> Duration {
        match self {
            Scenario::RadiationStorm => Duration::from_secs(300),
            Scenario::PressureLeak { .. } => Duration::from_secs(180),
        }
    }

    /// Fields restored when the scenario ends
    pub fn touched_fields(&self) -> &'static [TelemetryField] {
        match self {
            Scenario::RadiationStorm => &[TelemetryField::RadiationMsvHr],
            Scenario::PressureLeak { .. } => &[TelemetryField::PressureKpa, TelemetryField::Co2Ppm],
        }
    }

    /// Field values `elapsed` seconds into a run of `duration` seconds
    pub fn values_at(
        &self,
        baseline: &SettlementState,
        elapsed: f64,
        duration: f64,
    ) -> Vec<(TelemetryField, f64)> {
        match *self {
            Scenario::RadiationStorm => {
                let radiation = if elapsed < STORM_PEAK_SECS {
                    // exponential rise from base to peak
                    let progress = elapsed / STORM_PEAK_SECS;
                    STORM_BASE_MSV_HR
                        * (progress * (STORM_PEAK_MSV_HR / STORM_BASE_MSV_HR).ln()).exp()
                } else {
                    let decline = (duration - STORM_PEAK_SECS).max(f64::EPSILON);
                    let progress = (elapsed - STORM_PEAK_SECS) / decline;
                    STORM_PEAK_MSV_HR * (-progress * 2.0).exp()
                };
                vec![(TelemetryField::RadiationMsvHr, radiation)]
            }
            Scenario::PressureLeak { leak_pct_per_min } => {
                let per_second = leak_pct_per_min / 100.0 / 60.0;
                let pressure =
                    (baseline.pressure_kpa * (-per_second * elapsed).exp()).max(LEAK_PRESSURE_FLOOR_KPA);

                let mut values = vec![(TelemetryField::PressureKpa, pressure)];
                if elapsed > LEAK_CO2_DELAY_SECS {
                    let rise = (elapsed - LEAK_CO2_DELAY_SECS) / 60.0 * LEAK_CO2_PPM_PER_MIN;
                    values.push((
                        TelemetryField::Co2Ppm,
                        (baseline.co2_ppm + rise).min(LEAK_CO2_CAP_PPM),
                    ));
                }
                values
            }
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioStatus {
    Idle,
    Running {
        scenario: Scenario,
        started_at: DateTime<Utc>,
        elapsed_secs: f64,
        remaining_secs: f64,
        duration_secs: f64,
        progress_percent: f64,
    },
}

struct ActiveRun {
    run_id: Uuid,
    scenario: Scenario,
    started_at: DateTime<Utc>,
    started: Instant,
    duration: Duration,
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct FaultInjector {
    telemetry: Arc<SimulatedTelemetry>,
    audit: Arc<dyn AuditSink>,
    tick: Duration,
    active: Arc<Mutex<Option<ActiveRun>>>,
}

impl FaultInjector {
    pub fn new(telemetry: Arc<SimulatedTelemetry>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            telemetry,
            audit,
            tick: Duration::from_secs(1),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Override the update period (defaults to one second)
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub async fn start(&self, scenario: Scenario, duration: Duration) -> Result<(), PipelineError> {
        let mut active = self.active.lock().await;
        if let Some(run) = active.as_ref() {
            if !run.handle.is_finished() {
                return Err(PipelineError::ScenarioActive(run.scenario.name().to_string()));
            }
        }

        self.audit
            .record(&AuditRecord::system(
                "SCENARIO_START",
                "telemetry_source",
                serde_json::json!({
                    "scenario": scenario.name(),
                    "duration_seconds": duration.as_secs_f64(),
                }),
            ))
            .await?;

        let baseline = self.telemetry.snapshot().await;
        let run_id = Uuid::new_v4();
        let (cancel, cancelled) = watch::channel(false);

        let handle = tokio::spawn(execute(
            run_id,
            scenario,
            duration,
            self.tick,
            baseline,
            self.telemetry.clone(),
            self.audit.clone(),
            self.active.clone(),
            cancelled,
        ));

        log::warn!("💥 Fault scenario started: {} ({:.0}s)", scenario, duration.as_secs_f64());

        *active = Some(ActiveRun {
            run_id,
            scenario,
            started_at: Utc::now(),
            started: Instant::now(),
            duration,
            cancel,
            handle,
        });
        Ok(())
    }

    /// Start with the scenario's default duration
    pub async fn start_default(&self, scenario: Scenario) -> Result<(), PipelineError> {
        self.start(scenario, scenario.default_duration()).await
    }

    /// Cancel the running scenario and wait until its fields are restored
    ///
    /// Returns the stopped scenario, or `None` when idle.
    pub async fn stop(&self) -> Result<Option<Scenario>, PipelineError> {
        // Take the run out first: the task clears the slot itself on exit
        let run = self.active.lock().await.take();
        let run = match run {
            Some(run) if !run.handle.is_finished() => run,
            _ => return Ok(None),
        };

        let _ = run.cancel.send(true);
        if let Err(e) = run.handle.await {
            log::error!("❌ Fault scenario task failed: {}", e);
        }

        self.audit
            .record(&AuditRecord::system(
                "SCENARIO_STOP",
                "telemetry_source",
                serde_json::json!({ "scenario": run.scenario.name() }),
            ))
            .await?;

        log::info!("🛑 Fault scenario stopped: {}", run.scenario);
        Ok(Some(run.scenario))
    }

    pub async fn status(&self) -> ScenarioStatus {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(run) if !run.handle.is_finished() => {
                let elapsed = run.started.elapsed().as_secs_f64();
                let duration = run.duration.as_secs_f64();
                ScenarioStatus::Running {
                    scenario: run.scenario,
                    started_at: run.started_at,
                    elapsed_secs: elapsed,
                    remaining_secs: (duration - elapsed).max(0.0),
                    duration_secs: duration,
                    progress_percent: if duration > 0.0 {
                        (elapsed / duration * 100.0).min(100.0)
                    } else {
                        0.0
                    },
                }
            }
            _ => ScenarioStatus::Idle,
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(self.status().await, ScenarioStatus::Running { .. })
    }
}

#[allow(clippy::too_many_arguments)]
async fn execute(
    run_id: Uuid,
    scenario: Scenario,
    duration: Duration,
    tick: Duration,
    baseline: SettlementState,
    telemetry: Arc<SimulatedTelemetry>,
    audit: Arc<dyn AuditSink>,
    active: Arc<Mutex<Option<ActiveRun>>>,
    mut cancelled: watch::Receiver<bool>,
) {
    let started = Instant::now();
    let mut timer = tokio::time::interval(tick);
    let mut completed = true;

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let elapsed = started.elapsed();
                if elapsed >= duration {
                    break;
                }
                let values = scenario.values_at(
                    &baseline,
                    elapsed.as_secs_f64(),
                    duration.as_secs_f64(),
                );
                telemetry.pin(&values).await;
            }
            changed = cancelled.changed() => {
                if changed.is_err() || *cancelled.borrow() {
                    completed = false;
                    break;
                }
            }
        }
    }

    telemetry.release(scenario.touched_fields(), &baseline).await;
    log::info!("🔧 Restored {:?} after {}", scenario.touched_fields(), scenario);

    let record = AuditRecord::system(
        "SCENARIO_END",
        "telemetry_source",
        serde_json::json!({
            "scenario": scenario.name(),
            "duration_seconds": duration.as_secs_f64(),
            "completed": completed,
        }),
    );
    if let Err(e) = audit.record(&record).await {
        log::warn!("⚠️  Failed to audit scenario end: {}", e);
    }

    let mut slot = active.lock().await;
    if slot.as_ref().map(|run| run.run_id) == Some(run_id) {
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sinks::InMemoryAuditSink;

    fn injector() -> (FaultInjector, Arc<SimulatedTelemetry>, Arc<InMemoryAuditSink>) {
        let telemetry = Arc::new(SimulatedTelemetry::new());
        let audit = Arc::new(InMemoryAuditSink::new());
        let injector = FaultInjector::new(telemetry.clone(), audit.clone())
            .with_tick(Duration::from_millis(5));
        (injector, telemetry, audit)
    }

    #[test]
    fn test_storm_curve() {
        let base = SettlementState::default();
        let at = |t: f64| Scenario::RadiationStorm.values_at(&base, t, 300.0)[0].1;

        assert!((at(0.0) - STORM_BASE_MSV_HR).abs() < 1e-12);
        assert!((at(59.999) - STORM_PEAK_MSV_HR).abs() < 1e-2);
        assert!((at(60.0) - STORM_PEAK_MSV_HR).abs() < 1e-12);
        // decays to peak * e^-2 at the end
        assert!((at(300.0) - STORM_PEAK_MSV_HR * (-2.0f64).exp()).abs() < 1e-9);
        assert!(at(30.0) < at(45.0));
        assert!(at(120.0) > at(240.0));
    }

    #[test]
    fn test_leak_curve_and_co2() {
        let base = SettlementState::default();
        let leak = Scenario::pressure_leak();

        let early = leak.values_at(&base, 10.0, 180.0);
        assert_eq!(early.len(), 1);

        let later = leak.values_at(&base, 90.0, 180.0);
        let pressure = later[0].1;
        let expected = base.pressure_kpa * (-0.03 / 60.0 * 90.0f64).exp();
        assert!((pressure - expected).abs() < 1e-9);
        assert_eq!(later[1], (TelemetryField::Co2Ppm, 500.0));

        // floor and cap
        let long = leak.values_at(&base, 100_000.0, 200_000.0);
        assert_eq!(long[0].1, LEAK_PRESSURE_FLOOR_KPA);
        assert_eq!(long[1].1, LEAK_CO2_CAP_PPM);
    }

    #[test]
    fn test_scenario_names() {
        assert_eq!(Scenario::from_name("radiation_storm"), Some(Scenario::RadiationStorm));
        assert_eq!(Scenario::from_name("pressure_leak").unwrap().name(), "pressure_leak");
        assert!(Scenario::from_name("meteor").is_none());
        assert_eq!(
            Scenario::RadiationStorm.default_duration(),
            Duration::from_secs(300)
        );
    }

    #[tokio::test]
    async fn test_only_one_scenario_at_a_time() {
        let (injector, _telemetry, _audit) = injector();
        injector
            .start(Scenario::RadiationStorm, Duration::from_secs(30))
            .await
            .unwrap();

        let err = injector
            .start(Scenario::pressure_leak(), Duration::from_secs(30))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ScenarioActive(ref name) if name == "radiation_storm"));

        injector.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_restores_touched_fields() {
        let (injector, telemetry, audit) = injector();
        let before = telemetry.snapshot().await;

        injector
            .start(Scenario::RadiationStorm, Duration::from_secs(30))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(injector.is_running().await);
        assert!(telemetry.snapshot().await.radiation_msv_hr > before.radiation_msv_hr);

        assert_eq!(injector.stop().await.unwrap(), Some(Scenario::RadiationStorm));
        assert_eq!(telemetry.snapshot().await, before);
        assert!(telemetry.pinned_fields().await.is_empty());
        assert_eq!(injector.status().await, ScenarioStatus::Idle);

        let actions: Vec<String> = audit.records().await.into_iter().map(|r| r.action).collect();
        assert_eq!(actions, vec!["SCENARIO_START", "SCENARIO_END", "SCENARIO_STOP"]);
    }

    #[tokio::test]
    async fn test_natural_completion_restores_and_goes_idle() {
        let (injector, telemetry, audit) = injector();
        let before = telemetry.snapshot().await;

        injector
            .start(Scenario::pressure_leak(), Duration::from_millis(40))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while injector.is_running().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(telemetry.snapshot().await, before);
        assert_eq!(injector.stop().await.unwrap(), None);
        assert_eq!(audit.records().await.last().unwrap().action, "SCENARIO_END");
        assert_eq!(audit.records().await.last().unwrap().details["completed"], true);
    }

    #[tokio::test]
    async fn test_status_reports_progress() {
        let (injector, _telemetry, _audit) = injector();
        assert_eq!(injector.status().await, ScenarioStatus::Idle);

        injector
            .start(Scenario::RadiationStorm, Duration::from_secs(60))
            .await
            .unwrap();
        match injector.status().await {
            ScenarioStatus::Running {
                scenario,
                duration_secs,
                progress_percent,
                remaining_secs,
                ..
            } => {
                assert_eq!(scenario, Scenario::RadiationStorm);
                assert_eq!(duration_secs, 60.0);
                assert!(progress_percent < 50.0);
                assert!(remaining_secs > 30.0);
            }
            ScenarioStatus::Idle => panic!("expected a running scenario"),
        }
        injector.stop().await.unwrap();
    }
}
