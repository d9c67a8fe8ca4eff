//! Telemetry sources
//!
//! `SimulatedTelemetry` produces bounded random variation around a nominal
//! operating point. Fields can be pinned by a fault scenario; pinned fields
//! are excluded from the random walk until released.

use super::types::SettlementState;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, Duration};

#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Current immutable snapshot
    async fn snapshot(&self) -> SettlementState;

    fn source_type(&self) -> &'static str;
}

/// Individually addressable field of a `SettlementState`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryField {
    O2Pct,
    Co2Ppm,
    PressureKpa,
    TempC,
    HumidityPct,
    SolarKw,
    BatteryKwh,
    LoadKw,
    CropHealthIndex,
    RadiationMsvHr,
    StrainIndex,
}

impl TelemetryField {
    pub fn get(&self, state: &SettlementState) -> f64 {
        match self {
            TelemetryField::O2Pct => state.o2_pct,
            TelemetryField::Co2Ppm => state.co2_ppm,
            TelemetryField::PressureKpa => state.pressure_kpa,
            TelemetryField::TempC => state.temp_c,
            TelemetryField::HumidityPct => state.humidity_pct,
            TelemetryField::SolarKw => state.solar_kw,
            TelemetryField::BatteryKwh => state.battery_kwh,
            TelemetryField::LoadKw => state.load_kw,
            TelemetryField::CropHealthIndex => state.crop_health_index,
            TelemetryField::RadiationMsvHr => state.radiation_msv_hr,
            TelemetryField::StrainIndex => state.strain_index,
        }
    }

    pub fn set(&self, state: &mut SettlementState, value: f64) {
        let slot = match self {
            TelemetryField::O2Pct => &mut state.o2_pct,
            TelemetryField::Co2Ppm => &mut state.co2_ppm,
            TelemetryField::PressureKpa => &mut state.pressure_kpa,
            TelemetryField::TempC => &mut state.temp_c,
            TelemetryField::HumidityPct => &mut state.humidity_pct,
            TelemetryField::SolarKw => &mut state.solar_kw,
            TelemetryField::BatteryKwh => &mut state.battery_kwh,
            TelemetryField::LoadKw => &mut state.load_kw,
            TelemetryField::CropHealthIndex => &mut state.crop_health_index,
            TelemetryField::RadiationMsvHr => &mut state.radiation_msv_hr,
            TelemetryField::StrainIndex => &mut state.strain_index,
        };
        *slot = value;
    }

    /// (spread around nominal, lower bound, upper bound) for the random walk
    fn variation(&self) -> (f64, f64, f64) {
        match self {
            TelemetryField::O2Pct => (0.3, 20.5, 21.5),
            TelemetryField::Co2Ppm => (30.0, 350.0, 445.0),
            TelemetryField::PressureKpa => (0.02, 101.0, 101.6),
            TelemetryField::TempC => (1.0, 18.5, 21.5),
            TelemetryField::HumidityPct => (2.5, 45.0, 55.0),
            TelemetryField::SolarKw => (60.0, 900.0, 1100.0),
            TelemetryField::BatteryKwh => (20.0, 300.0, 500.0),
            TelemetryField::LoadKw => (30.0, 700.0, 840.0),
            TelemetryField::CropHealthIndex => (3.0, 80.0, 95.0),
            TelemetryField::RadiationMsvHr => (0.002, 0.015, 0.025),
            TelemetryField::StrainIndex => (0.02, 0.4, 0.6),
        }
    }

    pub fn all() -> [TelemetryField; 11] {
        [
            TelemetryField::O2Pct,
            TelemetryField::Co2Ppm,
            TelemetryField::PressureKpa,
            TelemetryField::TempC,
            TelemetryField::HumidityPct,
            TelemetryField::SolarKw,
            TelemetryField::BatteryKwh,
            TelemetryField::LoadKw,
            TelemetryField::CropHealthIndex,
            TelemetryField::RadiationMsvHr,
            TelemetryField::StrainIndex,
        ]
    }
}

struct SimulatorState {
    current: SettlementState,
    pinned: HashSet<TelemetryField>,
}

pub struct SimulatedTelemetry {
    nominal: SettlementState,
    inner: RwLock<SimulatorState>,
}

impl SimulatedTelemetry {
    pub fn new() -> Self {
        Self::with_nominal(SettlementState::default())
    }

    pub fn with_nominal(nominal: SettlementState) -> Self {
        Self {
            nominal,
            inner: RwLock::new(SimulatorState {
                current: nominal,
                pinned: HashSet::new(),
            }),
        }
    }

    pub fn nominal(&self) -> SettlementState {
        self.nominal
    }

    /// Advance every unpinned field one random step
    pub async fn tick(&self) {
        let mut inner = self.inner.write().await;
        let SimulatorState { current, pinned } = &mut *inner;
        vary(current, &self.nominal, pinned);
    }

    /// Overwrite the whole state (pinned fields included)
    pub async fn restore(&self, snapshot: SettlementState) {
        self.inner.write().await.current = snapshot;
    }

    /// Set fields and hold them against the random walk
    pub async fn pin(&self, values: &[(TelemetryField, f64)]) {
        let mut inner = self.inner.write().await;
        for (field, value) in values {
            field.set(&mut inner.current, *value);
            inner.pinned.insert(*field);
        }
    }

    /// Restore fields from `snapshot` and return them to the random walk
    pub async fn release(&self, fields: &[TelemetryField], snapshot: &SettlementState) {
        let mut inner = self.inner.write().await;
        for field in fields {
            field.set(&mut inner.current, field.get(snapshot));
            inner.pinned.remove(field);
        }
    }

    pub async fn pinned_fields(&self) -> Vec<TelemetryField> {
        self.inner.read().await.pinned.iter().copied().collect()
    }

    /// Random walk loop; stops when `shutdown` flips to true
    pub async fn run(self: Arc<Self>, interval_ms: u64, mut shutdown: watch::Receiver<bool>) {
        log::info!("📡 Starting telemetry simulator (interval: {}ms)", interval_ms);
        let mut timer = interval(Duration::from_millis(interval_ms.max(1)));

        loop {
            tokio::select! {
                _ = timer.tick() => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("📡 Telemetry simulator stopped");
    }
}

impl Default for SimulatedTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

fn vary(state: &mut SettlementState, nominal: &SettlementState, pinned: &HashSet<TelemetryField>) {
    let mut rng = rand::thread_rng();
    for field in TelemetryField::all() {
        if pinned.contains(&field) {
            continue;
        }
        let (spread, lo, hi) = field.variation();
        let value = field.get(nominal) + rng.gen_range(-spread..=spread);
        field.set(state, value.clamp(lo, hi));
    }
}

#[async_trait]
impl TelemetrySource for SimulatedTelemetry {
    async fn snapshot(&self) -> SettlementState {
        self.inner.read().await.current
    }

    fn source_type(&self) -> &'static str {
        "SIMULATED"
    }
}
