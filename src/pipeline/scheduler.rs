//! Periodic evaluation tasks
//!
//! One task per component. A cycle is awaited inline before the next tick is
//! taken, so runs of the same component never overlap. A failed cycle is
//! logged and the loop keeps going.

use super::config::PipelineConfig;
use super::coordinator::{CycleOutcome, PipelineCoordinator};
use super::error::PipelineError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Run `cycle` every `interval_ms` until `shutdown` flips to true
///
/// This function runs indefinitely until shutdown is signalled.
pub async fn periodic_task<F, Fut>(
    name: &'static str,
    interval_ms: u64,
    mut shutdown: watch::Receiver<bool>,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<CycleOutcome, PipelineError>>,
{
    log::info!("⏰ Starting {} cycle (interval: {}ms)", name, interval_ms);

    let mut timer = interval(Duration::from_millis(interval_ms.max(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                match cycle().await {
                    Ok(outcome) => {
                        log::debug!(
                            "✅ {} cycle: {} alerts, {} recommendations",
                            name,
                            outcome.alerts,
                            outcome.recommendations
                        );
                    }
                    Err(e) => {
                        log::error!("❌ {} cycle failed: {}", name, e);
                    }
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    log::info!("⏹️  {} cycle stopped", name);
}

/// Spawn the safety, anomaly and decision cycles
pub fn spawn_cycles(
    coordinator: Arc<PipelineCoordinator>,
    config: &PipelineConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let safety = coordinator.clone();
    let anomaly = coordinator.clone();
    let decision = coordinator;

    vec![
        tokio::spawn(periodic_task(
            "safety",
            config.safety_interval_ms,
            shutdown.clone(),
            move || {
                let c = safety.clone();
                async move { c.run_safety_cycle().await }
            },
        )),
        tokio::spawn(periodic_task(
            "anomaly",
            config.anomaly_interval_ms,
            shutdown.clone(),
            move || {
                let c = anomaly.clone();
                async move { c.run_anomaly_cycle().await }
            },
        )),
        tokio::spawn(periodic_task(
            "decision",
            config.decision_interval_ms,
            shutdown,
            move || {
                let c = decision.clone();
                async move { c.run_decision_cycle().await }
            },
        )),
    ]
}
