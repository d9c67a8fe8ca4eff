//! Pipeline Runtime
//!
//! This binary orchestrates the monitoring pipeline:
//! - Starts the telemetry simulator
//! - Creates the PipelineCoordinator with in-memory stores and a JSONL audit log
//! - Spawns the safety, anomaly and decision cycles
//! - Optionally schedules a fault scenario for end-to-end validation
//!
//! Usage:
//!   cargo run --release --bin pipeline_runtime
//!
//! Environment variables:
//!   HELIOS_AUDIT_LOG_PATH - Audit log path (default: audit_log.jsonl)
//!   ENABLE_PIPELINE - Master switch (default: true)
//!   SAFETY_CHECK_INTERVAL_MS / ANOMALY_CHECK_INTERVAL_MS / DECISION_INTERVAL_MS
//!   FAULT_SCENARIO - radiation_storm | pressure_leak (default: none)
//!   ALERT_STORE_CAPACITY / RECOMMENDATION_STORE_CAPACITY / APPROVAL_CAPACITY

use dotenv::dotenv;
use helios::pipeline::{
    anomaly::AnomalyDetector,
    approval::ApprovalGate,
    config::PipelineConfig,
    coordinator::PipelineCoordinator,
    decision::DecisionEngine,
    fault::FaultInjector,
    jsonl_writer::JsonlAuditSink,
    safety::SafetyMonitor,
    scheduler::spawn_cycles,
    sinks::{AuditRecord, AuditSink, InMemoryAlertStore, InMemoryRecommendationStore},
    source::SimulatedTelemetry,
};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 HELIOS Pipeline Runtime");
    info!("   └─ Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = PipelineConfig::from_env();

    if !config.enabled {
        info!("⚠️  Pipeline is DISABLED (set ENABLE_PIPELINE=true to activate)");
        info!("   └─ Exiting gracefully...");
        return Ok(());
    }

    info!("✅ Pipeline ENABLED");
    info!("   ├─ Audit log: {}", config.audit_log_path);
    info!("   ├─ Telemetry interval: {}ms", config.telemetry_interval_ms);
    info!("   ├─ Safety interval: {}ms", config.safety_interval_ms);
    info!("   ├─ Anomaly interval: {}ms", config.anomaly_interval_ms);
    info!("   ├─ Decision interval: {}ms", config.decision_interval_ms);
    info!(
        "   └─ Retention: {} alerts, {} recommendations, {} approvals",
        config.alert_store_capacity,
        config.recommendation_store_capacity,
        config.approval_capacity
    );

    // Sinks
    let audit: Arc<dyn AuditSink> = Arc::new(JsonlAuditSink::new(&config.audit_log_path)?);
    let alerts = Arc::new(InMemoryAlertStore::with_capacity(config.alert_store_capacity));
    let recommendations = Arc::new(InMemoryRecommendationStore::with_capacity(
        config.recommendation_store_capacity,
    ));

    audit
        .record(&AuditRecord::system(
            "PIPELINE_START",
            "pipeline_runtime",
            serde_json::json!({
                "safety_interval_ms": config.safety_interval_ms,
                "anomaly_interval_ms": config.anomaly_interval_ms,
                "decision_interval_ms": config.decision_interval_ms,
            }),
        ))
        .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Telemetry simulator
    let telemetry = Arc::new(SimulatedTelemetry::new());
    let simulator = tokio::spawn(
        telemetry
            .clone()
            .run(config.telemetry_interval_ms, shutdown_rx.clone()),
    );

    let approvals = Arc::new(ApprovalGate::with_capacity(config.approval_capacity));
    let coordinator = Arc::new(PipelineCoordinator::with_components(
        telemetry.clone(),
        AnomalyDetector::new(),
        SafetyMonitor::new(approvals.clone()),
        DecisionEngine::new(),
        approvals,
        alerts,
        recommendations,
        audit.clone(),
    ));

    info!("🚀 Spawning evaluation cycles...");
    let mut handles = spawn_cycles(coordinator.clone(), &config, shutdown_rx.clone());
    handles.push(simulator);
    info!("✅ All background tasks running");

    // Optional scheduled fault scenario
    let injector = Arc::new(FaultInjector::new(telemetry.clone(), audit.clone()));
    if let (Some(scenario), Some(duration)) = (config.fault_scenario, config.fault_duration()) {
        info!(
            "💥 Fault scenario '{}' scheduled in {}s ({}s long)",
            scenario,
            config.fault_delay_secs,
            duration.as_secs()
        );
        let injector = injector.clone();
        let delay = Duration::from_secs(config.fault_delay_secs);
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if let Err(e) = injector.start(scenario, duration).await {
                        error!("❌ Failed to start fault scenario: {}", e);
                    }
                }
                _ = shutdown.changed() => {}
            }
        });
    }

    info!("");
    info!("🔄 Press CTRL+C to shutdown gracefully");

    // Wait for CTRL+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("");
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    // Restore telemetry before the cycles stop
    match injector.stop().await {
        Ok(Some(scenario)) => info!("🛑 Stopped fault scenario '{}'", scenario),
        Ok(None) => {}
        Err(e) => warn!("⚠️  Failed to stop fault scenario: {}", e),
    }

    let _ = shutdown_tx.send(true);
    for handle in handles {
        if let Err(e) = handle.await {
            error!("❌ Background task panicked: {}", e);
        }
    }

    let pending = coordinator.pending_approvals();
    if !pending.is_empty() {
        warn!("⚠️  {} recommendations still awaiting approval", pending.len());
    }

    audit
        .record(&AuditRecord::system(
            "PIPELINE_STOP",
            "pipeline_runtime",
            serde_json::json!({ "pending_approvals": pending.len() }),
        ))
        .await?;

    info!("✅ Pipeline runtime stopped");
    Ok(())
}
