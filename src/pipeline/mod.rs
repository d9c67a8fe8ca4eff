//! # Habitat Telemetry Monitoring & Decision Pipeline
//!
//! Ingests periodic habitat snapshots and produces three kinds of output:
//! - statistical anomaly alerts (z-score over rolling windows)
//! - threshold/rate/spike safety alerts, each paired with a recommendation
//!   that waits on human approval
//! - ranked, explainable operational recommendations
//!
//! ## Data Flow
//!
//! ```text
//! TelemetrySource ─► SettlementState ─┬─► AnomalyDetector ─┐
//!                                     ├─► SafetyMonitor ───┼─► AlertStore / RecommendationStore / AuditSink
//!                                     └─► DecisionEngine ──┘
//!                                              ▲
//!                        ApprovalGate ◄────────┘ (external approve path)
//! ```
//!
//! The three detectors never share mutable state. Each owns its own history
//! and runs on its own cycle under the `PipelineCoordinator`.
//!
//! ## Module Organization
//!
//! - `types` - Core data structures (SettlementState, Alert, Recommendation)
//! - `stats` - Per-metric rolling statistics
//! - `anomaly` - Z-score anomaly classification
//! - `windows` - Rate and baseline windows for safety checks
//! - `safety` - Hazard state machines
//! - `approval` - Human approval gate
//! - `decision` - Rule-based recommendation engine
//! - `sinks` / `jsonl_writer` - Output stores and audit sinks
//! - `source` - Telemetry source and simulator
//! - `fault` - Scripted fault scenarios
//! - `coordinator` / `scheduler` - Wiring and periodic cycles
//! - `config` - Environment configuration

pub mod anomaly;
pub mod approval;
pub mod config;
pub mod coordinator;
pub mod decision;
pub mod error;
pub mod fault;
pub mod jsonl_writer;
pub mod safety;
pub mod scheduler;
pub mod sinks;
pub mod source;
pub mod stats;
pub mod types;
pub mod windows;

// Re-export commonly used types
pub use anomaly::{AnomalyClassifier, AnomalyDetector};
pub use approval::ApprovalGate;
pub use config::PipelineConfig;
pub use coordinator::{CycleOutcome, PipelineCoordinator};
pub use decision::{calculate_priority, DecisionEngine, DecisionSummary, DecisionThresholds};
pub use error::{PipelineError, SinkError};
pub use fault::{FaultInjector, Scenario, ScenarioStatus};
pub use jsonl_writer::JsonlAuditSink;
pub use safety::{HazardKind, SafetyMonitor, SafetyReport, SafetyThresholds};
pub use sinks::{
    AlertFilter, AlertStore, AuditRecord, AuditSink, AuditStatus, InMemoryAlertStore,
    InMemoryAuditSink, InMemoryRecommendationStore, RecommendationStore,
};
pub use source::{SimulatedTelemetry, TelemetryField, TelemetrySource};
pub use stats::{MetricKind, MetricStatistics, MetricStatisticsTracker};
pub use types::{
    Action, Alert, AlertSeverity, AnomalyAlert, Impact, PendingApproval, Recommendation,
    RecommendationCategory, SettlementState,
};
pub use windows::{BaselineTracker, RateWindow, RollingWindow};
