//! Pipeline coordinator
//!
//! Owns one instance of every component, pulls snapshots from the telemetry
//! source and forwards every alert and recommendation to the stores and the
//! audit sink. Each component sits behind its own lock, so cycles of the same
//! component never overlap while different components run independently.
//!
//! A failed sink write never stops the remaining outputs of a cycle from
//! being forwarded. The cycle still reports the first failure. A safety
//! hazard whose outputs could not be delivered is re-armed, so the next
//! reading that still breaches raises it again (at-least-once delivery).

use super::anomaly::AnomalyDetector;
use super::approval::ApprovalGate;
use super::decision::{DecisionEngine, DecisionSummary};
use super::error::{PipelineError, SinkError};
use super::safety::{HazardStatus, SafetyMonitor};
use super::sinks::{AlertFilter, AlertStore, AuditRecord, AuditSink, AuditStatus, RecommendationStore};
use super::source::TelemetrySource;
use super::stats::{MetricKind, MetricStatistics};
use super::types::{Alert, AnomalyAlert, PendingApproval, Recommendation, RecommendationCategory, SettlementState};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Counts produced by one cycle, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    pub alerts: usize,
    pub recommendations: usize,
}

pub struct PipelineCoordinator {
    source: Arc<dyn TelemetrySource>,
    anomaly: Mutex<AnomalyDetector>,
    safety: Mutex<SafetyMonitor>,
    decision: DecisionEngine,
    approvals: Arc<ApprovalGate>,
    alert_store: Arc<dyn AlertStore>,
    recommendation_store: Arc<dyn RecommendationStore>,
    audit: Arc<dyn AuditSink>,
}

impl PipelineCoordinator {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        alert_store: Arc<dyn AlertStore>,
        recommendation_store: Arc<dyn RecommendationStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let approvals = Arc::new(ApprovalGate::new());
        Self::with_components(
            source,
            AnomalyDetector::new(),
            SafetyMonitor::new(approvals.clone()),
            DecisionEngine::new(),
            approvals,
            alert_store,
            recommendation_store,
            audit,
        )
    }

    /// Wire pre-built components (custom thresholds, clocks, history sizes)
    ///
    /// `safety` must have been built over the same `approvals` gate.
    #[allow(clippy::too_many_arguments)]
    pub fn with_components(
        source: Arc<dyn TelemetrySource>,
        anomaly: AnomalyDetector,
        safety: SafetyMonitor,
        decision: DecisionEngine,
        approvals: Arc<ApprovalGate>,
        alert_store: Arc<dyn AlertStore>,
        recommendation_store: Arc<dyn RecommendationStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        log::info!(
            "🧭 Pipeline coordinator ready (source: {}, alerts: {}, recommendations: {}, audit: {})",
            source.source_type(),
            alert_store.backend_type(),
            recommendation_store.backend_type(),
            audit.backend_type()
        );

        Self {
            source,
            anomaly: Mutex::new(anomaly),
            safety: Mutex::new(safety),
            decision,
            approvals,
            alert_store,
            recommendation_store,
            audit,
        }
    }

    pub async fn current_state(&self) -> SettlementState {
        self.source.snapshot().await
    }

    // ------------------------------------------------------------------
    // Cycles
    // ------------------------------------------------------------------

    pub async fn run_safety_cycle(&self) -> Result<CycleOutcome, PipelineError> {
        let state = self.source.snapshot().await;
        let (alerts, recommendations) = self.check_safety(&state).await?;
        Ok(CycleOutcome {
            alerts: alerts.len(),
            recommendations: recommendations.len(),
        })
    }

    pub async fn run_anomaly_cycle(&self) -> Result<CycleOutcome, PipelineError> {
        let state = self.source.snapshot().await;
        let anomalies = self.detect_anomalies(&state).await?;
        Ok(CycleOutcome {
            alerts: anomalies.len(),
            recommendations: 0,
        })
    }

    pub async fn run_decision_cycle(&self) -> Result<CycleOutcome, PipelineError> {
        let state = self.source.snapshot().await;
        let recommendations = self.generate_recommendations(&state).await?;
        Ok(CycleOutcome {
            alerts: 0,
            recommendations: recommendations.len(),
        })
    }

    // ------------------------------------------------------------------
    // Anomaly detection
    // ------------------------------------------------------------------

    pub async fn evaluate_anomaly(
        &self,
        metric: MetricKind,
        value: f64,
    ) -> Result<Option<AnomalyAlert>, PipelineError> {
        let anomaly = self.anomaly.lock().await.evaluate_anomaly(metric, value);
        if let Some(anomaly) = &anomaly {
            if let Some(e) = self.forward_anomaly(anomaly).await {
                return Err(e.into());
            }
        }
        Ok(anomaly)
    }

    /// String-keyed entry point; unknown names fail with `InvalidMetric`
    pub async fn evaluate_anomaly_by_name(
        &self,
        metric: &str,
        value: f64,
    ) -> Result<Option<AnomalyAlert>, PipelineError> {
        let metric = MetricKind::from_str(metric)?;
        self.evaluate_anomaly(metric, value).await
    }

    pub async fn detect_anomalies(
        &self,
        state: &SettlementState,
    ) -> Result<Vec<AnomalyAlert>, PipelineError> {
        let anomalies = self.anomaly.lock().await.detect_anomalies(state);

        let mut failure = None;
        for anomaly in &anomalies {
            if let Some(e) = self.forward_anomaly(anomaly).await {
                failure = failure.or(Some(e));
            }
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(anomalies),
        }
    }

    pub async fn get_statistics(&self) -> BTreeMap<MetricKind, MetricStatistics> {
        self.anomaly.lock().await.get_statistics_rounded()
    }

    pub async fn statistics_for(&self, metric: &str) -> Result<MetricStatistics, PipelineError> {
        self.anomaly.lock().await.statistics_for(metric)
    }

    pub async fn reset_statistics(&self, metric: Option<MetricKind>) -> Result<(), PipelineError> {
        self.anomaly.lock().await.reset_statistics(metric);

        let scope = metric.map(|m| m.as_str()).unwrap_or("all");
        log::info!("🔄 Statistics reset: {}", scope);
        self.audit
            .record(&AuditRecord::system(
                "RESET_STATISTICS",
                "anomaly_detector",
                json!({ "metric": scope }),
            ))
            .await?;
        Ok(())
    }

    /// Store and audit one anomaly; both writes are attempted
    async fn forward_anomaly(&self, anomaly: &AnomalyAlert) -> Option<SinkError> {
        log::warn!("📈 {}", anomaly.alert.message);
        let mut failure = None;

        let stored = self.alert_store.append(&anomaly.alert).await;
        note_failure(&mut failure, "anomaly alert", stored);

        let audited = match to_details(&anomaly.evidence) {
            Ok(evidence) => {
                self.audit
                    .record(&AuditRecord::system(
                        "ANOMALY_DETECTED",
                        format!("alert/{}", anomaly.alert.id),
                        json!({
                            "metric": anomaly.metric.as_str(),
                            "severity": anomaly.alert.severity.as_str(),
                            "z_score": anomaly.z_score,
                            "confidence": anomaly.confidence,
                            "evidence": evidence,
                        }),
                    ))
                    .await
            }
            Err(e) => Err(e),
        };
        note_failure(&mut failure, "anomaly audit record", audited);

        failure
    }

    // ------------------------------------------------------------------
    // Safety + approvals
    // ------------------------------------------------------------------

    /// Run the safety monitor on `state` and forward what it raised
    ///
    /// The monitor stays locked until every output is forwarded, so a hazard
    /// that fails to reach the sinks is re-armed before the next evaluation.
    pub async fn check_safety(
        &self,
        state: &SettlementState,
    ) -> Result<(Vec<Alert>, Vec<Recommendation>), PipelineError> {
        let mut safety = self.safety.lock().await;
        let report = safety.check_safety(state);
        let mut failure = None;

        let raised = report
            .raised
            .iter()
            .zip(&report.alerts)
            .zip(&report.recommendations);
        for ((kind, alert), rec) in raised {
            if let Err(e) = self.forward_hazard(alert, rec).await {
                log::error!("❌ Failed to forward {} outputs: {}", kind, e);
                safety.rearm(*kind);
                failure = failure.or(Some(e));
            }
        }

        for kind in &report.cleared {
            let audited = self
                .audit
                .record(&AuditRecord::system(
                    "HAZARD_CLEARED",
                    "safety_monitor",
                    json!({ "hazard": kind.as_str() }),
                ))
                .await;
            note_failure(&mut failure, "hazard clearance", audited);
        }
        drop(safety);

        match failure {
            Some(e) => Err(e.into()),
            None => Ok((report.alerts, report.recommendations)),
        }
    }

    /// Stores first, then the audit trail; stops at the first failed write
    async fn forward_hazard(&self, alert: &Alert, rec: &Recommendation) -> Result<(), SinkError> {
        self.alert_store.append(alert).await?;
        self.recommendation_store.append(rec).await?;

        self.audit
            .record(&AuditRecord::system(
                "SAFETY_ALERT",
                format!("alert/{}", alert.id),
                to_details(alert)?,
            ))
            .await?;
        self.audit
            .record(&AuditRecord::new(
                Some("system"),
                "APPROVAL_REQUESTED",
                format!("recommendation/{}", rec.id),
                AuditStatus::Pending,
                json!({
                    "action": rec.action.as_str(),
                    "category": rec.category.as_str(),
                    "priority": rec.priority,
                    "title": rec.title,
                }),
            ))
            .await
    }

    pub async fn active_hazards(&self) -> Vec<HazardStatus> {
        self.safety.lock().await.active_hazards()
    }

    /// Approve a pending recommendation; the attempt is audited either way
    pub async fn approve(&self, recommendation_id: &Uuid, approved_by: &str) -> Result<bool, PipelineError> {
        let approved = self.approvals.approve(recommendation_id, approved_by);

        let status = if approved {
            log::info!("✅ Recommendation {} approved by {}", recommendation_id, approved_by);
            AuditStatus::Success
        } else {
            log::warn!(
                "⚠️  Approval of {} by {} rejected (unknown or already approved)",
                recommendation_id,
                approved_by
            );
            AuditStatus::Failure
        };

        self.audit
            .record(&AuditRecord::new(
                Some(approved_by),
                "APPROVE_RECOMMENDATION",
                format!("recommendation/{}", recommendation_id),
                status,
                json!({ "approved": approved }),
            ))
            .await?;

        Ok(approved)
    }

    pub fn pending_approvals(&self) -> Vec<PendingApproval> {
        self.approvals.list_pending()
    }

    pub fn approval_status(&self, recommendation_id: &Uuid) -> Option<PendingApproval> {
        self.approvals.status(recommendation_id)
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    pub async fn generate_recommendations(
        &self,
        state: &SettlementState,
    ) -> Result<Vec<Recommendation>, PipelineError> {
        let recommendations = self.decision.generate_recommendations(state);
        let mut failure = None;

        for rec in &recommendations {
            let stored = self.recommendation_store.append(rec).await;
            note_failure(&mut failure, "recommendation", stored);

            let audited = self
                .audit
                .record(&AuditRecord::system(
                    "RECOMMENDATION_GENERATED",
                    format!("recommendation/{}", rec.id),
                    json!({
                        "action": rec.action.as_str(),
                        "category": rec.category.as_str(),
                        "priority": rec.priority,
                        "impact": rec.impact.as_str(),
                    }),
                ))
                .await;
            note_failure(&mut failure, "recommendation audit record", audited);
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(recommendations),
        }
    }

    /// Filtered view; not forwarded to the stores
    pub fn recommendations_filtered(
        &self,
        state: &SettlementState,
        category: Option<RecommendationCategory>,
        min_priority: u8,
    ) -> Vec<Recommendation> {
        self.decision.generate_filtered(state, category, min_priority)
    }

    pub fn analyze(&self, state: &SettlementState) -> DecisionSummary {
        self.decision.analyze(state)
    }

    // ------------------------------------------------------------------
    // Store access
    // ------------------------------------------------------------------

    pub async fn alerts(&self, filter: &AlertFilter) -> Result<Vec<Alert>, PipelineError> {
        Ok(self.alert_store.query(filter).await?)
    }

    pub async fn resolve_alert(&self, id: &Uuid, user: &str) -> Result<bool, PipelineError> {
        let resolved = self.alert_store.resolve(id).await?;
        self.audit
            .record(&AuditRecord::new(
                Some(user),
                "RESOLVE_ALERT",
                format!("alert/{}", id),
                if resolved { AuditStatus::Success } else { AuditStatus::Failure },
                serde_json::Value::Null,
            ))
            .await?;
        Ok(resolved)
    }

    pub async fn recent_recommendations(&self, limit: usize) -> Result<Vec<Recommendation>, PipelineError> {
        Ok(self.recommendation_store.list_recent(limit).await?)
    }

    pub async fn audit_log(&self, limit: usize, offset: usize) -> Result<Vec<AuditRecord>, PipelineError> {
        Ok(self.audit.read_recent(limit, offset).await?)
    }

    pub fn approvals(&self) -> &Arc<ApprovalGate> {
        &self.approvals
    }
}

fn to_details<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, SinkError> {
    Ok(serde_json::to_value(value)?)
}

/// Log a failed write and keep the first one
fn note_failure(failure: &mut Option<SinkError>, what: &str, result: Result<(), SinkError>) {
    if let Err(e) = result {
        log::error!("❌ Failed to forward {}: {}", what, e);
        *failure = failure.take().or(Some(e));
    }
}
