//! Output sinks: alert store, recommendation store and audit sink
//!
//! Every sink is append-only from the pipeline's point of view. Writes may
//! come from several cycles at once; each write is atomic, ordering across
//! sinks is not guaranteed.
//!
//! The in-memory implementations are bounded: once full, each append drops
//! the oldest entry.

use super::error::SinkError;
use super::types::{Alert, AlertSeverity, Recommendation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Query parameters for the alert store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertFilter {
    pub severity: Option<AlertSeverity>,
    pub system: Option<String>,
    pub resolved: Option<bool>,
    pub limit: Option<usize>,
}

impl AlertFilter {
    fn matches(&self, alert: &Alert) -> bool {
        self.severity.map_or(true, |s| alert.severity == s)
            && self.system.as_deref().map_or(true, |s| alert.system == s)
            && self.resolved.map_or(true, |r| alert.resolved == r)
    }
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn append(&self, alert: &Alert) -> Result<(), SinkError>;

    /// Matching alerts, newest first
    async fn query(&self, filter: &AlertFilter) -> Result<Vec<Alert>, SinkError>;

    async fn get(&self, id: &Uuid) -> Result<Option<Alert>, SinkError>;

    /// Mark an alert resolved; returns false for an unknown id
    async fn resolve(&self, id: &Uuid) -> Result<bool, SinkError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn append(&self, recommendation: &Recommendation) -> Result<(), SinkError>;

    /// Most recent recommendations, newest first
    async fn list_recent(&self, limit: usize) -> Result<Vec<Recommendation>, SinkError>;

    fn backend_type(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Failure,
    Pending,
}

/// One structured audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub user: Option<String>,
    pub action: String,
    pub resource: String,
    pub status: AuditStatus,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl AuditRecord {
    pub fn new(
        user: Option<&str>,
        action: impl Into<String>,
        resource: impl Into<String>,
        status: AuditStatus,
        details: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user: user.map(str::to_string),
            action: action.into(),
            resource: resource.into(),
            status,
            details,
        }
    }

    /// System-originated entry (no user)
    pub fn system(
        action: impl Into<String>,
        resource: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::new(Some("system"), action, resource, AuditStatus::Success, details)
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record; completes before returning
    async fn record(&self, record: &AuditRecord) -> Result<(), SinkError>;

    /// Records newest first, skipping `offset`
    async fn read_recent(&self, limit: usize, offset: usize) -> Result<Vec<AuditRecord>, SinkError>;

    async fn count(&self) -> Result<usize, SinkError>;

    fn backend_type(&self) -> &'static str;
}

/// Default entries kept by each in-memory store
pub const DEFAULT_STORE_CAPACITY: usize = 1_000;
/// Default records kept by the in-memory audit sink
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

fn push_bounded<T>(entries: &mut VecDeque<T>, item: T, capacity: usize) {
    entries.push_back(item);
    while entries.len() > capacity {
        entries.pop_front();
    }
}

#[derive(Debug)]
pub struct InMemoryAlertStore {
    alerts: RwLock<VecDeque<Alert>>,
    capacity: usize,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            alerts: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryAlertStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn append(&self, alert: &Alert) -> Result<(), SinkError> {
        push_bounded(&mut *self.alerts.write().await, alert.clone(), self.capacity);
        Ok(())
    }

    async fn query(&self, filter: &AlertFilter) -> Result<Vec<Alert>, SinkError> {
        let alerts = self.alerts.read().await;
        let mut matched: Vec<Alert> = alerts.iter().filter(|a| filter.matches(a)).cloned().collect();

        // Stable sort keeps insertion order for identical timestamps; reverse it
        // so the most recently appended comes first
        matched.reverse();
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Alert>, SinkError> {
        Ok(self.alerts.read().await.iter().find(|a| a.id == *id).cloned())
    }

    async fn resolve(&self, id: &Uuid) -> Result<bool, SinkError> {
        let mut alerts = self.alerts.write().await;
        match alerts.iter_mut().find(|a| a.id == *id) {
            Some(alert) => {
                alert.resolved = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn backend_type(&self) -> &'static str {
        "MEMORY"
    }
}

#[derive(Debug)]
pub struct InMemoryRecommendationStore {
    recommendations: RwLock<VecDeque<Recommendation>>,
    capacity: usize,
}

impl InMemoryRecommendationStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            recommendations: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryRecommendationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecommendationStore for InMemoryRecommendationStore {
    async fn append(&self, recommendation: &Recommendation) -> Result<(), SinkError> {
        push_bounded(
            &mut *self.recommendations.write().await,
            recommendation.clone(),
            self.capacity,
        );
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Recommendation>, SinkError> {
        let recs = self.recommendations.read().await;
        Ok(recs.iter().rev().take(limit).cloned().collect())
    }

    fn backend_type(&self) -> &'static str {
        "MEMORY"
    }
}

#[derive(Debug)]
pub struct InMemoryAuditSink {
    records: RwLock<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Retained records in append order
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.iter().cloned().collect()
    }
}

impl Default for InMemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), SinkError> {
        push_bounded(&mut *self.records.write().await, record.clone(), self.capacity);
        Ok(())
    }

    async fn read_recent(&self, limit: usize, offset: usize) -> Result<Vec<AuditRecord>, SinkError> {
        let records = self.records.read().await;
        Ok(records.iter().rev().skip(offset).take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<usize, SinkError> {
        Ok(self.records.read().await.len())
    }

    fn backend_type(&self) -> &'static str {
        "MEMORY"
    }
}
