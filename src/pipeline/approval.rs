//! Human approval gate for critical recommendations
//!
//! Entries are created by the safety monitor and approved from an external
//! request path. The check-and-set on `approved` happens under one lock so
//! concurrent approvals of the same id cannot both succeed.
//!
//! The gate keeps at most `capacity` entries. Approved entries are evicted
//! first (oldest request first); a pending entry is only dropped when every
//! retained entry is still pending.

use super::types::{PendingApproval, Recommendation};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Entries retained by default
pub const DEFAULT_APPROVAL_CAPACITY: usize = 1_000;

#[derive(Debug)]
pub struct ApprovalGate {
    entries: Mutex<HashMap<Uuid, PendingApproval>>,
    capacity: usize,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_APPROVAL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Uuid, PendingApproval>> {
        // A panic while holding the lock cannot leave a half-written entry
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the pending entry paired with a critical recommendation
    pub fn register(&self, recommendation: &Recommendation) -> PendingApproval {
        let entry = PendingApproval {
            recommendation_id: recommendation.id,
            action_id: recommendation.action,
            category: recommendation.category,
            title: recommendation.title.clone(),
            description: recommendation.description.clone(),
            requested_at: recommendation.timestamp,
            approved: false,
            approved_by: None,
            approved_at: None,
        };

        let mut entries = self.entries();
        entries.insert(entry.recommendation_id, entry.clone());
        while entries.len() > self.capacity {
            if !evict_oldest(&mut entries) {
                break;
            }
        }
        entry
    }

    /// Drop an entry that has not been approved yet
    ///
    /// Returns the withdrawn entry; approved entries are left in place.
    pub fn withdraw(&self, recommendation_id: &Uuid) -> Option<PendingApproval> {
        let mut entries = self.entries();
        match entries.get(recommendation_id) {
            Some(entry) if !entry.approved => entries.remove(recommendation_id),
            _ => None,
        }
    }

    /// Approve a pending recommendation
    ///
    /// Returns false if the id is unknown or already approved; in that case
    /// the stored record (including `approved_at`) is left untouched.
    pub fn approve(&self, recommendation_id: &Uuid, approved_by: &str) -> bool {
        self.approve_at(recommendation_id, approved_by, Utc::now())
    }

    pub fn approve_at(
        &self,
        recommendation_id: &Uuid,
        approved_by: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let mut entries = self.entries();
        match entries.get_mut(recommendation_id) {
            Some(entry) if !entry.approved => {
                entry.approved = true;
                entry.approved_by = Some(approved_by.to_string());
                entry.approved_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// All entries still awaiting approval, oldest request first
    pub fn list_pending(&self) -> Vec<PendingApproval> {
        let mut pending: Vec<PendingApproval> = self
            .entries()
            .values()
            .filter(|e| !e.approved)
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.requested_at);
        pending
    }

    pub fn status(&self, recommendation_id: &Uuid) -> Option<PendingApproval> {
        self.entries().get(recommendation_id).cloned()
    }

    pub fn is_approved(&self, recommendation_id: &Uuid) -> bool {
        self.entries()
            .get(recommendation_id)
            .map(|e| e.approved)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

fn evict_oldest(entries: &mut HashMap<Uuid, PendingApproval>) -> bool {
    let oldest = |approved: bool| {
        entries
            .values()
            .filter(|e| e.approved == approved)
            .min_by_key(|e| e.requested_at)
            .map(|e| e.recommendation_id)
    };

    let victim = match oldest(true) {
        Some(id) => id,
        None => match oldest(false) {
            Some(id) => {
                log::warn!("⚠️  Approval gate full, dropping pending request {}", id);
                id
            }
            None => return false,
        },
    };
    entries.remove(&victim).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{Action, Impact, RecommendationCategory};
    use chrono::Duration;
    use std::sync::Arc;

    fn critical_rec(action: Action, at: DateTime<Utc>) -> Recommendation {
        Recommendation {
            id: Uuid::new_v4(),
            timestamp: at,
            priority: 10,
            category: RecommendationCategory::Pressure,
            action,
            title: "Isolate Compartments".to_string(),
            description: "Pressure leak detected".to_string(),
            reasoning: String::new(),
            current_value: 0.0,
            threshold_value: 0.0,
            impact: Impact::Critical,
            estimated_effect: String::new(),
            confidence: 0.9,
            requires_approval: true,
        }
    }

    #[test]
    fn test_register_and_list_pending() {
        let gate = ApprovalGate::new();
        let now = Utc::now();
        let later = critical_rec(Action::IsolateCompartments, now + Duration::seconds(5));
        let earlier = critical_rec(Action::ImmediateEvacuation, now);

        gate.register(&later);
        gate.register(&earlier);

        let pending = gate.list_pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].recommendation_id, earlier.id);
        assert_eq!(pending[0].action_id, Action::ImmediateEvacuation);
        assert!(!pending[0].approved);
    }

    #[test]
    fn test_approve_unknown_id_fails() {
        let gate = ApprovalGate::new();
        assert!(!gate.approve(&Uuid::new_v4(), "commander"));
        assert!(gate.status(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_double_approval_keeps_first_timestamp() {
        let gate = ApprovalGate::new();
        let rec = critical_rec(Action::IsolateCompartments, Utc::now());
        gate.register(&rec);

        let first = Utc::now();
        assert!(gate.approve_at(&rec.id, "commander", first));
        assert!(!gate.approve_at(&rec.id, "engineer", first + Duration::seconds(30)));

        let status = gate.status(&rec.id).unwrap();
        assert!(status.approved);
        assert_eq!(status.approved_by.as_deref(), Some("commander"));
        assert_eq!(status.approved_at, Some(first));
        assert!(gate.list_pending().is_empty());
        assert!(gate.is_approved(&rec.id));
    }

    #[test]
    fn test_withdraw_only_touches_unapproved_entries() {
        let gate = ApprovalGate::new();
        let pending = critical_rec(Action::IsolateCompartments, Utc::now());
        let approved = critical_rec(Action::ImmediateEvacuation, Utc::now());
        gate.register(&pending);
        gate.register(&approved);
        assert!(gate.approve(&approved.id, "commander"));

        assert!(gate.withdraw(&pending.id).is_some());
        assert!(gate.withdraw(&approved.id).is_none());
        assert!(gate.withdraw(&Uuid::new_v4()).is_none());
        assert_eq!(gate.len(), 1);
        assert!(gate.is_approved(&approved.id));
    }

    #[test]
    fn test_capacity_evicts_approved_before_pending() {
        let gate = ApprovalGate::with_capacity(3);
        let now = Utc::now();
        let recs: Vec<_> = (0..3)
            .map(|i| critical_rec(Action::IsolateCompartments, now + Duration::seconds(i)))
            .collect();
        for rec in &recs {
            gate.register(rec);
        }
        // the newest one is approved; it still goes first
        assert!(gate.approve(&recs[2].id, "commander"));

        let extra = critical_rec(Action::ActivateStormShelter, now + Duration::seconds(10));
        gate.register(&extra);
        assert_eq!(gate.len(), 3);
        assert!(gate.status(&recs[2].id).is_none());
        assert!(gate.status(&recs[0].id).is_some());

        // all pending now: the oldest request is dropped
        let last = critical_rec(Action::ActivateStormShelter, now + Duration::seconds(20));
        gate.register(&last);
        assert_eq!(gate.len(), 3);
        assert!(gate.status(&recs[0].id).is_none());
        assert!(gate.status(&last.id).is_some());
    }

    #[test]
    fn test_concurrent_approvals_succeed_exactly_once() {
        let gate = Arc::new(ApprovalGate::new());
        let rec = critical_rec(Action::ActivateStormShelter, Utc::now());
        gate.register(&rec);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let gate = gate.clone();
                let id = rec.id;
                std::thread::spawn(move || gate.approve(&id, &format!("operator-{}", i)))
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
    }
}
