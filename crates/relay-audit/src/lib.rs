//! Append-only audit log for HITL and OAuth decisions.
//!
//! Grounded on `astrid-audit::entry`'s `AuditEntry` shape, but simplified
//! (SPEC_FULL.md §9c): no cryptographic hash-chaining or signing, since the
//! threat model this spec assumes ("all requests originate from a trusted
//! HTTP front-end") doesn't posit local tampering with the audit store.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use relay_core::ids::{SessionId, TaskId, UserId};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Allowed,
    Denied(String),
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub action: String,
    pub outcome: AuditOutcome,
}

#[derive(Debug, Default)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: AuditEntry) {
        info!(
            task_id = %entry.task_id,
            session_id = %entry.session_id,
            user_id = %entry.user_id,
            action = %entry.action,
            outcome = ?entry.outcome,
            "audit"
        );
        self.entries.write().expect("audit log lock poisoned").push(entry);
    }

    pub fn for_task(&self, task_id: &TaskId) -> Vec<AuditEntry> {
        self.entries
            .read()
            .expect("audit log lock poisoned")
            .iter()
            .filter(|e| &e.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("audit log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_filter_by_task() {
        let log = AuditLog::new();
        log.append(AuditEntry {
            timestamp: Utc::now(),
            task_id: TaskId::new("t1"),
            session_id: SessionId::new("s1"),
            user_id: UserId::new("u1"),
            action: "hitl_check".to_string(),
            outcome: AuditOutcome::Allowed,
        });
        log.append(AuditEntry {
            timestamp: Utc::now(),
            task_id: TaskId::new("t2"),
            session_id: SessionId::new("s1"),
            user_id: UserId::new("u1"),
            action: "hitl_check".to_string(),
            outcome: AuditOutcome::Denied("untrusted".to_string()),
        });
        assert_eq!(log.len(), 2);
        assert_eq!(log.for_task(&TaskId::new("t1")).len(), 1);
    }
}
