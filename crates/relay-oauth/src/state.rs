//! OAuth flow state store (spec §3 "OAuth flow state", §4.5, §5).
//!
//! Grounded on `original_source/.../auth/oauth_state_manager.py`'s
//! `OAuthStateManager`: stores under both `(user_id, state)` and `state`
//! alone so the callback endpoint can look the flow up before it knows the
//! user, while CSRF validation still requires the `user_id` match.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use relay_core::ids::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OAuthFlowState {
    pub state: String,
    pub verifier: String,
    pub user_id: UserId,
    pub server_name: String,
    pub resource: Option<String>,
    pub scopes: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl OAuthFlowState {
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now >= self.created_at + ttl
    }
}

/// Default TTL per spec §3: 300 seconds.
pub const DEFAULT_FLOW_STATE_TTL: Duration = Duration::seconds(300);

#[derive(Debug, Default)]
pub struct OAuthStateManager {
    by_state: DashMap<String, OAuthFlowState>,
    ttl: std::sync::RwLock<Duration>,
}

impl OAuthStateManager {
    pub fn new() -> Self {
        Self {
            by_state: DashMap::new(),
            ttl: std::sync::RwLock::new(DEFAULT_FLOW_STATE_TTL),
        }
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            by_state: DashMap::new(),
            ttl: std::sync::RwLock::new(ttl),
        }
    }

    fn ttl(&self) -> Duration {
        *self.ttl.read().expect("ttl lock poisoned")
    }

    /// Persists the flow under `state`; both lookup paths (by `state` alone,
    /// or by `(user_id, state)`) hit this same record (spec §6.3).
    pub fn store(&self, flow: OAuthFlowState) {
        self.by_state.insert(flow.state.clone(), flow);
    }

    /// Callback path: retrieve by `state` alone, with no CSRF user check yet.
    pub fn retrieve_by_state_only(&self, state: &str) -> Option<OAuthFlowState> {
        self.retrieve_if_fresh(state)
    }

    /// CSRF-protected retrieval: validates expiry and that `flow.user_id ==
    /// user_id`. An expired or missing record, or a user mismatch, deletes
    /// the state and returns `None` (spec §4.5 step 1, §8.7).
    pub fn retrieve(&self, state: &str, user_id: &UserId) -> Option<OAuthFlowState> {
        let flow = self.retrieve_if_fresh(state)?;
        if &flow.user_id != user_id {
            self.by_state.remove(state);
            return None;
        }
        Some(flow)
    }

    fn retrieve_if_fresh(&self, state: &str) -> Option<OAuthFlowState> {
        let flow = self.by_state.get(state)?.clone();
        if flow.is_expired(self.ttl(), Utc::now()) {
            self.by_state.remove(state);
            return None;
        }
        Some(flow)
    }

    pub fn delete(&self, state: &str) {
        self.by_state.remove(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(state: &str, user: &str) -> OAuthFlowState {
        OAuthFlowState {
            state: state.to_string(),
            verifier: "verifier".to_string(),
            user_id: UserId::new(user),
            server_name: "github".to_string(),
            resource: Some("https://mcp.example".to_string()),
            scopes: vec!["repo".to_string()],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn retrieves_by_state_only_for_callback() {
        let mgr = OAuthStateManager::new();
        mgr.store(flow("s1", "u1"));
        assert!(mgr.retrieve_by_state_only("s1").is_some());
    }

    #[test]
    fn csrf_retrieval_rejects_user_mismatch_and_deletes() {
        let mgr = OAuthStateManager::new();
        mgr.store(flow("s1", "u1"));
        assert!(mgr.retrieve("s1", &UserId::new("attacker")).is_none());
        assert!(mgr.retrieve("s1", &UserId::new("u1")).is_none());
    }

    #[test]
    fn expired_flow_is_treated_as_missing_and_deleted() {
        let mgr = OAuthStateManager::with_ttl(Duration::seconds(-1));
        mgr.store(flow("s1", "u1"));
        assert!(mgr.retrieve_by_state_only("s1").is_none());
        assert!(mgr.by_state.is_empty());
    }

    #[test]
    fn two_concurrent_flows_for_the_same_user_get_distinct_states() {
        let mgr = OAuthStateManager::new();
        mgr.store(flow("s1", "u1"));
        mgr.store(flow("s2", "u1"));
        assert!(mgr.retrieve("s1", &UserId::new("u1")).is_some());
        assert!(mgr.retrieve("s2", &UserId::new("u1")).is_some());
    }
}
