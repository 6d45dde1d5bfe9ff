//! Discovery Store (C4, spec §3 `DiscoveryState`).
//!
//! Scoped to `(user_id, session_id)`; writes are guarded by a per-session
//! lock (spec §5). Grounded structurally on `astrid-mcp::registry`'s
//! per-session materialization bookkeeping.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use relay_core::ids::{ElicitationId, SessionId, UserId};
use relay_core::signal::PendingElicitation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::StorageResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpSessionHandle {
    pub mcp_session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerDiscovery {
    pub plugin_data: Value,
    pub session: Option<McpSessionHandle>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryState {
    pub discovered_servers: HashMap<String, ServerDiscovery>,
    pub discovery_completed: bool,
    pub failed_servers: HashMap<String, String>,
    pub pending_elicitations: HashMap<ElicitationId, PendingElicitation>,
}

#[async_trait]
pub trait DiscoveryStore: Send + Sync {
    async fn get(&self, user_id: &UserId, session_id: &SessionId) -> StorageResult<DiscoveryState>;

    async fn mutate(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        f: Box<dyn for<'r> FnOnce(&'r mut DiscoveryState) + Send + 'static>,
    ) -> StorageResult<()>;

    /// Clears an MCP session id only if it still matches `expected` — avoids
    /// clobbering a concurrently-established newer session (spec §5).
    async fn clear_session_if_matches(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        server_name: &str,
        expected: &str,
    ) -> StorageResult<bool>;
}

#[derive(Debug, Default)]
pub struct InMemoryDiscoveryStore {
    states: DashMap<(UserId, SessionId), Mutex<DiscoveryState>>,
}

impl InMemoryDiscoveryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DiscoveryStore for InMemoryDiscoveryStore {
    async fn get(&self, user_id: &UserId, session_id: &SessionId) -> StorageResult<DiscoveryState> {
        let entry = self
            .states
            .entry((user_id.clone(), session_id.clone()))
            .or_insert_with(|| Mutex::new(DiscoveryState::default()));
        let guard = entry.lock().await;
        Ok(guard.clone())
    }

    async fn mutate(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        f: Box<dyn for<'r> FnOnce(&'r mut DiscoveryState) + Send + 'static>,
    ) -> StorageResult<()> {
        let entry = self
            .states
            .entry((user_id.clone(), session_id.clone()))
            .or_insert_with(|| Mutex::new(DiscoveryState::default()));
        let mut guard = entry.lock().await;
        f(&mut guard);
        Ok(())
    }

    async fn clear_session_if_matches(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        server_name: &str,
        expected: &str,
    ) -> StorageResult<bool> {
        let Some(entry) = self.states.get(&(user_id.clone(), session_id.clone())) else {
            return Ok(false);
        };
        let mut guard = entry.lock().await;
        if let Some(server) = guard.discovered_servers.get_mut(server_name) {
            if let Some(session) = &server.session {
                if session.mcp_session_id == expected {
                    server.session = None;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}
