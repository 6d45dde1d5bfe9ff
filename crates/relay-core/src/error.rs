//! Shared error variants (spec §7). Each `relay-*` crate defines its own
//! `thiserror` enum for crate-local failures; this one covers the outcomes
//! that cross component boundaries and need a single shape the HTTP surface
//! can map to a status code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Platform authorizer rejected the request, or returned no principal.
    #[error("authentication failed")]
    Authentication,

    /// The caller is not the owner of the referenced task.
    #[error("task {task_id} is not owned by the requesting user")]
    NotOwner { task_id: String },

    /// No task exists for the given id.
    #[error("task {task_id} not found")]
    TaskNotFound { task_id: String },

    /// The task is not in a state the requested operation accepts.
    #[error("task {task_id} is in terminal or unexpected state for this operation")]
    InvalidTaskState { task_id: String },

    #[error("create failed: {0}")]
    Create(String),

    #[error("load failed: {0}")]
    Load(String),

    #[error("update failed: {0}")]
    Update(String),

    #[error("delete failed: {0}")]
    Delete(String),

    #[error("token endpoint rejected scopes: {0:?}")]
    UnauthorizedScopes(Vec<String>),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("agent invocation failed: {0}")]
    AgentInvoke(String),

    #[error("plugin catalog definition error: {0}")]
    PluginCatalogDefinition(String),
}

pub type RelayResult<T> = Result<T, RelayError>;
