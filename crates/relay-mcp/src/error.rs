use thiserror::Error;

/// Raised by C6/C8 pre-flight when an MCP server requires OAuth the caller
/// hasn't completed yet (spec §4.4, §4.6, §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("auth required for server {server_name}")]
pub struct AuthRequiredError {
    pub server_name: String,
    pub auth_server: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Error)]
pub enum McpError {
    #[error("invalid server config: {0}")]
    InvalidConfig(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    AuthRequired(#[from] AuthRequiredError),

    #[error("mcp session expired")]
    SessionExpired,

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("storage error: {0}")]
    Storage(#[from] relay_storage::StorageError),

    #[error("oauth error: {0}")]
    OAuth(#[from] relay_oauth::OAuthError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type McpResult<T> = Result<T, McpError>;

pub fn auth_required(server_name: &str, auth_server: &str, scopes: &[String]) -> AuthRequiredError {
    AuthRequiredError {
        server_name: server_name.to_string(),
        auth_server: auth_server.to_string(),
        scopes: scopes.to_vec(),
    }
}

/// Aggregates multiple per-server `AuthRequiredError`s raised during C8
/// preflight into the single `AuthChallengeResponse` the orchestrator needs.
pub fn aggregate_auth_required(errors: Vec<AuthRequiredError>) -> Vec<relay_core::signal::AuthChallenge> {
    errors
        .into_iter()
        .map(|e| relay_core::signal::AuthChallenge {
            server_name: e.server_name,
            auth_server: e.auth_server,
            scopes: e.scopes,
            auth_url: String::new(),
        })
        .collect()
}
