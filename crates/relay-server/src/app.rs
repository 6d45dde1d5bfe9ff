//! Axum app: shared state and router (spec §6.1).
//!
//! Grounded on `loom::serve::app`'s `AppState`/`router` shape (teacher repo
//! carries no HTTP framework; axum is adopted here from the pack for C14,
//! the one component this spec needs an HTTP stack for — see DESIGN.md).

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::{get, post};
use relay_audit::AuditLog;
use relay_mcp::McpServerConfig;
use relay_oauth::OAuthClient;
use relay_runtime::Orchestrator;

use crate::auth::RequestAuthorizer;
use crate::handlers::{health, invoke, oauth, resume};

/// Everything one request needs beyond the `Orchestrator` itself. `{name}/{ver}`
/// in the invoke/resume routes addresses a deployment in the source system's
/// multi-tenant config file; this single-process server runs one fixed
/// deployment, so those path segments are accepted (and logged) without
/// selecting among alternatives.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub oauth: Arc<OAuthClient>,
    pub audit: Arc<AuditLog>,
    pub authorizer: Arc<dyn RequestAuthorizer>,
    pub started_at: Instant,
    pub version: String,
    pub oauth_redirect_uri: Option<String>,
    pub local_plugin_ids: Vec<String>,
    pub mcp_servers: Vec<McpServerConfig>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/:name/:ver/invoke", post(invoke::invoke))
        .route("/:name/:ver/invoke/stream", post(invoke::invoke_stream))
        .route("/:name/:ver/resume/:task_id", post(resume::resume))
        .route("/oauth/:server/authorize", get(oauth::authorize))
        .route("/oauth/:server/callback", get(oauth::callback))
        .route("/health", get(health::health))
        .with_state(state)
}
