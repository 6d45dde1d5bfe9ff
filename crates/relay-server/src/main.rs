//! `relay-server` binary entrypoint.
//!
//! Wires the in-memory reference backends (no external store is in scope —
//! see `relay-storage`'s crate doc) into one `Orchestrator`, mounts it behind
//! the axum router, and serves it. Grounded on `loom::serve::run_serve`'s
//! `TcpListener::bind` + `axum::serve` shape.

use std::sync::Arc;
use std::time::Instant;

use relay_audit::AuditLog;
use relay_config::{BackendKind, Settings};
use relay_kernel::KernelBuilder;
use relay_llm::echo::EchoProvider;
use relay_llm::provider::LlmProvider;
use relay_mcp::{McpClient, PluginRegistry};
use relay_oauth::OAuthClient;
use relay_runtime::{Orchestrator, UnconfiguredCodeToolExecutor};
use relay_server::app::AppState;
use relay_server::auth::BearerAsUserId;
use relay_storage::{InMemoryAuthStorage, InMemoryDiscoveryStore, InMemoryPluginCatalog, InMemoryTaskPersistence};
use relay_telemetry::{LogConfig, setup_logging};
use tokio::net::TcpListener;
use tracing::{info, warn};

fn warn_if_external(name: &str, backend: &BackendKind) {
    if matches!(backend, BackendKind::External { .. }) {
        warn!(backend = name, "external backend requested but not implemented; using the in-memory reference backend");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    setup_logging(&LogConfig::default());

    let settings = Settings::from_env()?;
    warn_if_external("persistence", &settings.persistence_backend);
    warn_if_external("auth_storage", &settings.auth_storage_backend);
    warn_if_external("mcp_discovery", &settings.mcp_discovery_backend);
    warn_if_external("plugin_catalog", &settings.plugin_catalog_backend);

    let tasks: Arc<dyn relay_storage::TaskPersistence> = Arc::new(InMemoryTaskPersistence::new());
    let auth_storage: Arc<dyn relay_storage::AuthStorage> = Arc::new(InMemoryAuthStorage::new());
    let discovery: Arc<dyn relay_storage::DiscoveryStore> = Arc::new(InMemoryDiscoveryStore::new());
    let catalog: Arc<dyn relay_storage::PluginCatalog> = Arc::new(InMemoryPluginCatalog::new());

    let oauth = Arc::new(OAuthClient::new(auth_storage.clone()));
    let mcp_client = Arc::new(McpClient::new(auth_storage, discovery.clone(), oauth.clone()));
    let registry = Arc::new(PluginRegistry::new(mcp_client.clone(), catalog.clone()));

    // No concrete model adapter ships with this crate (spec §1 Non-goals);
    // operators point `TA_API_KEY` at a real provider by swapping this line
    // for one of their own `LlmProvider` implementations.
    if settings.default_api_key.is_none() {
        warn!("TA_API_KEY is unset; serving with the deterministic echo model");
    }
    let llm: Arc<dyn LlmProvider> = Arc::new(EchoProvider::default());

    let kernel_builder = Arc::new(KernelBuilder::new(llm, registry, catalog.clone()));
    let audit = Arc::new(AuditLog::new());
    let code_tools = Arc::new(UnconfiguredCodeToolExecutor);

    let orchestrator = Arc::new(Orchestrator::new(tasks, kernel_builder, mcp_client, catalog, discovery, code_tools, audit.clone()));

    let mcp_servers = load_mcp_servers(&settings);

    let state = Arc::new(AppState {
        orchestrator,
        oauth,
        audit,
        authorizer: Arc::new(BearerAsUserId),
        started_at: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        oauth_redirect_uri: settings.oauth_redirect_uri.clone(),
        local_plugin_ids: Vec::new(),
        mcp_servers,
    });

    let app = relay_server::app::router(state);

    let addr = std::env::var("TA_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "relay-server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// `TA_SERVICE_CONFIG` in the source system points at a deployment's
/// multi-server MCP config file; parsing that format is out of scope here
/// (spec §1 Non-goals), so this server starts with no MCP servers configured
/// unless a future deployment wires them in before `main` builds `AppState`.
fn load_mcp_servers(settings: &Settings) -> Vec<relay_mcp::McpServerConfig> {
    if settings.service_config_path.is_some() {
        warn!("TA_SERVICE_CONFIG is set but config-file parsing is not implemented; starting with no MCP servers");
    }
    Vec::new()
}
