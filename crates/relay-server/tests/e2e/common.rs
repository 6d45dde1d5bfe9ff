//! Shared e2e helpers: spin up a real server on an ephemeral port, wired the
//! same way `main` wires it (in-memory backends, `EchoProvider`), and hand
//! back a base URL a `reqwest::Client` can hit directly.

use std::sync::Arc;
use std::time::Instant;

use relay_audit::AuditLog;
use relay_kernel::KernelBuilder;
use relay_llm::echo::EchoProvider;
use relay_llm::provider::LlmProvider;
use relay_mcp::{McpClient, PluginRegistry};
use relay_oauth::OAuthClient;
use relay_runtime::{Orchestrator, UnconfiguredCodeToolExecutor};
use relay_server::app::{AppState, router};
use relay_server::auth::BearerAsUserId;
use relay_storage::{InMemoryAuthStorage, InMemoryDiscoveryStore, InMemoryPluginCatalog, InMemoryTaskPersistence};
use tokio::net::TcpListener;

pub async fn spawn_server() -> (String, tokio::task::JoinHandle<()>) {
    let tasks: Arc<dyn relay_storage::TaskPersistence> = Arc::new(InMemoryTaskPersistence::new());
    let auth_storage: Arc<dyn relay_storage::AuthStorage> = Arc::new(InMemoryAuthStorage::new());
    let discovery: Arc<dyn relay_storage::DiscoveryStore> = Arc::new(InMemoryDiscoveryStore::new());
    let catalog: Arc<dyn relay_storage::PluginCatalog> = Arc::new(InMemoryPluginCatalog::new());

    let oauth = Arc::new(OAuthClient::new(auth_storage.clone()));
    let mcp_client = Arc::new(McpClient::new(auth_storage, discovery.clone(), oauth.clone()));
    let registry = Arc::new(PluginRegistry::new(mcp_client.clone(), catalog.clone()));
    let llm: Arc<dyn LlmProvider> = Arc::new(EchoProvider::default());
    let kernel_builder = Arc::new(KernelBuilder::new(llm, registry, catalog.clone()));
    let audit = Arc::new(AuditLog::new());
    let code_tools = Arc::new(UnconfiguredCodeToolExecutor);

    let orchestrator = Arc::new(Orchestrator::new(tasks, kernel_builder, mcp_client, catalog, discovery, code_tools, audit.clone()));

    let state = Arc::new(AppState {
        orchestrator,
        oauth,
        audit,
        authorizer: Arc::new(BearerAsUserId),
        started_at: Instant::now(),
        version: "test".to_string(),
        oauth_redirect_uri: Some("https://relay.example".to_string()),
        local_plugin_ids: Vec::new(),
        mcp_servers: Vec::new(),
    });

    let app = router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), handle)
}
