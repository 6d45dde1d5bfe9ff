//! Kernel Builder (C9).
//!
//! Composes an LLM client, statically-catalogued local plugins, and the
//! per-session set of MCP-discovered plugins (via C8's `PluginRegistry`)
//! into one `Kernel` the Task Orchestrator drives a turn with. Grounded on
//! `astrid-runtime::runtime::AgentRuntime::new`'s construction sequence,
//! adapted: this crate drops the teacher's workspace-boundary, hook-manager,
//! and sub-agent-pool fields, none of which this system's tool set needs.

use std::sync::Arc;

use relay_core::ids::{SessionId, UserId};
use relay_core::plugin::PluginTool;
use relay_llm::provider::LlmProvider;
use relay_mcp::{McpServerConfig, PluginRegistry};
use relay_storage::catalog::{PluginCatalog, mcp_plugin_id};
use tracing::warn;

use crate::error::{KernelError, KernelResult};

/// The composed tool set and model client for one turn. Cheap to construct
/// per-turn: it borrows the shared catalog/registry rather than owning a
/// private copy.
pub struct Kernel {
    pub llm: Arc<dyn LlmProvider>,
    pub catalog: Arc<dyn PluginCatalog>,
    pub tools: Vec<PluginTool>,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("llm", &self.llm.name())
            .field("tools", &self.tools)
            .finish_non_exhaustive()
    }
}

pub struct KernelBuilder {
    llm: Arc<dyn LlmProvider>,
    registry: Arc<PluginRegistry>,
    catalog: Arc<dyn PluginCatalog>,
}

impl KernelBuilder {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        registry: Arc<PluginRegistry>,
        catalog: Arc<dyn PluginCatalog>,
    ) -> Self {
        Self {
            llm,
            registry,
            catalog,
        }
    }

    /// Builds a kernel for one turn. `local_plugin_ids` names statically
    /// catalogued (non-MCP) plugins to include; `mcp_servers` is the set of
    /// MCP servers configured for this deployment, which C8 materializes
    /// fresh for this `(user_id, session_id)` before tool assembly.
    ///
    /// Returns `KernelError::AuthRequired` with every pending challenge
    /// aggregated across servers (spec §4.9 step 3) rather than failing on
    /// the first one, so the orchestrator can surface one combined
    /// `AuthChallengeResponse`.
    pub async fn build(
        &self,
        user_id: &UserId,
        session_id: &SessionId,
        local_plugin_ids: &[String],
        mcp_servers: &[McpServerConfig],
    ) -> KernelResult<Kernel> {
        let auth_required = self
            .registry
            .materialize(mcp_servers, user_id, session_id)
            .await;
        if !auth_required.is_empty() {
            return Err(KernelError::AuthRequired(auth_required));
        }

        let mut tools = Vec::new();

        for plugin_id in local_plugin_ids {
            match self.catalog.get_plugin(plugin_id).await {
                Some(plugin) => tools.extend(plugin.tools),
                None => return Err(KernelError::UnknownLocalPlugin(plugin_id.clone())),
            }
        }

        for server in mcp_servers {
            let plugin_id = mcp_plugin_id(&server.name);
            match self.catalog.get_plugin(&plugin_id).await {
                Some(plugin) => tools.extend(plugin.tools),
                None => warn!(server = %server.name, "mcp server materialized no catalog plugin"),
            }
        }

        Ok(Kernel {
            llm: self.llm.clone(),
            catalog: self.catalog.clone(),
            tools,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::governance::Governance;
    use relay_core::plugin::{Plugin, PluginType};
    use relay_llm::echo::EchoProvider;
    use relay_oauth::OAuthClient;
    use relay_storage::{InMemoryAuthStorage, InMemoryDiscoveryStore, InMemoryPluginCatalog};

    fn builder(catalog: Arc<dyn PluginCatalog>) -> KernelBuilder {
        let auth_storage = Arc::new(InMemoryAuthStorage::new());
        let discovery = Arc::new(InMemoryDiscoveryStore::new());
        let oauth = Arc::new(OAuthClient::new(auth_storage.clone()));
        let mcp_client = Arc::new(relay_mcp::McpClient::new(auth_storage, discovery, oauth));
        let registry = Arc::new(PluginRegistry::new(mcp_client, catalog.clone()));
        let llm: Arc<dyn LlmProvider> = Arc::new(EchoProvider::default());
        KernelBuilder::new(llm, registry, catalog)
    }

    #[tokio::test]
    async fn build_includes_local_plugin_tools() {
        let catalog: Arc<dyn PluginCatalog> = Arc::new(InMemoryPluginCatalog::new());
        catalog
            .register_dynamic_plugin(Plugin {
                plugin_id: "shell_plugin".to_string(),
                name: "shell_plugin".to_string(),
                version: "1.0.0".to_string(),
                owner: "core".to_string(),
                plugin_type: PluginType::Code,
                tools: vec![PluginTool {
                    tool_id: "shell_plugin-ShellCommand".to_string(),
                    name: "ShellCommand".to_string(),
                    description: String::new(),
                    governance: Governance::unknown(),
                    auth: None,
                }],
            })
            .await
            .unwrap();

        let builder = builder(catalog);
        let kernel = builder
            .build(
                &UserId::new("u1"),
                &SessionId::new("s1"),
                &["shell_plugin".to_string()],
                &[],
            )
            .await
            .unwrap();
        assert_eq!(kernel.tools.len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_local_plugin_is_an_error() {
        let catalog: Arc<dyn PluginCatalog> = Arc::new(InMemoryPluginCatalog::new());
        let builder = builder(catalog);
        let result = builder
            .build(
                &UserId::new("u1"),
                &SessionId::new("s1"),
                &["nonexistent".to_string()],
                &[],
            )
            .await;
        assert!(matches!(result, Err(KernelError::UnknownLocalPlugin(_))));
    }

    #[tokio::test]
    async fn mcp_server_needing_auth_surfaces_as_kernel_error() {
        let catalog: Arc<dyn PluginCatalog> = Arc::new(InMemoryPluginCatalog::new());
        let builder = builder(catalog);
        let server = McpServerConfig::http("github", "https://mcp.github.example")
            .with_oauth("https://github.com/login/oauth", vec!["repo".to_string()]);
        let result = builder
            .build(&UserId::new("u1"), &SessionId::new("s1"), &[], &[server])
            .await;
        match result {
            Err(KernelError::AuthRequired(challenges)) => assert_eq!(challenges.len(), 1),
            other => panic!("expected AuthRequired, got {other:?}"),
        }
    }
}
