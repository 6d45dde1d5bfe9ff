//! Plugin Registry (C8, spec §4.6).
//!
//! Pre-flight pass over the configured MCP servers for one turn: resolves
//! auth, opens a transient session per server, enumerates tools, derives
//! governance, and materializes each server's tools into the plugin catalog
//! under the `mcp_{server}` plugin id. Grounded on `astrid-mcp::registry`'s
//! `materialize_server` loop, adapted to aggregate `AuthRequiredError`s
//! across servers instead of failing fast on the first one (spec §4.6).

use std::sync::Arc;

use relay_core::ids::{SessionId, UserId};
use relay_core::plugin::{AuthRequirement, Plugin, PluginTool, PluginType};
use relay_storage::catalog::{PluginCatalog, mcp_plugin_id, tool_id};
use tracing::{info, warn};

use crate::client::McpClient;
use crate::config::McpServerConfig;
use crate::error::{AuthRequiredError, McpError};
use crate::governance_map::{apply_overrides, derive_governance};

pub struct PluginRegistry {
    client: Arc<McpClient>,
    catalog: Arc<dyn PluginCatalog>,
}

impl PluginRegistry {
    pub fn new(client: Arc<McpClient>, catalog: Arc<dyn PluginCatalog>) -> Self {
        Self { client, catalog }
    }

    /// Materializes every configured server's tools into the catalog.
    /// Returns the `AuthRequiredError`s collected across all servers rather
    /// than stopping at the first one, so a caller can surface one combined
    /// `TurnOutcome::AuthRequired` listing every server that needs auth.
    pub async fn materialize(
        &self,
        servers: &[McpServerConfig],
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Vec<AuthRequiredError> {
        let mut auth_required = Vec::new();

        for cfg in servers {
            if let Err(e) = cfg.validate() {
                warn!(server = %cfg.name, error = %e, "skipping misconfigured mcp server");
                continue;
            }
            match self.materialize_one(cfg, user_id, session_id).await {
                Ok(()) => {}
                Err(McpError::AuthRequired(e)) => auth_required.push(e),
                Err(e) => {
                    warn!(server = %cfg.name, error = %e, "mcp server discovery failed");
                }
            }
        }

        auth_required
    }

    async fn materialize_one(
        &self,
        cfg: &McpServerConfig,
        user_id: &UserId,
        session_id: &SessionId,
    ) -> Result<(), McpError> {
        let session = self.client.open_session(cfg, user_id, session_id).await?;
        let tools = self.client.list_tools(cfg, &session, user_id, session_id).await?;

        let plugin_id = mcp_plugin_id(&cfg.name);
        let auth = cfg.oauth.auth_server.as_ref().map(|auth_server| AuthRequirement {
            auth_server: auth_server.clone(),
            scopes: cfg.oauth.scopes.clone().unwrap_or_default(),
        });

        let plugin_tools: Vec<PluginTool> = tools
            .into_iter()
            .map(|tool| {
                let base = derive_governance(tool.annotations, cfg.trust_level);
                let governance =
                    apply_overrides(base, cfg.governance_overrides.get(&tool.name));
                PluginTool {
                    tool_id: tool_id(&plugin_id, &tool.name),
                    name: tool.name,
                    description: tool.description,
                    governance,
                    auth: auth.clone(),
                }
            })
            .collect();

        let tool_count = plugin_tools.len();
        let plugin = Plugin {
            plugin_id: plugin_id.clone(),
            name: cfg.name.clone(),
            version: "mcp".to_string(),
            owner: cfg.name.clone(),
            plugin_type: PluginType::Mcp,
            tools: plugin_tools,
        };

        self.catalog
            .register_dynamic_plugin(plugin)
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        info!(server = %cfg.name, tools = tool_count, "materialized mcp server");
        Ok(())
    }
}
