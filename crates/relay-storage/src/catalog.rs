//! Plugin Catalog (C5, spec §4.3).
//!
//! Canonical catalog id scheme (spec §9a): `mcp_{server}_{tool}` for MCP
//! tools, `{plugin_id}-{tool_name}` for code tools.

use async_trait::async_trait;
use dashmap::DashMap;
use relay_core::plugin::{Plugin, PluginTool};
use tracing::debug;

use crate::error::{StorageError, StorageResult};

pub fn tool_id(plugin_id: &str, tool_name: &str) -> String {
    if let Some(server) = plugin_id.strip_prefix("mcp_") {
        format!("mcp_{server}_{tool_name}")
    } else {
        format!("{plugin_id}-{tool_name}")
    }
}

pub fn mcp_plugin_id(server_name: &str) -> String {
    format!("mcp_{server_name}")
}

#[async_trait]
pub trait PluginCatalog: Send + Sync {
    async fn get_plugin(&self, plugin_id: &str) -> Option<Plugin>;
    async fn get_tool(&self, tool_id: &str) -> Option<PluginTool>;
    async fn register_dynamic_plugin(&self, plugin: Plugin) -> StorageResult<()>;

    /// If `plugin_id` is provided and the plugin does not exist, a minimal
    /// placeholder plugin is created to hold it (spec §4.3).
    async fn register_dynamic_tool(
        &self,
        tool: PluginTool,
        plugin_id: Option<&str>,
    ) -> StorageResult<()>;

    /// Cascades to all the plugin's tools.
    async fn unregister_dynamic_plugin(&self, plugin_id: &str) -> StorageResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryPluginCatalog {
    plugins: DashMap<String, Plugin>,
}

impl InMemoryPluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a static catalog document at startup (spec §4.3: "static
    /// catalog loaded from a JSON document"). Fatal on malformed input per
    /// spec §7 `PluginCatalogDefinitionException`.
    pub fn from_json(document: &str) -> StorageResult<Self> {
        let plugins: Vec<Plugin> = serde_json::from_str(document)
            .map_err(|e| StorageError::Internal(format!("plugin catalog definition error: {e}")))?;
        let map = DashMap::new();
        for plugin in plugins {
            map.insert(plugin.plugin_id.clone(), plugin);
        }
        Ok(Self { plugins: map })
    }
}

#[async_trait]
impl PluginCatalog for InMemoryPluginCatalog {
    async fn get_plugin(&self, plugin_id: &str) -> Option<Plugin> {
        self.plugins.get(plugin_id).map(|entry| entry.clone())
    }

    async fn get_tool(&self, tool_id: &str) -> Option<PluginTool> {
        self.plugins
            .iter()
            .find_map(|entry| entry.tools.iter().find(|t| t.tool_id == tool_id).cloned())
    }

    async fn register_dynamic_plugin(&self, plugin: Plugin) -> StorageResult<()> {
        self.plugins.insert(plugin.plugin_id.clone(), plugin);
        Ok(())
    }

    async fn register_dynamic_tool(
        &self,
        tool: PluginTool,
        plugin_id: Option<&str>,
    ) -> StorageResult<()> {
        let Some(plugin_id) = plugin_id else {
            return Err(StorageError::InvalidKey(
                "register_dynamic_tool requires a plugin_id".to_string(),
            ));
        };
        let mut entry = self
            .plugins
            .entry(plugin_id.to_string())
            .or_insert_with(|| {
                debug!(plugin_id, "creating placeholder plugin for dynamic tool");
                Plugin::placeholder(plugin_id)
            });
        if let Some(existing) = entry.tools.iter_mut().find(|t| t.tool_id == tool.tool_id) {
            *existing = tool;
        } else {
            entry.tools.push(tool);
        }
        Ok(())
    }

    async fn unregister_dynamic_plugin(&self, plugin_id: &str) -> StorageResult<()> {
        self.plugins.remove(plugin_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::governance::Governance;
    use relay_core::plugin::PluginType;

    #[test]
    fn mcp_tool_ids_use_the_mcp_scheme() {
        assert_eq!(tool_id("mcp_github", "create_issue"), "mcp_github_create_issue");
    }

    #[test]
    fn code_tool_ids_use_the_hyphen_scheme() {
        assert_eq!(tool_id("shell_plugin", "ShellCommand"), "shell_plugin-ShellCommand");
    }

    #[tokio::test]
    async fn register_dynamic_tool_creates_placeholder_plugin() {
        let catalog = InMemoryPluginCatalog::new();
        let tool = PluginTool {
            tool_id: "mcp_github_list_repos".to_string(),
            name: "list_repos".to_string(),
            description: String::new(),
            governance: Governance::unknown(),
            auth: None,
        };
        catalog
            .register_dynamic_tool(tool.clone(), Some("mcp_github"))
            .await
            .unwrap();

        let plugin = catalog.get_plugin("mcp_github").await.unwrap();
        assert_eq!(plugin.plugin_type, PluginType::Code);
        assert_eq!(plugin.tools.len(), 1);
        assert_eq!(catalog.get_tool("mcp_github_list_repos").await.unwrap().name, "list_repos");
    }

    #[tokio::test]
    async fn unregister_plugin_cascades_to_its_tools() {
        let catalog = InMemoryPluginCatalog::new();
        let tool = PluginTool {
            tool_id: "mcp_github_list_repos".to_string(),
            name: "list_repos".to_string(),
            description: String::new(),
            governance: Governance::unknown(),
            auth: None,
        };
        catalog
            .register_dynamic_tool(tool, Some("mcp_github"))
            .await
            .unwrap();
        catalog.unregister_dynamic_plugin("mcp_github").await.unwrap();
        assert!(catalog.get_tool("mcp_github_list_repos").await.is_none());
    }
}
