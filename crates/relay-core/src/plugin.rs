//! Catalog entities: `Plugin` and `PluginTool` (spec data model §3, C5).

use serde::{Deserialize, Serialize};

use crate::governance::Governance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Code,
    Mcp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequirement {
    pub auth_server: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginTool {
    pub tool_id: String,
    pub name: String,
    pub description: String,
    pub governance: Governance,
    pub auth: Option<AuthRequirement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub plugin_id: String,
    pub name: String,
    pub version: String,
    pub owner: String,
    pub plugin_type: PluginType,
    pub tools: Vec<PluginTool>,
}

impl Plugin {
    /// A minimal placeholder plugin, used when a dynamic tool is registered
    /// against a `plugin_id` that doesn't exist yet (spec §4.3).
    pub fn placeholder(plugin_id: impl Into<String>) -> Self {
        let plugin_id = plugin_id.into();
        Self {
            name: plugin_id.clone(),
            version: "0.0.0".to_string(),
            owner: "unknown".to_string(),
            plugin_type: PluginType::Code,
            tools: Vec::new(),
            plugin_id,
        }
    }
}
