//! The per-call catalog check (spec §4.7, testable property §8.9).

use relay_llm::ToolCallIntent;
use relay_storage::PluginCatalog;
use relay_storage::catalog::tool_id;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterventionOutcome {
    /// No catalog entry, or the entry does not require HITL — continue.
    NotRequired,
    /// The catalog entry requires human approval before this call proceeds.
    Required,
}

/// `check_for_intervention(fc)` is true iff the catalog contains a tool with
/// id `"{fc.plugin}-{fc.function}"` (or the MCP-scheme equivalent) whose
/// `governance.requires_hitl` is true. A missing catalog entry is treated as
/// non-intervention: log and continue (spec §4.7).
pub async fn check_for_intervention(
    catalog: &dyn PluginCatalog,
    fc: &ToolCallIntent,
) -> InterventionOutcome {
    let id = tool_id(&fc.plugin, &fc.function);
    match catalog.get_tool(&id).await {
        Some(tool) if tool.governance.requires_hitl => InterventionOutcome::Required,
        Some(_) => InterventionOutcome::NotRequired,
        None => {
            debug!(tool_id = %id, "no catalog entry for tool call; treating as non-intervention");
            InterventionOutcome::NotRequired
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::governance::{Cost, DataSensitivity, Governance};
    use relay_core::plugin::{Plugin, PluginTool, PluginType};
    use relay_storage::InMemoryPluginCatalog;
    use serde_json::json;

    async fn catalog_with(tool_id: &str, requires_hitl: bool) -> InMemoryPluginCatalog {
        let catalog = InMemoryPluginCatalog::new();
        catalog
            .register_dynamic_plugin(Plugin {
                plugin_id: "shell_plugin".to_string(),
                name: "shell_plugin".to_string(),
                version: "1.0.0".to_string(),
                owner: "core".to_string(),
                plugin_type: PluginType::Code,
                tools: vec![PluginTool {
                    tool_id: tool_id.to_string(),
                    name: "ShellCommand".to_string(),
                    description: String::new(),
                    governance: Governance::new(requires_hitl, Cost::High, DataSensitivity::Proprietary),
                    auth: None,
                }],
            })
            .await
            .unwrap();
        catalog
    }

    #[tokio::test]
    async fn requires_hitl_true_blocks() {
        let catalog = catalog_with("shell_plugin-ShellCommand", true).await;
        let fc = ToolCallIntent {
            id: "call-1".to_string(),
            plugin: "shell_plugin".to_string(),
            function: "ShellCommand".to_string(),
            arguments: json!({}),
        };
        assert_eq!(
            check_for_intervention(&catalog, &fc).await,
            InterventionOutcome::Required
        );
    }

    #[tokio::test]
    async fn requires_hitl_false_continues() {
        let catalog = catalog_with("shell_plugin-ShellCommand", false).await;
        let fc = ToolCallIntent {
            id: "call-1".to_string(),
            plugin: "shell_plugin".to_string(),
            function: "ShellCommand".to_string(),
            arguments: json!({}),
        };
        assert_eq!(
            check_for_intervention(&catalog, &fc).await,
            InterventionOutcome::NotRequired
        );
    }

    #[tokio::test]
    async fn missing_catalog_entry_is_non_intervention() {
        let catalog = InMemoryPluginCatalog::new();
        let fc = ToolCallIntent {
            id: "call-1".to_string(),
            plugin: "unknown_plugin".to_string(),
            function: "DoThing".to_string(),
            arguments: json!({}),
        };
        assert_eq!(
            check_for_intervention(&catalog, &fc).await,
            InterventionOutcome::NotRequired
        );
    }
}
