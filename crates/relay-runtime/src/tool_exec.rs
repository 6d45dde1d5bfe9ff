//! Execution boundary for non-MCP ("code") plugin tools.
//!
//! Spec §1 lists concrete LLM clients as an out-of-scope collaborator behind
//! `relay_llm::LlmProvider`; the same boundary applies to concrete code-tool
//! implementations (shell commands, local Python callables, etc. in the
//! original system) — this crate defines the seam the orchestrator calls
//! through and ships a deterministic test double, not a production executor.

use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait CodeToolExecutor: Send + Sync {
    async fn execute(&self, plugin_id: &str, tool_name: &str, args: Value) -> Result<Value, String>;
}

/// The default executor for deployments with no local code plugins
/// configured. Every call fails with a descriptive error that is fed back
/// to the model as a tool result rather than aborting the turn.
#[derive(Debug, Default)]
pub struct UnconfiguredCodeToolExecutor;

#[async_trait]
impl CodeToolExecutor for UnconfiguredCodeToolExecutor {
    async fn execute(&self, plugin_id: &str, tool_name: &str, _args: Value) -> Result<Value, String> {
        Err(format!("no code tool executor configured for {plugin_id}-{tool_name}"))
    }
}
