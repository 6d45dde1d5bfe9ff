//! Orchestration signals (spec §9: "exceptions as control flow" redesign).
//!
//! `HitlInterventionRequired`, `AuthRequiredError`, and `McpElicitationRequired`
//! are not faults — they are expected pause points in a turn. Rather than
//! threading them as thrown errors, the orchestrator returns a `TurnOutcome`
//! value and dispatches on its variant explicitly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ElicitationId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub server_name: String,
    pub auth_server: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub id: String,
    pub plugin: String,
    pub function: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingElicitation {
    pub elicitation_id: ElicitationId,
    pub mode: ElicitationMode,
    pub url: Option<String>,
    pub requested_schema: Option<Value>,
    pub message: Option<String>,
    pub server: String,
    pub tool_name: String,
    pub tool_args: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElicitationMode {
    Form,
    Url,
}

/// The six terminal turn outputs named by spec §4.9, plus the in-loop
/// `ToolCallsReady` signal the orchestrator dispatches on internally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TurnOutcome {
    Completed {
        output: String,
        total_tokens: u64,
    },
    PartialOutput {
        fragment: String,
    },
    HitlRequired {
        tool_calls: Vec<PendingToolCall>,
    },
    Rejected {
        message: String,
    },
    AuthRequired {
        challenges: Vec<AuthChallenge>,
    },
    ElicitationRequired {
        elicitation: PendingElicitation,
    },
}
