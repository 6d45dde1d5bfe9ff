//! Wire payloads (spec §6.2).

use relay_core::ids::{ElicitationId, TaskId};
use relay_core::signal::{AuthChallenge, PendingToolCall};
use relay_core::task::MultiModalItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST .../invoke` and `.../invoke/stream` request body.
#[derive(Debug, Clone, Deserialize)]
pub struct UserMessage {
    pub task_id: Option<String>,
    pub session_id: Option<String>,
    pub items: Vec<MultiModalItem>,
    #[serde(default)]
    pub user_context: std::collections::HashMap<String, String>,
}

impl UserMessage {
    /// The orchestrator's `TurnRequest` carries one `MultiModalItem` per
    /// turn; a request with more than one item folds them into a single
    /// text item by concatenation, newline-joined, rather than rejecting the
    /// request outright — batching distinct content chunks into one
    /// model-visible turn is not otherwise constrained by spec §6.2.
    pub fn into_single_item(mut self) -> MultiModalItem {
        if self.items.len() == 1 {
            return self.items.remove(0);
        }
        let joined = self
            .items
            .iter()
            .map(|item| item.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        MultiModalItem::text(joined)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResumeRequestBody {
    Approve,
    Reject { message: Option<String> },
    AuthComplete,
    ElicitationResponse { elicitation_id: String, content: Value },
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthChallengeResponse {
    pub task_id: String,
    pub session_id: String,
    pub request_id: String,
    pub message: String,
    pub auth_challenges: Vec<AuthChallenge>,
    pub resume_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HitlResponse {
    pub task_id: String,
    pub session_id: String,
    pub request_id: String,
    pub message: String,
    pub approval_url: String,
    pub rejection_url: String,
    pub tool_calls: Vec<PendingToolCall>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletedResponse {
    pub task_id: String,
    pub request_id: String,
    pub output: String,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedResponse {
    pub task_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElicitationResponse {
    pub task_id: String,
    pub session_id: String,
    pub message: Option<String>,
    pub url: Option<String>,
    pub requested_schema: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
    pub version: String,
}

pub(crate) fn parse_task_id(value: &str) -> TaskId {
    TaskId::new(value)
}

pub(crate) fn parse_elicitation_id(value: &str) -> ElicitationId {
    ElicitationId::new(value)
}
