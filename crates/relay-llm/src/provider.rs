//! `LlmProvider` trait, grounded on `astrid-llm::provider` (trait shape,
//! blanket `Box<dyn LlmProvider>` impl, default `complete_simple`).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LlmResult;

pub type StreamBox = Pin<Box<dyn Stream<Item = LlmResult<StreamEvent>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// A tool call the model proposes to make, before it has been gated or
/// executed (feeds into `relay_approval::gate` and `relay_core::signal`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallIntent {
    pub id: String,
    pub plugin: String,
    pub function: String,
    pub arguments: Value,
}

/// The result of one model completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub intent: ToolCallIntent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    TextDelta(String),
    ToolCall(ToolCallIntent),
    Usage(TokenUsage),
    Done,
}

/// A completed assistant turn: either plain text, or a set of proposed tool
/// calls (mutually exclusive per spec §4.9's "detect tool calls" step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCallIntent>,
    pub usage: TokenUsage,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn stream(&self, messages: &[Message]) -> LlmResult<StreamBox>;
    async fn complete(&self, messages: &[Message]) -> LlmResult<Completion>;

    async fn complete_simple(&self, prompt: &str) -> LlmResult<String> {
        let completion = self.complete(&[Message::user(prompt)]).await?;
        Ok(completion.text.unwrap_or_default())
    }

    fn count_tokens(&self, text: &str) -> usize {
        text.len() / 4
    }

    fn max_context_length(&self) -> usize {
        128_000
    }
}

#[async_trait]
impl LlmProvider for Box<dyn LlmProvider> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn stream(&self, messages: &[Message]) -> LlmResult<StreamBox> {
        (**self).stream(messages).await
    }

    async fn complete(&self, messages: &[Message]) -> LlmResult<Completion> {
        (**self).complete(messages).await
    }
}
