//! A deterministic provider used by the orchestrator's own tests and by the
//! local "echo plugin" deployment described in spec §8 scenario S1. No
//! concrete production model adapter ships in this crate (spec §1 Non-goals).

use async_trait::async_trait;
use tokio_stream::once;

use crate::error::LlmResult;
use crate::provider::{Completion, LlmProvider, Message, MessageRole, StreamBox, StreamEvent, TokenUsage};

pub struct EchoProvider {
    model: String,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self {
            model: "echo-1".to_string(),
        }
    }
}

impl Default for EchoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn stream(&self, messages: &[Message]) -> LlmResult<StreamBox> {
        let text = last_user_text(messages);
        Ok(Box::pin(once(Ok(StreamEvent::TextDelta(text)))))
    }

    async fn complete(&self, messages: &[Message]) -> LlmResult<Completion> {
        let text = last_user_text(messages);
        let tokens = self.count_tokens(&text).max(1) as u64;
        Ok(Completion {
            text: Some(text),
            tool_calls: Vec::new(),
            usage: TokenUsage {
                prompt_tokens: tokens,
                completion_tokens: tokens,
                total_tokens: tokens * 2,
            },
        })
    }
}

fn last_user_text(messages: &[Message]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_the_last_user_message_with_positive_token_usage() {
        let provider = EchoProvider::new();
        let completion = provider
            .complete(&[Message::user("Hello")])
            .await
            .unwrap();
        assert_eq!(completion.text.as_deref(), Some("Hello"));
        assert!(completion.usage.total_tokens > 0);
    }
}
