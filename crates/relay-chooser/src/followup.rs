//! Follow-up detection and query expansion (spec §4.8 step 1).
//!
//! Grounded on `original_source/.../orchestrator/model/recipient_chooser.py`
//! (`FollowUpAnalysisResult`).

use async_trait::async_trait;
use relay_llm::provider::{LlmProvider, Message};
use serde::{Deserialize, Serialize};

use crate::error::ChooserResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Knowledge,
    Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpAnalysisResult {
    pub is_followup: bool,
    pub original_query: String,
    pub expanded_query: String,
    pub key_terms_added: Vec<String>,
    pub reasoning: String,
    pub intent: Intent,
}

impl FollowUpAnalysisResult {
    /// The analysis used when follow-up detection is disabled by config, or
    /// when there's no prior turn to compare against — the message stands on
    /// its own.
    pub fn not_a_followup(message: &str) -> Self {
        Self {
            is_followup: false,
            original_query: message.to_string(),
            expanded_query: message.to_string(),
            key_terms_added: Vec::new(),
            reasoning: String::new(),
            intent: Intent::Knowledge,
        }
    }
}

#[async_trait]
pub trait FollowUpAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        history: &[String],
        current_message: &str,
    ) -> ChooserResult<FollowUpAnalysisResult>;
}

/// Default analyzer: prompts the configured LLM to classify the message and
/// expand it against the last `max_history` prior turns (spec §4.8 step 1,
/// `TA_FOLLOWUP_MAX_HISTORY`).
pub struct LlmFollowUpAnalyzer<P> {
    provider: P,
    max_history: usize,
}

impl<P: LlmProvider> LlmFollowUpAnalyzer<P> {
    pub fn new(provider: P, max_history: usize) -> Self {
        Self { provider, max_history }
    }
}

#[async_trait]
impl<P: LlmProvider> FollowUpAnalyzer for LlmFollowUpAnalyzer<P> {
    async fn analyze(
        &self,
        history: &[String],
        current_message: &str,
    ) -> ChooserResult<FollowUpAnalysisResult> {
        if history.is_empty() {
            return Ok(FollowUpAnalysisResult::not_a_followup(current_message));
        }

        let window: Vec<&String> = history
            .iter()
            .rev()
            .take(self.max_history)
            .collect();
        let context = window
            .iter()
            .rev()
            .map(|turn| turn.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Prior turns:\n{context}\n\nCurrent message: {current_message}\n\n\
             Decide whether the current message is a follow-up to the prior turns. \
             Respond with JSON: {{\"is_followup\": bool, \"expanded_query\": string, \
             \"key_terms_added\": [string], \"reasoning\": string, \"intent\": \"knowledge\"|\"action\"}}"
        );

        let raw = self
            .provider
            .complete(&[Message::user(prompt)])
            .await
            .map_err(|e| crate::error::ChooserError::Analysis(e.to_string()))?;
        let text = raw.text.unwrap_or_default();

        parse_followup_response(&text, current_message)
    }
}

fn parse_followup_response(
    text: &str,
    original_query: &str,
) -> ChooserResult<FollowUpAnalysisResult> {
    #[derive(Deserialize)]
    struct Raw {
        is_followup: bool,
        expanded_query: String,
        #[serde(default)]
        key_terms_added: Vec<String>,
        #[serde(default)]
        reasoning: String,
        #[serde(default = "default_intent")]
        intent: Intent,
    }
    fn default_intent() -> Intent {
        Intent::Knowledge
    }

    match serde_json::from_str::<Raw>(text) {
        Ok(raw) => Ok(FollowUpAnalysisResult {
            is_followup: raw.is_followup,
            original_query: original_query.to_string(),
            expanded_query: raw.expanded_query,
            key_terms_added: raw.key_terms_added,
            reasoning: raw.reasoning,
            intent: raw.intent,
        }),
        Err(_) => Ok(FollowUpAnalysisResult::not_a_followup(original_query)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_response_falls_back_to_not_a_followup() {
        let result = parse_followup_response("not json", "hello").unwrap();
        assert!(!result.is_followup);
        assert_eq!(result.expanded_query, "hello");
    }

    #[test]
    fn well_formed_response_is_parsed() {
        let json = r#"{"is_followup": true, "expanded_query": "refund for order 123", "key_terms_added": ["order", "123"], "reasoning": "references prior order", "intent": "action"}"#;
        let result = parse_followup_response(json, "refund it").unwrap();
        assert!(result.is_followup);
        assert_eq!(result.intent, Intent::Action);
        assert_eq!(result.key_terms_added, vec!["order", "123"]);
    }

    #[tokio::test]
    async fn empty_history_short_circuits_to_not_a_followup() {
        let analyzer = LlmFollowUpAnalyzer::new(relay_llm::echo::EchoProvider::default(), 2);
        let result = analyzer.analyze(&[], "hello").await.unwrap();
        assert!(!result.is_followup);
    }
}
