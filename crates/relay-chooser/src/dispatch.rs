//! Parallel agent dispatch and response synthesis (spec §4.8 step 4,
//! §9(d) redesign).
//!
//! The Python original pools sub-agent execution through a `SubAgentPool`
//! actor; this crate drops that indirection (SPEC_FULL.md §9d) in favor of a
//! plain bounded `buffer_unordered` fan-out, since nothing here needs
//! long-lived pooled workers — each dispatched agent call is a single
//! request/response.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDispatchError {
    pub agent_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentDispatchResult {
    pub agent_name: String,
    pub output: String,
}

/// Aggregate of a parallel dispatch round. `successes` and `failures` are
/// sorted by agent name (spec §5 "Ordering guarantees": parallel dispatch is
/// deterministic in the set of inputs, sorted by agent name before
/// synthesis), independent of the arbitrary completion order of the fan-out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParallelExecutionResult {
    pub successes: Vec<AgentDispatchResult>,
    pub failures: Vec<AgentDispatchError>,
}

/// One agent invocation, abstracted so dispatch doesn't depend on the kernel
/// or runtime crates (this crate only knows how to fan a call out and
/// collect results, not how to build a kernel for it).
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, agent_name: &str, message: &str) -> Result<String, String>;
}

pub async fn dispatch_parallel(
    invoker: &dyn AgentInvoker,
    agent_names: &[String],
    message: &str,
    max_concurrency: usize,
) -> ParallelExecutionResult {
    let bounded = max_concurrency.max(1);
    let outcomes: Vec<(String, Result<String, String>)> = stream::iter(agent_names.iter().cloned())
        .map(|agent_name| {
            let message = message.to_string();
            async move {
                let result = invoker.invoke(&agent_name, &message).await;
                (agent_name, result)
            }
        })
        .buffer_unordered(bounded)
        .collect()
        .await;

    let mut result = ParallelExecutionResult::default();
    for (agent_name, outcome) in outcomes {
        match outcome {
            Ok(output) => result.successes.push(AgentDispatchResult { agent_name, output }),
            Err(message) => result.failures.push(AgentDispatchError { agent_name, message }),
        }
    }
    result.successes.sort_by(|a, b| a.agent_name.cmp(&b.agent_name));
    result.failures.sort_by(|a, b| a.agent_name.cmp(&b.agent_name));
    result
}

/// Combines multiple agent outputs into one response. Concrete synthesis
/// prompts are a deployment concern; this trait is the seam (mirrors
/// `relay_llm::LlmProvider`'s boundary pattern for pluggable model logic).
#[async_trait]
pub trait ResponseSynthesizer: Send + Sync {
    async fn synthesize(&self, results: &ParallelExecutionResult) -> Result<String, String>;
}

/// Joins a parallel execution round into a single response, falling back to
/// the single best (first, since `successes` is already sorted) result if
/// the configured synthesizer fails or produces nothing usable (spec §4.8
/// step 4 "single-best-result fallback").
pub async fn synthesize_with_fallback(
    synthesizer: &dyn ResponseSynthesizer,
    results: &ParallelExecutionResult,
) -> Option<String> {
    if results.successes.is_empty() {
        return None;
    }
    match synthesizer.synthesize(results).await {
        Ok(text) if !text.trim().is_empty() => Some(text),
        _ => results.successes.first().map(|r| r.output.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoInvoker;

    #[async_trait]
    impl AgentInvoker for EchoInvoker {
        async fn invoke(&self, agent_name: &str, message: &str) -> Result<String, String> {
            if agent_name == "broken-agent" {
                Err("boom".to_string())
            } else {
                Ok(format!("{agent_name}: {message}"))
            }
        }
    }

    #[tokio::test]
    async fn successes_and_failures_are_sorted_by_agent_name() {
        let invoker = EchoInvoker;
        let agents = vec![
            "zeta-agent".to_string(),
            "alpha-agent".to_string(),
            "broken-agent".to_string(),
        ];
        let result = dispatch_parallel(&invoker, &agents, "hi", 2).await;
        assert_eq!(result.successes[0].agent_name, "alpha-agent");
        assert_eq!(result.successes[1].agent_name, "zeta-agent");
        assert_eq!(result.failures[0].agent_name, "broken-agent");
    }

    struct FailingSynthesizer;

    #[async_trait]
    impl ResponseSynthesizer for FailingSynthesizer {
        async fn synthesize(&self, _results: &ParallelExecutionResult) -> Result<String, String> {
            Err("synthesis unavailable".to_string())
        }
    }

    #[tokio::test]
    async fn synthesis_failure_falls_back_to_first_success() {
        let results = ParallelExecutionResult {
            successes: vec![
                AgentDispatchResult {
                    agent_name: "alpha-agent".to_string(),
                    output: "alpha result".to_string(),
                },
            ],
            failures: Vec::new(),
        };
        let synthesized = synthesize_with_fallback(&FailingSynthesizer, &results).await;
        assert_eq!(synthesized.as_deref(), Some("alpha result"));
    }

    #[tokio::test]
    async fn no_successes_yields_no_synthesis() {
        let results = ParallelExecutionResult::default();
        let synthesized = synthesize_with_fallback(&FailingSynthesizer, &results).await;
        assert!(synthesized.is_none());
    }
}
