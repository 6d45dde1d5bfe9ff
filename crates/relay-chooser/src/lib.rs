//! Recipient Chooser (C11, spec §4.8): hybrid BM25+semantic retrieval, LLM
//! reranking, and bounded parallel agent dispatch.

pub mod dispatch;
pub mod error;
pub mod followup;
pub mod hybrid;
pub mod rerank;

pub use dispatch::{
    AgentDispatchError, AgentDispatchResult, AgentInvoker, ParallelExecutionResult,
    ResponseSynthesizer, dispatch_parallel, synthesize_with_fallback,
};
pub use error::{ChooserError, ChooserResult};
pub use followup::{FollowUpAnalysisResult, FollowUpAnalyzer, Intent, LlmFollowUpAnalyzer};
pub use hybrid::{AgentCorpusEntry, AgentSearchResult, EmbeddingProvider, HybridSearchConfig, hybrid_search};
pub use rerank::{AgentCandidate, AgentScore, Confidence, LlmReranker, LlmRerankerInput, Reranker, SelectedAgent};
