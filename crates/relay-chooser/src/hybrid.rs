//! Hybrid BM25 + semantic retrieval over the registered agent corpus
//! (spec §4.8 step 2).
//!
//! Grounded on `original_source/.../orchestrator/model/search.py`
//! (`AgentCorpusEntry`, `AgentSearchResult`, `HybridSearchResponse`) and
//! `configs.py`'s `BM25_WEIGHT`/`SEMANTIC_WEIGHT` defaults (0.25 / 0.75).

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One agent's entry in the lexical+semantic corpus.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentCorpusEntry {
    pub agent_name: String,
    pub description: String,
    pub tokens: Vec<String>,
    pub embedding: Vec<f32>,
}

impl AgentCorpusEntry {
    pub fn new(agent_name: impl Into<String>, description: impl Into<String>) -> Self {
        let description = description.into();
        let tokens = tokenize(&description);
        Self {
            agent_name: agent_name.into(),
            description,
            tokens,
            embedding: Vec::new(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }
}

pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Computes an embedding for arbitrary text. Concrete embedding models are
/// out of scope (same boundary as `relay_llm::LlmProvider` for chat
/// completion); callers without a real provider can skip the semantic term
/// entirely by passing `semantic_weight: 0.0`.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Vec<f32>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridSearchConfig {
    pub bm25_weight: f64,
    pub semantic_weight: f64,
    pub semantic_enabled: bool,
    pub top_k: usize,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            bm25_weight: 0.25,
            semantic_weight: 0.75,
            semantic_enabled: false,
            top_k: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSearchResult {
    pub agent_name: String,
    pub description: String,
    pub confidence: f64,
    pub bm25_score: f64,
    pub semantic_score: f64,
}

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;

/// Okapi BM25 over the corpus, scored against `query_tokens`.
fn bm25_scores(corpus: &[AgentCorpusEntry], query_tokens: &[String]) -> Vec<f64> {
    let n = corpus.len() as f64;
    if corpus.is_empty() {
        return Vec::new();
    }
    let avg_len: f64 =
        corpus.iter().map(|e| e.tokens.len() as f64).sum::<f64>() / n.max(1.0);

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for term in query_tokens {
        let count = corpus
            .iter()
            .filter(|e| e.tokens.iter().any(|t| t == term))
            .count();
        doc_freq.insert(term.as_str(), count);
    }

    corpus
        .iter()
        .map(|doc| {
            let doc_len = doc.tokens.len() as f64;
            query_tokens
                .iter()
                .map(|term| {
                    let df = *doc_freq.get(term.as_str()).unwrap_or(&0) as f64;
                    if df == 0.0 {
                        return 0.0;
                    }
                    let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let tf = doc.tokens.iter().filter(|t| *t == term).count() as f64;
                    let denom = tf + BM25_K1 * (1.0 - BM25_B + BM25_B * doc_len / avg_len);
                    if denom == 0.0 {
                        0.0
                    } else {
                        idf * (tf * (BM25_K1 + 1.0)) / denom
                    }
                })
                .sum::<f64>()
        })
        .collect()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot / (norm_a * norm_b)) as f64
    }
}

fn normalize(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return vec![0.0; scores.len()];
    }
    scores.iter().map(|s| s / max).collect()
}

/// Spec §4.8 step 2: `confidence = w_bm25 * bm25 + w_sem * sem`, both terms
/// normalized to `[0, 1]` against the max score in the corpus so the weights
/// are meaningful regardless of corpus size. Results are sorted by
/// descending confidence, ties broken lexicographically by agent name
/// (spec §4.8 "Ordering").
pub async fn hybrid_search(
    corpus: &[AgentCorpusEntry],
    query: &str,
    embedder: Option<&dyn EmbeddingProvider>,
    config: &HybridSearchConfig,
) -> Vec<AgentSearchResult> {
    let query_tokens = tokenize(query);
    let bm25_raw = bm25_scores(corpus, &query_tokens);
    let bm25_norm = normalize(&bm25_raw);

    let semantic_raw: Vec<f64> = if config.semantic_enabled {
        if let Some(embedder) = embedder {
            let query_embedding = embedder.embed(query).await;
            corpus
                .iter()
                .map(|e| cosine_similarity(&query_embedding, &e.embedding))
                .collect()
        } else {
            vec![0.0; corpus.len()]
        }
    } else {
        vec![0.0; corpus.len()]
    };

    let mut results: Vec<AgentSearchResult> = corpus
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let bm25 = bm25_norm[i];
            let semantic = semantic_raw[i];
            AgentSearchResult {
                agent_name: entry.agent_name.clone(),
                description: entry.description.clone(),
                confidence: config.bm25_weight * bm25 + config.semantic_weight * semantic,
                bm25_score: bm25,
                semantic_score: semantic,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.agent_name.cmp(&b.agent_name))
    });
    results.truncate(config.top_k.max(1));
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<AgentCorpusEntry> {
        vec![
            AgentCorpusEntry::new("billing-agent", "handles invoices and payment disputes"),
            AgentCorpusEntry::new("shipping-agent", "tracks packages and delivery status"),
            AgentCorpusEntry::new("refund-agent", "processes refunds and payment reversals"),
        ]
    }

    #[tokio::test]
    async fn lexical_match_ranks_above_unrelated_agents() {
        let results = hybrid_search(
            &corpus(),
            "I need a refund for my payment",
            None,
            &HybridSearchConfig::default(),
        )
        .await;
        assert_eq!(results[0].agent_name, "refund-agent");
    }

    #[tokio::test]
    async fn ties_break_lexicographically_by_agent_name() {
        let corpus = vec![
            AgentCorpusEntry::new("zeta", "generic helper"),
            AgentCorpusEntry::new("alpha", "generic helper"),
        ];
        let results = hybrid_search(&corpus, "unrelated query xyz", None, &HybridSearchConfig::default()).await;
        assert_eq!(results[0].agent_name, "alpha");
    }

    #[tokio::test]
    async fn top_k_truncates_results() {
        let mut config = HybridSearchConfig::default();
        config.top_k = 2;
        let results = hybrid_search(&corpus(), "payment", None, &config).await;
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn tokenize_lowercases_and_strips_punctuation() {
        assert_eq!(tokenize("Refund, please!"), vec!["refund", "please"]);
    }
}
