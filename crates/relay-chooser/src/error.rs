use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChooserError {
    #[error("follow-up analysis failed: {0}")]
    Analysis(String),

    #[error("reranker failed: {0}")]
    Rerank(String),

    #[error("fallback agent {0} is not registered in the corpus")]
    UnknownFallback(String),
}

pub type ChooserResult<T> = Result<T, ChooserError>;
