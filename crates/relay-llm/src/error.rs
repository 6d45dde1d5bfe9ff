//! Grounded on `astrid-llm::error::LlmError`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{provider} is not configured with an API key")]
    ApiKeyNotConfigured { provider: String },

    #[error("api request failed: {0}")]
    ApiRequestFailed(String),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("invalid response from provider: {0}")]
    InvalidResponse(String),

    #[error("model {model} is not supported by this provider")]
    ModelNotSupported { model: String },

    #[error("context length exceeded: {current} > {max}")]
    ContextLengthExceeded { current: usize, max: usize },

    #[error("streaming error: {0}")]
    StreamingError(String),
}

pub type LlmResult<T> = Result<T, LlmError>;
