use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("oauth flow state not found or expired")]
    FlowStateMissing,

    #[error("csrf state validation failed: user mismatch")]
    UserMismatch,

    #[error("server returned scopes not requested: {0:?}")]
    UnauthorizedScopes(Vec<String>),

    #[error("token endpoint request failed: {0}")]
    TokenExchange(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("stdio transport cannot initiate an OAuth flow")]
    StdioTransportUnsupported,

    #[error("auth_server and redirect_uri must use https (or localhost) under strict-HTTPS validation")]
    InsecureEndpoint,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(#[from] relay_storage::StorageError),
}

pub type OAuthResult<T> = Result<T, OAuthError>;
