//! Platform-principal resolution (spec §6.1: "the orchestrator resolves
//! [the `Authorization` header] via a pluggable `RequestAuthorizer`").
//!
//! Concrete verification against a platform's session/token format is out of
//! scope here, same as `relay_llm::LlmProvider` for model calls — this crate
//! defines the seam and ships one deterministic implementation usable by a
//! single-tenant deployment and by tests.

use async_trait::async_trait;
use relay_core::ids::UserId;

#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error("missing Authorization header")]
    Missing,
    #[error("invalid Authorization header")]
    Invalid,
}

#[async_trait]
pub trait RequestAuthorizer: Send + Sync {
    async fn authorize_request(&self, authorization_header: Option<&str>) -> Result<UserId, AuthorizeError>;
}

/// Treats the bearer token's value, verbatim, as the `user_id` — suitable
/// for a deployment that sits behind a platform gateway that already
/// authenticated the caller and just needs the principal threaded through.
pub struct BearerAsUserId;

#[async_trait]
impl RequestAuthorizer for BearerAsUserId {
    async fn authorize_request(&self, authorization_header: Option<&str>) -> Result<UserId, AuthorizeError> {
        let header = authorization_header.ok_or(AuthorizeError::Missing)?;
        let token = header.strip_prefix("Bearer ").ok_or(AuthorizeError::Invalid)?;
        if token.is_empty() {
            return Err(AuthorizeError::Invalid);
        }
        Ok(UserId::new(token))
    }
}
