//! Maps `RuntimeError`/`AuthorizeError` onto the status codes spec §7 names.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::auth::AuthorizeError;

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<AuthorizeError> for ApiError {
    fn from(e: AuthorizeError) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, e.to_string())
    }
}

/// Spec §7's error table, as it applies at the HTTP boundary: task-not-found
/// is 404, ownership mismatch is 409 (the task exists, just not for this
/// caller), a not-paused/already-terminal resume is 410, and everything else
/// the orchestrator can raise is a 5xx — the model-invocation and
/// persistence failures it wraps are operational faults, not client errors.
impl From<relay_runtime::RuntimeError> for ApiError {
    fn from(e: relay_runtime::RuntimeError) -> Self {
        use relay_runtime::RuntimeError as E;
        match e {
            E::TaskNotFound(_) => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            E::Forbidden(_) => Self::new(StatusCode::CONFLICT, e.to_string()),
            E::NotPaused(_) | E::NoPendingToolCalls(_) | E::UnknownElicitation(_, _) => {
                Self::new(StatusCode::GONE, e.to_string())
            }
            E::ToolLoopExceeded | E::Storage(_) | E::Kernel(_) | E::Mcp(_) | E::Llm(_) | E::Canceled => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl From<relay_oauth::OAuthError> for ApiError {
    fn from(e: relay_oauth::OAuthError) -> Self {
        use relay_oauth::OAuthError as E;
        match e {
            E::UnauthorizedScopes(_)
            | E::InsecureEndpoint
            | E::FlowStateMissing
            | E::UserMismatch
            | E::StdioTransportUnsupported => Self::new(StatusCode::BAD_REQUEST, e.to_string()),
            E::TokenExchange(_) | E::Refresh(_) => Self::new(StatusCode::BAD_GATEWAY, e.to_string()),
            E::Http(_) | E::Storage(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}
