//! `POST /{name}/{ver}/invoke` and `.../invoke/stream` (spec §6.1, §4.9).

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use relay_core::ids::{RequestId, UserId};
use relay_core::signal::TurnOutcome;
use relay_runtime::{CancellationToken, TurnRequest};
use tokio_stream::wrappers::ReceiverStream;

use crate::app::AppState;
use crate::error::ApiError;
use crate::wire::{self, AuthChallengeResponse, CompletedResponse, ElicitationResponse, HitlResponse, UserMessage};

fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok())
}

async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<UserId, ApiError> {
    Ok(state.authorizer.authorize_request(authorization_header(headers)).await?)
}

fn build_turn_request(state: &AppState, user_id: UserId, body: UserMessage, request_id: RequestId) -> TurnRequest {
    let task_id = body.task_id.as_deref().map(wire::parse_task_id);
    TurnRequest {
        user_id,
        task_id,
        request_id,
        message: body.into_single_item(),
        local_plugin_ids: state.local_plugin_ids.clone(),
        mcp_servers: state.mcp_servers.clone(),
    }
}

/// Resolves the task id a fresh turn landed on, so the response can carry it
/// even when the caller omitted `task_id` on the request.
async fn resolved_task_id(state: &AppState, request_id: &RequestId) -> String {
    state
        .orchestrator
        .task_id_for_request(request_id)
        .await
        .ok()
        .flatten()
        .map(|id| id.to_string())
        .unwrap_or_default()
}

async fn outcome_to_response(state: &AppState, request_id: &RequestId, outcome: TurnOutcome) -> axum::response::Response {
    let task_id = resolved_task_id(state, request_id).await;
    match outcome {
        TurnOutcome::Completed { output, total_tokens } => {
            Json(CompletedResponse { task_id, request_id: request_id.to_string(), output, total_tokens }).into_response()
        }
        TurnOutcome::HitlRequired { tool_calls } => Json(HitlResponse {
            approval_url: format!("/relay/v1/resume/{task_id}"),
            rejection_url: format!("/relay/v1/resume/{task_id}"),
            task_id,
            session_id: String::new(),
            request_id: request_id.to_string(),
            message: "one or more tool calls require approval".to_string(),
            tool_calls,
        })
        .into_response(),
        TurnOutcome::AuthRequired { challenges } => Json(AuthChallengeResponse {
            resume_url: format!("/relay/v1/resume/{task_id}"),
            task_id,
            session_id: String::new(),
            request_id: request_id.to_string(),
            message: "additional authorization is required".to_string(),
            auth_challenges: challenges,
        })
        .into_response(),
        TurnOutcome::ElicitationRequired { elicitation } => Json(ElicitationResponse {
            task_id,
            session_id: String::new(),
            message: elicitation.message,
            url: elicitation.url,
            requested_schema: elicitation.requested_schema,
        })
        .into_response(),
        other => (StatusCode::OK, Json(other)).into_response(),
    }
}

/// Cancels its token when dropped. Held by the handler's stack frame so that
/// a client disconnect (which axum handles by dropping the handler's future)
/// notifies the still-running, detached orchestrator task to abort — spec
/// §5's "request cancellation propagates as an abort signal".
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

pub async fn invoke(
    State(state): State<Arc<AppState>>,
    Path((name, ver)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<UserMessage>,
) -> Result<axum::response::Response, ApiError> {
    tracing::debug!(deployment = %name, version = %ver, "invoke");
    let user_id = authorize(&state, &headers).await?;
    let request_id = RequestId::generate();
    let req = build_turn_request(&state, user_id, body, request_id.clone());

    let cancel = CancellationToken::new();
    let _guard = CancelOnDrop(cancel.clone());
    let orchestrator = state.orchestrator.clone();
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let _ = tx.send(orchestrator.run_turn_cancelable(req, cancel).await);
    });

    // Runs on the detached task above, not on this handler's future: if the
    // client disconnects, `rx.await` is what gets dropped, not the turn
    // itself, so an in-flight tool call still gets the chance to observe the
    // cancellation and persist `Canceled` before unwinding.
    let outcome = rx.await.map_err(|_| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "turn task dropped before completing"))??;
    Ok(outcome_to_response(&state, &request_id, outcome).await)
}

pub async fn invoke_stream(
    State(state): State<Arc<AppState>>,
    Path((name, ver)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<UserMessage>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    tracing::debug!(deployment = %name, version = %ver, "invoke stream");
    let user_id = authorize(&state, &headers).await?;
    let request_id = RequestId::generate();
    let req = build_turn_request(&state, user_id, body, request_id);

    let (tx, rx) = tokio::sync::mpsc::channel(32);
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.run_turn_streaming(req, tx).await {
            tracing::warn!(error = %e, "streamed turn failed");
        }
    });

    let stream = ReceiverStream::new(rx).map(|outcome| {
        let data = serde_json::to_string(&outcome).unwrap_or_else(|_| "{}".to_string());
        Ok(Event::default().data(data))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
