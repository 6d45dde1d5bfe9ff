//! `POST /{name}/{ver}/resume/{task_id}` (spec §6.1, §4.10).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use relay_core::ids::TaskId;
use relay_core::signal::TurnOutcome;
use relay_runtime::{ResumeAction, ResumeRequest};

use crate::app::AppState;
use crate::error::ApiError;
use crate::wire::{self, CompletedResponse, ElicitationResponse, RejectedResponse, ResumeRequestBody};

async fn authorize(state: &AppState, headers: &HeaderMap) -> Result<relay_core::ids::UserId, ApiError> {
    let header = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());
    Ok(state.authorizer.authorize_request(header).await?)
}

fn outcome_to_response(task_id: &TaskId, outcome: TurnOutcome) -> axum::response::Response {
    match outcome {
        TurnOutcome::Completed { output, total_tokens } => Json(CompletedResponse {
            task_id: task_id.to_string(),
            request_id: String::new(),
            output,
            total_tokens,
        })
        .into_response(),
        TurnOutcome::Rejected { message } => {
            Json(RejectedResponse { task_id: task_id.to_string(), message }).into_response()
        }
        TurnOutcome::ElicitationRequired { elicitation } => Json(ElicitationResponse {
            task_id: task_id.to_string(),
            session_id: String::new(),
            message: elicitation.message,
            url: elicitation.url,
            requested_schema: elicitation.requested_schema,
        })
        .into_response(),
        other => (StatusCode::OK, Json(other)).into_response(),
    }
}

pub async fn resume(
    State(state): State<Arc<AppState>>,
    Path((name, ver, task_id)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<ResumeRequestBody>,
) -> Result<axum::response::Response, ApiError> {
    tracing::debug!(deployment = %name, version = %ver, task_id = %task_id, "resume");
    let user_id = authorize(&state, &headers).await?;
    let task_id = wire::parse_task_id(&task_id);

    let action = match body {
        ResumeRequestBody::Approve => ResumeAction::Approve,
        ResumeRequestBody::Reject { message } => ResumeAction::Reject { message },
        ResumeRequestBody::AuthComplete => ResumeAction::AuthComplete,
        ResumeRequestBody::ElicitationResponse { elicitation_id, content } => {
            ResumeAction::ElicitationResponse { elicitation_id: wire::parse_elicitation_id(&elicitation_id), content }
        }
    };

    let outcome = state
        .orchestrator
        .resume(ResumeRequest {
            user_id,
            task_id: task_id.clone(),
            local_plugin_ids: state.local_plugin_ids.clone(),
            mcp_servers: state.mcp_servers.clone(),
            action,
        })
        .await?;

    Ok(outcome_to_response(&task_id, outcome))
}
