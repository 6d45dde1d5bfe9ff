//! Resume Handler (C13, spec §4.10).
//!
//! Re-enters the orchestrator from the step a paused task stopped at:
//! `approve`/`reject` continue from step 5 with the persisted pending tool
//! calls, `auth_complete` re-enters at step 3 (kernel build), and
//! `elicitation_response` replays the tool call that raised the
//! elicitation. Grounded on spec §4.10's contract plus
//! `original_source`'s `StateResponse`/`ResumeRequest` shapes.

use std::collections::HashMap;

use chrono::Utc;
use relay_core::ids::{ElicitationId, TaskId, UserId};
use relay_core::signal::{PendingToolCall, TurnOutcome};
use relay_core::task::{Task, TaskStatus};
use relay_kernel::KernelError;
use relay_llm::provider::ToolCallIntent;
use relay_mcp::McpServerConfig;
use relay_storage::catalog::mcp_plugin_id;
use serde_json::Value;

use relay_audit::{AuditEntry, AuditOutcome};

use crate::error::{RuntimeError, RuntimeResult};
use crate::orchestrator::{Orchestrator, build_messages};

#[derive(Debug, Clone)]
pub enum ResumeAction {
    Approve,
    Reject { message: Option<String> },
    AuthComplete,
    ElicitationResponse { elicitation_id: ElicitationId, content: Value },
}

/// `POST resume/{task_id}` body (spec §4.10). `local_plugin_ids`/`mcp_servers`
/// mirror `TurnRequest`'s fields — resuming rebuilds the kernel rather than
/// reusing one from before the pause, since no kernel is kept in memory
/// across a suspend.
#[derive(Debug, Clone)]
pub struct ResumeRequest {
    pub user_id: UserId,
    pub task_id: TaskId,
    pub local_plugin_ids: Vec<String>,
    pub mcp_servers: Vec<McpServerConfig>,
    pub action: ResumeAction,
}

impl Orchestrator {
    pub async fn resume(&self, req: ResumeRequest) -> RuntimeResult<TurnOutcome> {
        let lock = self.lock_for(&req.task_id).await;
        let _guard = lock.lock().await;

        let mut task = self
            .tasks
            .load(&req.task_id)
            .await?
            .ok_or_else(|| RuntimeError::TaskNotFound(req.task_id.clone()))?;
        if !task.is_owned_by(&req.user_id) {
            return Err(RuntimeError::Forbidden(req.task_id.clone()));
        }
        if task.status != TaskStatus::Paused {
            return Err(RuntimeError::NotPaused(req.task_id.clone()));
        }

        match req.action {
            ResumeAction::Approve => self.resume_approve(&mut task, &req.local_plugin_ids, &req.mcp_servers).await,
            ResumeAction::Reject { message } => self.resume_reject(&mut task, message).await,
            ResumeAction::AuthComplete => {
                self.resume_auth_complete(&mut task, &req.local_plugin_ids, &req.mcp_servers).await
            }
            ResumeAction::ElicitationResponse { elicitation_id, content } => {
                self.resume_elicitation(&mut task, &req.local_plugin_ids, &req.mcp_servers, elicitation_id, content)
                    .await
            }
        }
    }

    fn latest_pending_tool_calls(
        &self,
        task: &Task,
    ) -> RuntimeResult<(relay_core::ids::RequestId, Vec<PendingToolCall>, Vec<relay_llm::provider::Message>)> {
        let item = task
            .items
            .iter()
            .rev()
            .find(|it| it.pending_tool_calls.is_some())
            .ok_or_else(|| RuntimeError::NoPendingToolCalls(task.task_id.clone()))?;

        let pending: Vec<PendingToolCall> = serde_json::from_value(
            item.pending_tool_calls
                .clone()
                .expect("filtered by find above"),
        )
        .map_err(|e| RuntimeError::Storage(relay_storage::StorageError::Internal(e.to_string())))?;

        let messages: Vec<relay_llm::provider::Message> = item
            .chat_history
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e: serde_json::Error| RuntimeError::Storage(relay_storage::StorageError::Internal(e.to_string())))?
            .unwrap_or_default();

        Ok((item.request_id.clone(), pending, messages))
    }

    async fn resume_approve(
        &self,
        task: &mut Task,
        local_plugin_ids: &[String],
        mcp_servers: &[McpServerConfig],
    ) -> RuntimeResult<TurnOutcome> {
        let (request_id, pending, mut messages) = self.latest_pending_tool_calls(task)?;

        let kernel = match self
            .kernel_builder
            .build(&task.user_id, &task.session_id, local_plugin_ids, mcp_servers)
            .await
        {
            Ok(kernel) => kernel,
            Err(KernelError::AuthRequired(challenges)) => return self.pause_for_auth(task, challenges).await,
            Err(e) => return Err(e.into()),
        };

        task.status = TaskStatus::Running;
        self.audit.append(AuditEntry {
            timestamp: Utc::now(),
            task_id: task.task_id.clone(),
            session_id: task.session_id.clone(),
            user_id: task.user_id.clone(),
            action: "hitl_check".to_string(),
            outcome: AuditOutcome::Allowed,
        });

        // Approval bypasses C10 for exactly these calls; it does not
        // disable the gate for any further tool calls the loop proposes.
        let mut sessions = HashMap::new();
        for call in &pending {
            let intent = ToolCallIntent {
                id: call.id.clone(),
                plugin: call.plugin.clone(),
                function: call.function.clone(),
                arguments: call.arguments.clone(),
            };
            if let Some(outcome) = self
                .execute_and_record(&kernel, task, &intent, mcp_servers, &mut messages, &mut sessions)
                .await?
            {
                return Ok(outcome);
            }
        }

        self.run_loop_marking_failures(&kernel, task, &request_id, mcp_servers, messages).await
    }

    async fn resume_reject(&self, task: &mut Task, message: Option<String>) -> RuntimeResult<TurnOutcome> {
        // Confirms a pending approval actually exists before accepting the
        // rejection; the pending item itself is left as the task's record
        // of what was rejected.
        self.latest_pending_tool_calls(task)?;

        let text = message.unwrap_or_else(|| "tool call rejected by user".to_string());
        task.status = TaskStatus::Failed;
        self.tasks.update(task.clone()).await?;
        self.audit.append(AuditEntry {
            timestamp: Utc::now(),
            task_id: task.task_id.clone(),
            session_id: task.session_id.clone(),
            user_id: task.user_id.clone(),
            action: "hitl_check".to_string(),
            outcome: AuditOutcome::Denied(text.clone()),
        });
        Ok(TurnOutcome::Rejected { message: text })
    }

    async fn resume_auth_complete(
        &self,
        task: &mut Task,
        local_plugin_ids: &[String],
        mcp_servers: &[McpServerConfig],
    ) -> RuntimeResult<TurnOutcome> {
        let kernel = match self
            .kernel_builder
            .build(&task.user_id, &task.session_id, local_plugin_ids, mcp_servers)
            .await
        {
            Ok(kernel) => kernel,
            Err(KernelError::AuthRequired(challenges)) => return self.pause_for_auth(task, challenges).await,
            Err(e) => return Err(e.into()),
        };

        task.status = TaskStatus::Running;
        let request_id = task
            .items
            .last()
            .map(|it| it.request_id.clone())
            .ok_or_else(|| RuntimeError::NoPendingToolCalls(task.task_id.clone()))?;
        let messages = build_messages(task);
        self.run_loop_marking_failures(&kernel, task, &request_id, mcp_servers, messages).await
    }

    async fn resume_elicitation(
        &self,
        task: &mut Task,
        local_plugin_ids: &[String],
        mcp_servers: &[McpServerConfig],
        elicitation_id: ElicitationId,
        content: Value,
    ) -> RuntimeResult<TurnOutcome> {
        let state = self.discovery.get(&task.user_id, &task.session_id).await?;
        let Some(pending) = state.pending_elicitations.get(&elicitation_id).cloned() else {
            return Err(RuntimeError::UnknownElicitation(task.task_id.clone(), elicitation_id));
        };

        let popped_id = elicitation_id.clone();
        self.discovery
            .mutate(
                &task.user_id,
                &task.session_id,
                Box::new(move |state| {
                    state.pending_elicitations.remove(&popped_id);
                }),
            )
            .await?;

        let kernel = match self
            .kernel_builder
            .build(&task.user_id, &task.session_id, local_plugin_ids, mcp_servers)
            .await
        {
            Ok(kernel) => kernel,
            Err(KernelError::AuthRequired(challenges)) => return self.pause_for_auth(task, challenges).await,
            Err(e) => return Err(e.into()),
        };

        task.status = TaskStatus::Running;
        let request_id = task
            .items
            .last()
            .map(|it| it.request_id.clone())
            .ok_or_else(|| RuntimeError::NoPendingToolCalls(task.task_id.clone()))?;
        let mut messages = build_messages(task);
        let mut sessions = HashMap::new();

        let intent = ToolCallIntent {
            id: pending.elicitation_id.to_string(),
            plugin: mcp_plugin_id(&pending.server),
            function: pending.tool_name.clone(),
            arguments: content,
        };
        if let Some(outcome) = self
            .execute_and_record(&kernel, task, &intent, mcp_servers, &mut messages, &mut sessions)
            .await?
        {
            return Ok(outcome);
        }

        self.run_loop_marking_failures(&kernel, task, &request_id, mcp_servers, messages).await
    }
}
