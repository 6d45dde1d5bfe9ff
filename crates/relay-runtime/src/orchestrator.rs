//! Task Orchestrator (C12, spec §4.9).
//!
//! Grounded on `astrid-runtime::runtime::AgentRuntime`'s turn-loop structure
//! (hook firing replaced by the simpler governance + audit calls this spec
//! names; no sub-agent pool, since dispatch across multiple agents is C11's
//! concern, not C12's).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use relay_core::ids::{RequestId, SessionId, TaskId, UserId};
use relay_core::plugin::PluginType;
use relay_core::signal::{PendingElicitation, PendingToolCall, TurnOutcome};
use relay_core::task::{AgentTaskItem, MultiModalItem, Task, TaskStatus};
use relay_kernel::{Kernel, KernelBuilder, KernelError};
use relay_llm::provider::{Completion, Message, MessageRole, StreamEvent, TokenUsage, ToolCallIntent};
use relay_mcp::{McpClient, McpError, McpServerConfig, Session, ToolCallOutcome, aggregate_auth_required};
use relay_storage::catalog::mcp_plugin_id;
use relay_storage::{DiscoveryStore, PluginCatalog, TaskPersistence};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use relay_approval::gate::{InterventionOutcome, check_for_intervention};
use relay_audit::{AuditEntry, AuditLog, AuditOutcome};

use crate::error::{RuntimeError, RuntimeResult};
use crate::tool_exec::CodeToolExecutor;

/// Upper bound on the number of model-invoke/tool-execute round trips within
/// one turn, guarding against a misbehaving model that never stops
/// requesting tool calls. Not named by the spec; chosen generously above any
/// realistic tool chain.
const MAX_TOOL_LOOP_ITERATIONS: usize = 25;

/// One user turn's input. `local_plugin_ids`/`mcp_servers` mirror the
/// arguments `KernelBuilder::build` needs — the deployment decides which
/// tools a given conversation may reach, so the caller (HTTP surface)
/// supplies them per request rather than the orchestrator hardcoding them.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub user_id: UserId,
    pub task_id: Option<TaskId>,
    pub request_id: RequestId,
    pub message: MultiModalItem,
    pub local_plugin_ids: Vec<String>,
    pub mcp_servers: Vec<McpServerConfig>,
}

/// The state machine described by spec §4.9. Holds the shared, process-wide
/// singletons (task store, catalog, audit log) plus the collaborators each
/// turn drives through: the kernel builder (C9), the MCP client (C6) for
/// tool execution, and the pluggable code-tool executor.
pub struct Orchestrator {
    pub(crate) tasks: Arc<dyn TaskPersistence>,
    pub(crate) kernel_builder: Arc<KernelBuilder>,
    pub(crate) mcp_client: Arc<McpClient>,
    pub(crate) catalog: Arc<dyn PluginCatalog>,
    pub(crate) discovery: Arc<dyn DiscoveryStore>,
    pub(crate) code_tools: Arc<dyn CodeToolExecutor>,
    pub(crate) audit: Arc<AuditLog>,
    /// Per-task advisory lock (spec §5: "only one turn may be in-flight for
    /// a given task_id at a time"). Entries are never removed; the memory
    /// cost is one empty mutex per task ever seen, which is negligible next
    /// to the task record itself.
    pub(crate) locks: dashmap::DashMap<TaskId, Arc<Mutex<()>>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskPersistence>,
        kernel_builder: Arc<KernelBuilder>,
        mcp_client: Arc<McpClient>,
        catalog: Arc<dyn PluginCatalog>,
        discovery: Arc<dyn DiscoveryStore>,
        code_tools: Arc<dyn CodeToolExecutor>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            tasks,
            kernel_builder,
            mcp_client,
            catalog,
            discovery,
            code_tools,
            audit,
            locks: dashmap::DashMap::new(),
        }
    }

    /// Resolves the `task_id` a given `request_id` landed on — needed by the
    /// HTTP surface to echo `task_id` back to a caller that omitted it on a
    /// fresh conversation (`run_turn` generates one internally when absent).
    pub async fn task_id_for_request(&self, request_id: &RequestId) -> RuntimeResult<Option<TaskId>> {
        Ok(self.tasks.load_by_request_id(request_id).await?.map(|task| task.task_id))
    }

    pub(crate) async fn lock_for(&self, task_id: &TaskId) -> Arc<Mutex<()>> {
        self.locks
            .entry(task_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs one non-streaming turn to completion or the first pause point.
    pub async fn run_turn(&self, req: TurnRequest) -> RuntimeResult<TurnOutcome> {
        let task_id = req.task_id.clone().unwrap_or_else(TaskId::generate);
        let lock = self.lock_for(&task_id).await;
        let _guard = lock.lock().await;
        self.run_turn_locked(req, task_id).await
    }

    /// Runs one turn, abortable by `cancel` (spec §5, "Cancellation"): the
    /// HTTP surface triggers `cancel` when the client disconnects mid-request.
    /// Grounded on `astrid-runtime::subagent_executor`'s
    /// `tokio::select! { biased; () = cancel_token.cancelled() => .., result = .. }`
    /// pattern over a `CancellationToken`, which the teacher also depends on
    /// (`astrid-runtime`'s own `Cargo.toml`).
    ///
    /// If no assistant item had been appended for this request when the
    /// cancellation landed, the task is marked `Canceled`; otherwise it is
    /// left as-is so another client can re-attach via `load_by_request_id`.
    pub async fn run_turn_cancelable(&self, req: TurnRequest, cancel: CancellationToken) -> RuntimeResult<TurnOutcome> {
        let task_id = req.task_id.clone();
        let request_id = req.request_id.clone();
        tokio::select! {
            biased;
            () = cancel.cancelled() => self.cancel_turn(task_id, &request_id).await,
            result = self.run_turn(req) => result,
        }
    }

    async fn cancel_turn(&self, task_id: Option<TaskId>, request_id: &RequestId) -> RuntimeResult<TurnOutcome> {
        let task = match task_id {
            Some(id) => self.tasks.load(&id).await?,
            None => self.tasks.load_by_request_id(request_id).await?,
        };
        if let Some(mut task) = task {
            if task.assistant_item_for(request_id).is_none() {
                task.status = TaskStatus::Canceled;
                self.tasks.update(task).await?;
            }
        }
        Err(RuntimeError::Canceled)
    }

    async fn run_turn_locked(&self, req: TurnRequest, task_id: TaskId) -> RuntimeResult<TurnOutcome> {
        let mut task = self.load_or_create_task(&req, task_id).await?;

        if let Some(prior) = task.assistant_item_for(&req.request_id) {
            // Idempotent replay (spec §4.9 "Idempotency"): the request was
            // already served; total token usage from that turn was not
            // persisted on the item, so it is reported as zero here rather
            // than re-invoking the model to recompute it.
            return Ok(TurnOutcome::Completed {
                output: prior.item.content.clone(),
                total_tokens: 0,
            });
        }

        task.push_item(AgentTaskItem::user(
            task.task_id.clone(),
            req.request_id.clone(),
            req.message.clone(),
        ));
        self.tasks.update(task.clone()).await?;

        let kernel = match self
            .kernel_builder
            .build(&task.user_id, &task.session_id, &req.local_plugin_ids, &req.mcp_servers)
            .await
        {
            Ok(kernel) => kernel,
            Err(KernelError::AuthRequired(challenges)) => {
                return self.pause_for_auth(&mut task, challenges).await;
            }
            Err(e) => return Err(e.into()),
        };

        let messages = build_messages(&task);
        self.run_loop_marking_failures(&kernel, &mut task, &req.request_id, &req.mcp_servers, messages)
            .await
    }

    /// Runs the agent loop (spec §4.9 step 5/7): on an uncaught error, marks
    /// the task `Failed` and persists that before propagating the error.
    /// Shared by the initial turn and every resume path that re-enters the
    /// loop (approve, auth_complete, elicitation_response).
    pub(crate) async fn run_loop_marking_failures(
        &self,
        kernel: &Kernel,
        task: &mut Task,
        request_id: &RequestId,
        mcp_servers: &[McpServerConfig],
        messages: Vec<Message>,
    ) -> RuntimeResult<TurnOutcome> {
        match self.run_agent_loop(kernel, task, request_id, mcp_servers, messages).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                task.status = TaskStatus::Failed;
                // Best-effort: the turn already failed, so a persistence
                // error here is logged rather than masking the real cause.
                if let Err(persist_err) = self.tasks.update(task.clone()).await {
                    warn!(error = %persist_err, task_id = %task.task_id, "failed to persist Failed status");
                }
                Err(e)
            }
        }
    }

    /// Runs one turn, forwarding a `TurnOutcome::PartialOutput` over `tx` for
    /// every streamed text delta before sending the terminal outcome (spec
    /// §4.9 step 5, streaming branch; `invoke/stream`'s SSE body). Sends its
    /// result on `tx` itself, rather than returning it, since the HTTP
    /// surface owns converting each sent value into one `text/event-stream`
    /// frame.
    pub async fn run_turn_streaming(&self, req: TurnRequest, tx: mpsc::Sender<TurnOutcome>) -> RuntimeResult<()> {
        let task_id = req.task_id.clone().unwrap_or_else(TaskId::generate);
        let lock = self.lock_for(&task_id).await;
        let _guard = lock.lock().await;

        let mut task = self.load_or_create_task(&req, task_id).await?;

        if let Some(prior) = task.assistant_item_for(&req.request_id) {
            let _ = tx
                .send(TurnOutcome::Completed {
                    output: prior.item.content.clone(),
                    total_tokens: 0,
                })
                .await;
            return Ok(());
        }

        task.push_item(AgentTaskItem::user(
            task.task_id.clone(),
            req.request_id.clone(),
            req.message.clone(),
        ));
        self.tasks.update(task.clone()).await?;

        let kernel = match self
            .kernel_builder
            .build(&task.user_id, &task.session_id, &req.local_plugin_ids, &req.mcp_servers)
            .await
        {
            Ok(kernel) => kernel,
            Err(KernelError::AuthRequired(challenges)) => {
                let outcome = self.pause_for_auth(&mut task, challenges).await?;
                let _ = tx.send(outcome).await;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let messages = build_messages(&task);
        match self
            .run_agent_loop_streaming(&kernel, &mut task, &req.request_id, &req.mcp_servers, messages, &tx)
            .await
        {
            Ok(outcome) => {
                let _ = tx.send(outcome).await;
                Ok(())
            }
            Err(e) => {
                task.status = TaskStatus::Failed;
                if let Err(persist_err) = self.tasks.update(task.clone()).await {
                    warn!(error = %persist_err, task_id = %task.task_id, "failed to persist Failed status");
                }
                Err(e)
            }
        }
    }

    /// Streaming counterpart to `run_agent_loop`: every round invokes
    /// `kernel.llm.stream` instead of `complete`, forwarding each
    /// `StreamEvent::TextDelta` as a `PartialOutput` as it arrives, then
    /// reuses `handle_completion` unchanged once the round's stream ends.
    async fn run_agent_loop_streaming(
        &self,
        kernel: &Kernel,
        task: &mut Task,
        request_id: &RequestId,
        mcp_servers: &[McpServerConfig],
        mut messages: Vec<Message>,
        tx: &mpsc::Sender<TurnOutcome>,
    ) -> RuntimeResult<TurnOutcome> {
        let mut sessions: HashMap<String, Session> = HashMap::new();

        for _ in 0..MAX_TOOL_LOOP_ITERATIONS {
            let completion = self.stream_one_completion(kernel, &messages, tx).await?;

            match self
                .handle_completion(kernel, task, request_id, mcp_servers, &mut messages, &mut sessions, completion)
                .await?
            {
                LoopStep::Done(outcome) => return Ok(outcome),
                LoopStep::Continue => continue,
            }
        }

        Err(RuntimeError::ToolLoopExceeded)
    }

    /// Drains one `kernel.llm.stream` call into a `Completion`, forwarding
    /// text deltas over `tx` as they arrive.
    async fn stream_one_completion(
        &self,
        kernel: &Kernel,
        messages: &[Message],
        tx: &mpsc::Sender<TurnOutcome>,
    ) -> RuntimeResult<Completion> {
        let mut stream = kernel.llm.stream(messages).await?;
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = TokenUsage::default();

        while let Some(event) = stream.next().await {
            match event? {
                StreamEvent::TextDelta(delta) => {
                    text.push_str(&delta);
                    let _ = tx.send(TurnOutcome::PartialOutput { fragment: delta }).await;
                }
                StreamEvent::ToolCall(intent) => tool_calls.push(intent),
                StreamEvent::Usage(u) => usage.add(u),
                StreamEvent::Done => break,
            }
        }

        Ok(Completion {
            text: if tool_calls.is_empty() { Some(text) } else { None },
            tool_calls,
            usage,
        })
    }

    async fn load_or_create_task(&self, req: &TurnRequest, task_id: TaskId) -> RuntimeResult<Task> {
        match &req.task_id {
            Some(id) => {
                let task = self
                    .tasks
                    .load(id)
                    .await?
                    .ok_or_else(|| RuntimeError::TaskNotFound(id.clone()))?;
                if !task.is_owned_by(&req.user_id) {
                    return Err(RuntimeError::Forbidden(id.clone()));
                }
                Ok(task)
            }
            None => {
                let task = Task::new(task_id, SessionId::generate(), req.user_id.clone());
                self.tasks.create(task.clone()).await?;
                Ok(task)
            }
        }
    }

    pub(crate) async fn pause_for_auth(
        &self,
        task: &mut Task,
        challenges: Vec<relay_mcp::AuthRequiredError>,
    ) -> RuntimeResult<TurnOutcome> {
        task.status = TaskStatus::Paused;
        self.tasks.update(task.clone()).await?;
        self.audit.append(AuditEntry {
            timestamp: Utc::now(),
            task_id: task.task_id.clone(),
            session_id: task.session_id.clone(),
            user_id: task.user_id.clone(),
            action: "kernel_build".to_string(),
            outcome: AuditOutcome::Deferred,
        });
        Ok(TurnOutcome::AuthRequired {
            challenges: aggregate_auth_required(challenges),
        })
    }

    /// The per-turn loop (spec §4.9 step 5, non-streaming branch): invoke
    /// the model, gate any proposed tool calls through C10, execute the
    /// approved ones, and loop until the model returns plain text or the
    /// turn pauses.
    pub(crate) async fn run_agent_loop(
        &self,
        kernel: &Kernel,
        task: &mut Task,
        request_id: &RequestId,
        mcp_servers: &[McpServerConfig],
        mut messages: Vec<Message>,
    ) -> RuntimeResult<TurnOutcome> {
        let mut sessions: HashMap<String, Session> = HashMap::new();

        for _ in 0..MAX_TOOL_LOOP_ITERATIONS {
            let completion = kernel.llm.complete(&messages).await?;

            match self
                .handle_completion(kernel, task, request_id, mcp_servers, &mut messages, &mut sessions, completion)
                .await?
            {
                LoopStep::Done(outcome) => return Ok(outcome),
                LoopStep::Continue => continue,
            }
        }

        Err(RuntimeError::ToolLoopExceeded)
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_completion(
        &self,
        kernel: &Kernel,
        task: &mut Task,
        request_id: &RequestId,
        mcp_servers: &[McpServerConfig],
        messages: &mut Vec<Message>,
        sessions: &mut HashMap<String, Session>,
        completion: Completion,
    ) -> RuntimeResult<LoopStep> {
        if completion.tool_calls.is_empty() {
            let output = completion.text.unwrap_or_default();
            task.push_item(AgentTaskItem::assistant(
                task.task_id.clone(),
                request_id.clone(),
                MultiModalItem::text(output.clone()),
            ));
            task.status = TaskStatus::Completed;
            self.tasks.update(task.clone()).await?;
            return Ok(LoopStep::Done(TurnOutcome::Completed {
                output,
                total_tokens: completion.usage.total_tokens,
            }));
        }

        let mut requires_hitl = false;
        for call in &completion.tool_calls {
            if check_for_intervention(self.catalog.as_ref(), call).await == InterventionOutcome::Required {
                requires_hitl = true;
                break;
            }
        }

        if requires_hitl {
            let pending: Vec<PendingToolCall> = completion.tool_calls.iter().map(to_pending).collect();
            let mut item = AgentTaskItem::assistant(
                task.task_id.clone(),
                request_id.clone(),
                MultiModalItem::text(String::new()),
            );
            item.pending_tool_calls = Some(serde_json::to_value(&pending).expect("PendingToolCall is serializable"));
            item.chat_history = Some(serde_json::to_value(&*messages).expect("Message is serializable"));
            task.push_item(item);
            task.status = TaskStatus::Paused;
            self.tasks.update(task.clone()).await?;
            self.audit.append(AuditEntry {
                timestamp: Utc::now(),
                task_id: task.task_id.clone(),
                session_id: task.session_id.clone(),
                user_id: task.user_id.clone(),
                action: "hitl_check".to_string(),
                outcome: AuditOutcome::Deferred,
            });
            return Ok(LoopStep::Done(TurnOutcome::HitlRequired { tool_calls: pending }));
        }

        for call in &completion.tool_calls {
            self.audit.append(AuditEntry {
                timestamp: Utc::now(),
                task_id: task.task_id.clone(),
                session_id: task.session_id.clone(),
                user_id: task.user_id.clone(),
                action: format!("tool_call:{}", call.function),
                outcome: AuditOutcome::Allowed,
            });
            if let Some(outcome) = self
                .execute_and_record(kernel, task, call, mcp_servers, messages, sessions)
                .await?
            {
                return Ok(LoopStep::Done(outcome));
            }
        }

        Ok(LoopStep::Continue)
    }

    /// Executes one approved tool call and appends its result to `messages`.
    /// Returns `Some(outcome)` if the call pauses the turn (elicitation or a
    /// fresh auth challenge discovered mid-call), `None` to keep looping.
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn execute_and_record(
        &self,
        kernel: &Kernel,
        task: &mut Task,
        call: &ToolCallIntent,
        mcp_servers: &[McpServerConfig],
        messages: &mut Vec<Message>,
        sessions: &mut HashMap<String, Session>,
    ) -> RuntimeResult<Option<TurnOutcome>> {
        match self.execute_tool_call(kernel, call, mcp_servers, &task.user_id, &task.session_id, sessions).await {
            ToolExecResult::Value(value) => {
                messages.push(Message {
                    role: MessageRole::Tool,
                    content: value.to_string(),
                });
                Ok(None)
            }
            ToolExecResult::Elicitation(elicitation) => {
                task.status = TaskStatus::Paused;
                self.tasks.update(task.clone()).await?;
                Ok(Some(TurnOutcome::ElicitationRequired { elicitation }))
            }
            ToolExecResult::AuthRequired(err) => {
                let outcome = self
                    .pause_for_auth(task, vec![err])
                    .await?;
                Ok(Some(outcome))
            }
            ToolExecResult::Error(message) => {
                messages.push(Message {
                    role: MessageRole::Tool,
                    content: format!("error: {message}"),
                });
                Ok(None)
            }
        }
    }

    async fn get_or_open_session(
        &self,
        cfg: &McpServerConfig,
        user_id: &UserId,
        session_id: &SessionId,
        sessions: &mut HashMap<String, Session>,
    ) -> Result<Session, McpError> {
        if let Some(session) = sessions.get(&cfg.name) {
            return Ok(session.clone());
        }
        let session = self.mcp_client.open_session(cfg, user_id, session_id).await?;
        sessions.insert(cfg.name.clone(), session.clone());
        Ok(session)
    }

    async fn execute_tool_call(
        &self,
        _kernel: &Kernel,
        call: &ToolCallIntent,
        mcp_servers: &[McpServerConfig],
        user_id: &UserId,
        session_id: &SessionId,
        sessions: &mut HashMap<String, Session>,
    ) -> ToolExecResult {
        let Some(plugin) = self.catalog.get_plugin(&call.plugin).await else {
            return ToolExecResult::Error(format!("unknown plugin: {}", call.plugin));
        };

        if plugin.plugin_type != PluginType::Mcp {
            return match self.code_tools.execute(&call.plugin, &call.function, call.arguments.clone()).await {
                Ok(value) => ToolExecResult::Value(value),
                Err(message) => ToolExecResult::Error(message),
            };
        }

        let Some(cfg) = mcp_servers.iter().find(|s| mcp_plugin_id(&s.name) == call.plugin) else {
            return ToolExecResult::Error(format!("no mcp server configured for plugin {}", call.plugin));
        };

        let session = match self.get_or_open_session(cfg, user_id, session_id, sessions).await {
            Ok(session) => session,
            Err(McpError::AuthRequired(err)) => return ToolExecResult::AuthRequired(err),
            Err(e) => return ToolExecResult::Error(e.to_string()),
        };

        match self
            .mcp_client
            .call_tool(cfg, &session, user_id, session_id, &call.function, call.arguments.clone())
            .await
        {
            Ok(ToolCallOutcome::Success(value)) => ToolExecResult::Value(value),
            Ok(ToolCallOutcome::ElicitationRequired(pending)) => ToolExecResult::Elicitation(pending),
            Err(McpError::AuthRequired(err)) => ToolExecResult::AuthRequired(err),
            Err(e) => ToolExecResult::Error(e.to_string()),
        }
    }
}

enum LoopStep {
    Done(TurnOutcome),
    Continue,
}

enum ToolExecResult {
    Value(serde_json::Value),
    Elicitation(PendingElicitation),
    AuthRequired(relay_mcp::AuthRequiredError),
    Error(String),
}

fn to_pending(call: &ToolCallIntent) -> PendingToolCall {
    PendingToolCall {
        id: call.id.clone(),
        plugin: call.plugin.clone(),
        function: call.function.clone(),
        arguments: call.arguments.clone(),
    }
}

/// Builds the model-visible conversation from a task's recorded items (spec
/// §4.9 step 4: "each `MultiModalItem` becomes one model-visible content
/// chunk"). Image items are passed through as their raw content string
/// (a data URI); rendering them for a multi-modal model is a concern of the
/// concrete `LlmProvider`, not this boundary.
pub(crate) fn build_messages(task: &Task) -> Vec<Message> {
    task.items
        .iter()
        .map(|item| match item.role {
            relay_core::task::Role::User => Message::user(item.item.content.clone()),
            relay_core::task::Role::Assistant => Message::assistant(item.item.content.clone()),
        })
        .collect()
}
