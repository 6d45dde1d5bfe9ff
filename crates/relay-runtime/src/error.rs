use relay_core::ids::{ElicitationId, TaskId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task {0} does not belong to the authenticated user")]
    Forbidden(TaskId),

    #[error("task {0} is not paused")]
    NotPaused(TaskId),

    #[error("task {0} has no pending tool calls to resume")]
    NoPendingToolCalls(TaskId),

    #[error("task {0} has no pending elicitation matching id {1}")]
    UnknownElicitation(TaskId, ElicitationId),

    #[error("tool-call loop exceeded its iteration bound")]
    ToolLoopExceeded,

    #[error("turn canceled by caller")]
    Canceled,

    #[error(transparent)]
    Storage(#[from] relay_storage::StorageError),

    #[error(transparent)]
    Kernel(#[from] relay_kernel::KernelError),

    #[error(transparent)]
    Mcp(#[from] relay_mcp::McpError),

    #[error(transparent)]
    Llm(#[from] relay_llm::LlmError),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
