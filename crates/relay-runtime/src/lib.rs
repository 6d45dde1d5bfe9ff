//! Task Orchestrator and Resume Handler (C12, C13; spec §4.9, §4.10).
//!
//! The state machine that drives one turn of a conversation: build a kernel
//! (C9), invoke the model, gate proposed tool calls through the HITL gate
//! (C10), execute approved calls against local plugins or MCP servers (C6),
//! and persist the task (C3) at every pause and completion point.

pub mod error;
pub mod orchestrator;
pub mod resume;
pub mod tool_exec;

pub use error::{RuntimeError, RuntimeResult};
pub use orchestrator::{Orchestrator, TurnRequest};
pub use resume::{ResumeAction, ResumeRequest};
pub use tool_exec::{CodeToolExecutor, UnconfiguredCodeToolExecutor};
pub use tokio_util::sync::CancellationToken;
