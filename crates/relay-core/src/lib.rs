//! Shared data model for the relay agent orchestration runtime.
//!
//! This crate has no async runtime dependency and no I/O: it exists so that
//! every other `relay-*` crate can agree on task identifiers, the task/session
//! record shapes, governance metadata, and the orchestration signal type
//! without depending on each other.

pub mod error;
pub mod governance;
pub mod ids;
pub mod plugin;
pub mod signal;
pub mod task;

pub mod prelude {
    //! Common imports for downstream crates.
    pub use crate::error::{RelayError, RelayResult};
    pub use crate::governance::{Cost, DataSensitivity, Governance};
    pub use crate::ids::{ElicitationId, RequestId, SessionId, TaskId, UserId};
    pub use crate::plugin::{Plugin, PluginTool};
    pub use crate::signal::TurnOutcome;
    pub use crate::task::{AgentTaskItem, MultiModalItem, Task, TaskStatus};
}
