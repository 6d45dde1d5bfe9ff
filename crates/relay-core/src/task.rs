//! `Task`/`TaskItem` data model (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{RequestId, SessionId, TaskId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TaskStatus {
    Running,
    Paused,
    Completed,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

/// A single content chunk: UTF-8 text, or a data URI for image content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiModalItem {
    pub content_type: ContentType,
    pub content: String,
}

impl MultiModalItem {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Text,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message within a task. Items are append-only; `request_id` groups a
/// user turn and any assistant items it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTaskItem {
    pub task_id: TaskId,
    pub request_id: RequestId,
    pub role: Role,
    pub item: MultiModalItem,
    pub updated: DateTime<Utc>,
    /// Opaque serialized tool-call intents, present iff this item is an
    /// assistant message paused awaiting HITL approval.
    pub pending_tool_calls: Option<serde_json::Value>,
    /// Model-visible conversation snapshot captured at pause time, so resume
    /// can continue exactly where execution stopped.
    pub chat_history: Option<serde_json::Value>,
}

impl AgentTaskItem {
    pub fn user(task_id: TaskId, request_id: RequestId, item: MultiModalItem) -> Self {
        Self {
            task_id,
            request_id,
            role: Role::User,
            item,
            updated: Utc::now(),
            pending_tool_calls: None,
            chat_history: None,
        }
    }

    pub fn assistant(task_id: TaskId, request_id: RequestId, item: MultiModalItem) -> Self {
        Self {
            task_id,
            request_id,
            role: Role::Assistant,
            item,
            updated: Utc::now(),
            pending_tool_calls: None,
            chat_history: None,
        }
    }
}

/// Authoritative unit of work. `user_id` is assigned on create and never
/// changes; every operation against a task must verify it against the
/// authenticated principal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub session_id: SessionId,
    pub user_id: UserId,
    pub items: Vec<AgentTaskItem>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(task_id: TaskId, session_id: SessionId, user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            session_id,
            user_id,
            items: Vec::new(),
            created_at: now,
            last_updated: now,
            status: TaskStatus::Running,
        }
    }

    pub fn push_item(&mut self, item: AgentTaskItem) {
        self.last_updated = Utc::now();
        self.items.push(item);
    }

    /// Request ids present across this task's items, used to maintain the
    /// `request_id -> task_id` secondary index.
    pub fn request_ids(&self) -> impl Iterator<Item = &RequestId> {
        self.items.iter().map(|item| &item.request_id)
    }

    /// Finds the already-recorded assistant response for `request_id`, if the
    /// turn was already completed — used for idempotent replay (spec §8.2).
    pub fn assistant_item_for(&self, request_id: &RequestId) -> Option<&AgentTaskItem> {
        self.items
            .iter()
            .rev()
            .find(|it| &it.request_id == request_id && it.role == Role::Assistant)
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(TaskId::new("t1"), SessionId::new("s1"), UserId::new("u1"))
    }

    #[test]
    fn new_task_starts_running_with_no_items() {
        let t = task();
        assert_eq!(t.status, TaskStatus::Running);
        assert!(t.items.is_empty());
    }

    #[test]
    fn ownership_check_rejects_other_users() {
        let t = task();
        assert!(t.is_owned_by(&UserId::new("u1")));
        assert!(!t.is_owned_by(&UserId::new("u2")));
    }

    #[test]
    fn assistant_item_for_finds_the_latest_matching_request() {
        let mut t = task();
        let req = RequestId::new("r1");
        t.push_item(AgentTaskItem::user(
            t.task_id.clone(),
            req.clone(),
            MultiModalItem::text("hi"),
        ));
        assert!(t.assistant_item_for(&req).is_none());
        t.push_item(AgentTaskItem::assistant(
            t.task_id.clone(),
            req.clone(),
            MultiModalItem::text("hello"),
        ));
        assert!(t.assistant_item_for(&req).is_some());
    }
}
