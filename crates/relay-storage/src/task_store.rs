//! Task Persistence (C3, spec §4.1).
//!
//! Grounded on `original_source/.../persistence/task_persistence_manager.py`'s
//! abstract `create`/`load`/`update`/`delete`/`load_by_request_id` method set.

use async_trait::async_trait;
use dashmap::DashMap;
use relay_core::ids::{RequestId, TaskId};
use relay_core::task::Task;
use tracing::warn;

use crate::error::{StorageError, StorageResult};

#[async_trait]
pub trait TaskPersistence: Send + Sync {
    async fn create(&self, task: Task) -> StorageResult<()>;
    async fn load(&self, task_id: &TaskId) -> StorageResult<Option<Task>>;
    async fn update(&self, task: Task) -> StorageResult<()>;
    async fn delete(&self, task_id: &TaskId) -> StorageResult<()>;

    /// Returns the task whose item set contains `request_id`. If multiple
    /// tasks share a `request_id`, implementations must pick deterministically
    /// (smallest `task_id` lexicographically) and log a warning (spec §9b).
    async fn load_by_request_id(&self, request_id: &RequestId) -> StorageResult<Option<Task>>;
}

/// In-memory reference implementation. The request-id index is a secondary
/// structure; `update` must remove the prior task's index entries before
/// writing the new ones (spec §4.1).
#[derive(Debug, Default)]
pub struct InMemoryTaskPersistence {
    tasks: DashMap<TaskId, Task>,
    /// request_id -> set of task_ids that currently reference it.
    request_index: DashMap<RequestId, Vec<TaskId>>,
}

impl InMemoryTaskPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_task(&self, task: &Task) {
        for request_id in task.request_ids() {
            let mut entry = self.request_index.entry(request_id.clone()).or_default();
            if !entry.contains(&task.task_id) {
                entry.push(task.task_id.clone());
            }
        }
    }

    fn deindex_task(&self, task: &Task) {
        for request_id in task.request_ids() {
            if let Some(mut entry) = self.request_index.get_mut(request_id) {
                entry.retain(|id| id != &task.task_id);
            }
        }
    }
}

#[async_trait]
impl TaskPersistence for InMemoryTaskPersistence {
    async fn create(&self, task: Task) -> StorageResult<()> {
        if self.tasks.contains_key(&task.task_id) {
            return Err(StorageError::AlreadyExists(task.task_id.to_string()));
        }
        self.index_task(&task);
        self.tasks.insert(task.task_id.clone(), task);
        Ok(())
    }

    async fn load(&self, task_id: &TaskId) -> StorageResult<Option<Task>> {
        Ok(self.tasks.get(task_id).map(|entry| entry.clone()))
    }

    async fn update(&self, task: Task) -> StorageResult<()> {
        let Some(prior) = self.tasks.get(&task.task_id).map(|e| e.clone()) else {
            return Err(StorageError::NotFound(task.task_id.to_string()));
        };
        self.deindex_task(&prior);
        self.index_task(&task);
        self.tasks.insert(task.task_id.clone(), task);
        Ok(())
    }

    async fn delete(&self, task_id: &TaskId) -> StorageResult<()> {
        let Some((_, task)) = self.tasks.remove(task_id) else {
            return Err(StorageError::NotFound(task_id.to_string()));
        };
        self.deindex_task(&task);
        Ok(())
    }

    async fn load_by_request_id(&self, request_id: &RequestId) -> StorageResult<Option<Task>> {
        let Some(candidates) = self.request_index.get(request_id) else {
            return Ok(None);
        };
        let mut ids: Vec<TaskId> = candidates.clone();
        if ids.is_empty() {
            return Ok(None);
        }
        ids.sort();
        if ids.len() > 1 {
            warn!(
                request_id = %request_id,
                candidates = ?ids,
                "multiple tasks share a request_id; picking the smallest task_id"
            );
        }
        let chosen = &ids[0];
        Ok(self.tasks.get(chosen).map(|entry| entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::ids::{SessionId, UserId};
    use relay_core::task::{AgentTaskItem, MultiModalItem};

    fn task(task_id: &str, request_id: &str) -> Task {
        let mut t = Task::new(
            TaskId::new(task_id),
            SessionId::new("s1"),
            UserId::new("u1"),
        );
        t.push_item(AgentTaskItem::user(
            t.task_id.clone(),
            RequestId::new(request_id),
            MultiModalItem::text("hi"),
        ));
        t
    }

    #[tokio::test]
    async fn create_then_load_round_trips() {
        let store = InMemoryTaskPersistence::new();
        let t = task("t1", "r1");
        store.create(t.clone()).await.unwrap();
        let loaded = store.load(&t.task_id).await.unwrap().unwrap();
        assert_eq!(loaded.task_id, t.task_id);
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let store = InMemoryTaskPersistence::new();
        let t = task("t1", "r1");
        store.create(t.clone()).await.unwrap();
        assert!(store.create(t).await.is_err());
    }

    #[tokio::test]
    async fn load_by_request_id_finds_the_task() {
        let store = InMemoryTaskPersistence::new();
        let t = task("t1", "r1");
        store.create(t.clone()).await.unwrap();
        let found = store
            .load_by_request_id(&RequestId::new("r1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.task_id, t.task_id);
    }

    #[tokio::test]
    async fn load_by_request_id_ties_prefer_smallest_task_id() {
        let store = InMemoryTaskPersistence::new();
        store.create(task("t2", "shared")).await.unwrap();
        store.create(task("t1", "shared")).await.unwrap();
        let found = store
            .load_by_request_id(&RequestId::new("shared"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.task_id, TaskId::new("t1"));
    }

    #[tokio::test]
    async fn update_removes_stale_request_index_entries() {
        let store = InMemoryTaskPersistence::new();
        let mut t = task("t1", "r1");
        store.create(t.clone()).await.unwrap();

        t.push_item(AgentTaskItem::user(
            t.task_id.clone(),
            RequestId::new("r2"),
            MultiModalItem::text("second"),
        ));
        t.items.remove(0);
        store.update(t.clone()).await.unwrap();

        assert!(
            store
                .load_by_request_id(&RequestId::new("r1"))
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .load_by_request_id(&RequestId::new("r2"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn delete_removes_record_and_index() {
        let store = InMemoryTaskPersistence::new();
        let t = task("t1", "r1");
        store.create(t.clone()).await.unwrap();
        store.delete(&t.task_id).await.unwrap();
        assert!(store.load(&t.task_id).await.unwrap().is_none());
        assert!(
            store
                .load_by_request_id(&RequestId::new("r1"))
                .await
                .unwrap()
                .is_none()
        );
    }
}
