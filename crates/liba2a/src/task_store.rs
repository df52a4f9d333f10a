use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use a2a_protocol::{Task, TaskId};

use crate::context::CallContext;
use crate::error::{A2aError, A2aResult};
use crate::task_update::Saver;

/// Persistence for task snapshots keyed by task id.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save(&self, ctx: &CallContext, task: &Task) -> A2aResult<()>;

    /// Fails with [`A2aError::TaskNotFound`] for unknown ids.
    async fn get(&self, ctx: &CallContext, task_id: &str) -> A2aResult<Task>;
}

/// [`TaskStore`] holding independent copies of every saved task in memory.
///
/// Neither the caller's task after `save` nor the value returned by `get`
/// shares state with the stored snapshot.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save(&self, _ctx: &CallContext, task: &Task) -> A2aResult<()> {
        let copy = task.clone();
        self.tasks.write().await.insert(copy.id.clone(), copy);
        Ok(())
    }

    async fn get(&self, _ctx: &CallContext, task_id: &str) -> A2aResult<Task> {
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| A2aError::TaskNotFound(task_id.to_string()))
    }
}

/// Lets a [`TaskStore`] act as the sink of a task update manager.
pub struct TaskStoreSaver {
    store: Arc<dyn TaskStore>,
}

impl TaskStoreSaver {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Saver for TaskStoreSaver {
    async fn save(&self, ctx: &CallContext, task: &Task) -> A2aResult<()> {
        self.store.save(ctx, task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_protocol::{Message, Part, Role, TaskState, TaskStatus};

    fn sample_task() -> Task {
        let mut task = Task::new(a2a_protocol::new_task_id(), "id");
        task.metadata
            .insert("key".to_string(), serde_json::json!({ "val": 42 }));
        task
    }

    #[tokio::test]
    async fn get_saved() {
        let ctx = CallContext::new();
        let store = InMemoryTaskStore::new();
        let task = sample_task();
        store.save(&ctx, &task).await.unwrap();

        let got = store.get(&ctx, &task.id).await.unwrap();
        assert_eq!(got, task);
        assert_eq!(got.metadata["key"]["val"], 42);
    }

    #[tokio::test]
    async fn get_updated() {
        let ctx = CallContext::new();
        let store = InMemoryTaskStore::new();
        let mut task = sample_task();
        store.save(&ctx, &task).await.unwrap();

        task.context_id = "id2".to_string();
        store.save(&ctx, &task).await.unwrap();

        let got = store.get(&ctx, &task.id).await.unwrap();
        assert_eq!(got.context_id, "id2");
    }

    #[tokio::test]
    async fn stored_snapshot_is_immune_to_caller_mutation() {
        let ctx = CallContext::new();
        let store = InMemoryTaskStore::new();
        let mut task = sample_task();
        store.save(&ctx, &task).await.unwrap();

        task.metadata
            .insert("key".to_string(), serde_json::json!("changed"));
        task.history
            .push(Message::new(Role::User, vec![Part::text("hi")]));
        task.status = TaskStatus::new(TaskState::Failed);

        let mut got = store.get(&ctx, &task.id).await.unwrap();
        assert_eq!(got.metadata["key"]["val"], 42);
        assert!(got.history.is_empty());
        assert_eq!(got.status.state, TaskState::Unknown);

        got.context_id = "mutated".to_string();
        let again = store.get(&ctx, &task.id).await.unwrap();
        assert_eq!(again.context_id, "id");
    }

    #[tokio::test]
    async fn get_unknown_fails() {
        let ctx = CallContext::new();
        let store = InMemoryTaskStore::new();
        let err = store.get(&ctx, "missing").await.unwrap_err();
        assert!(matches!(err, A2aError::TaskNotFound(ref id) if id == "missing"));
    }

    #[tokio::test]
    async fn saver_adapter_writes_through() {
        let ctx = CallContext::new();
        let store = Arc::new(InMemoryTaskStore::new());
        let saver = TaskStoreSaver::new(store.clone());
        let task = sample_task();
        saver.save(&ctx, &task).await.unwrap();
        assert_eq!(store.get(&ctx, &task.id).await.unwrap(), task);
    }
}
