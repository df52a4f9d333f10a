use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use a2a_protocol::TaskId;

use crate::context::CallContext;
use crate::error::{A2aError, A2aResult};
use crate::queue::{DEFAULT_QUEUE_CAPACITY, EventQueue, InMemoryQueue};

/// Registry holding exactly one live queue per task.
#[async_trait]
pub trait QueueManager: Send + Sync {
    /// Return the task's queue, creating it if none is registered.
    async fn get_or_create(&self, ctx: &CallContext, task_id: &str) -> A2aResult<Arc<dyn EventQueue>>;

    /// Close the task's queue and forget it.
    async fn destroy(&self, ctx: &CallContext, task_id: &str) -> A2aResult<()>;
}

/// [`QueueManager`] keeping [`InMemoryQueue`]s in a mutex-guarded map.
pub struct InMemoryQueueManager {
    queues: Mutex<HashMap<TaskId, Arc<InMemoryQueue>>>,
    capacity: usize,
}

impl InMemoryQueueManager {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Manager whose queues buffer at most `capacity` events each.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.queues.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queues.lock().await.is_empty()
    }
}

impl Default for InMemoryQueueManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueManager for InMemoryQueueManager {
    async fn get_or_create(&self, _ctx: &CallContext, task_id: &str) -> A2aResult<Arc<dyn EventQueue>> {
        let mut queues = self.queues.lock().await;
        let queue = queues.entry(task_id.to_string()).or_insert_with(|| {
            debug!(task_id = %task_id, capacity = self.capacity, "event queue created");
            Arc::new(InMemoryQueue::new(self.capacity))
        });
        Ok(Arc::clone(queue) as Arc<dyn EventQueue>)
    }

    async fn destroy(&self, _ctx: &CallContext, task_id: &str) -> A2aResult<()> {
        // Unregister under the lock, close outside it: close may wait on an in-flight writer.
        let queue = self
            .queues
            .lock()
            .await
            .remove(task_id)
            .ok_or_else(|| A2aError::QueueNotFound(task_id.to_string()))?;

        queue.close().await?;
        info!(task_id = %task_id, "event queue destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_protocol::{Event, Message, Part, Role};

    fn message() -> Event {
        Event::Message(Message::new(Role::User, vec![Part::text("test")]))
    }

    #[tokio::test]
    async fn get_or_create_returns_same_queue() {
        let ctx = CallContext::new();
        let m = InMemoryQueueManager::new();

        let q1 = m.get_or_create(&ctx, "task-1").await.unwrap();
        let q2 = m.get_or_create(&ctx, "task-1").await.unwrap();
        assert!(Arc::ptr_eq(&q1, &q2));
        assert_eq!(m.len().await, 1);
    }

    #[tokio::test]
    async fn destroy_existing_closes_and_unregisters() {
        let ctx = CallContext::new();
        let m = InMemoryQueueManager::new();
        let q = m.get_or_create(&ctx, "task-1").await.unwrap();

        m.destroy(&ctx, "task-1").await.unwrap();
        assert!(m.is_empty().await);

        let err = q.write(&ctx, message()).await.unwrap_err();
        assert!(matches!(err, A2aError::QueueClosed));

        let fresh = m.get_or_create(&ctx, "task-1").await.unwrap();
        assert!(!Arc::ptr_eq(&q, &fresh));
        fresh.write(&ctx, message()).await.unwrap();
    }

    #[tokio::test]
    async fn destroy_missing_fails() {
        let ctx = CallContext::new();
        let m = InMemoryQueueManager::new();
        let err = m.destroy(&ctx, "task-1").await.unwrap_err();
        assert!(matches!(err, A2aError::QueueNotFound(ref id) if id == "task-1"));
        assert_eq!(
            err.to_string(),
            "queue cannot be destroyed as queue for taskId: task-1 does not exist"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_creation_yields_one_queue_per_task() {
        let m = Arc::new(InMemoryQueueManager::new());
        let num_tasks = 100;
        let num_task_ids = 10;

        let handles: Vec<_> = (0..num_tasks)
            .map(|i| {
                let m = Arc::clone(&m);
                tokio::spawn(async move {
                    let task_id = format!("task-{}", i % num_task_ids);
                    let q = m.get_or_create(&CallContext::new(), &task_id).await.unwrap();
                    (task_id, q)
                })
            })
            .collect();

        let ctx = CallContext::new();
        for handle in handles {
            let (task_id, q) = handle.await.unwrap();
            let existing = m.get_or_create(&ctx, &task_id).await.unwrap();
            assert!(Arc::ptr_eq(&q, &existing));
        }
        assert_eq!(m.len().await, num_task_ids);
    }

    #[tokio::test]
    async fn zero_capacity_is_normalized() {
        let ctx = CallContext::new();
        let m = InMemoryQueueManager::with_capacity(0);
        let q = m.get_or_create(&ctx, "t").await.unwrap();
        q.write(&ctx, message()).await.unwrap();
        assert!(q.read(&ctx).await.is_ok());
    }
}
