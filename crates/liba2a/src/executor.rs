use async_trait::async_trait;

use a2a_protocol::{ContextId, Message, Metadata, Task, TaskId};

use crate::context::CallContext;
use crate::error::A2aResult;
use crate::queue::EventQueue;

/// Request-scoped information handed to an [`AgentExecutor`].
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub task_id: TaskId,
    pub context_id: Option<ContextId>,
    /// Inbound message that triggered the call. Absent for cancellation.
    pub message: Option<Message>,
    /// The task as last persisted, when a task store is configured and knows it.
    pub stored_task: Option<Task>,
    /// Request metadata (caller identity, extension data, ...).
    pub metadata: Metadata,
}

/// Agent business logic.
///
/// `execute` writes zero or more progress events followed by a terminal
/// result (a message or a task snapshot) to `queue`. `cancel` asks in-flight
/// work to stop and writes the resulting task snapshot.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    async fn execute(&self, ctx: &CallContext, request: &RequestContext, queue: &dyn EventQueue) -> A2aResult<()>;

    async fn cancel(&self, ctx: &CallContext, request: &RequestContext, queue: &dyn EventQueue) -> A2aResult<()>;
}
