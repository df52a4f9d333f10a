use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use tracing::{debug, info, warn};

use a2a_protocol::{
    DeleteTaskPushConfigParams, Event, GetTaskPushConfigParams, ListTaskPushConfigParams,
    MessageSendParams, SendMessageResult, Task, TaskId, TaskIdParams, TaskPushConfig,
    TaskQueryParams,
};

use crate::config::HandlerConfig;
use crate::context::CallContext;
use crate::error::{A2aError, A2aResult};
use crate::executor::{AgentExecutor, RequestContext};
use crate::push::{PushConfigStore, PushNotifier};
use crate::queue_manager::{InMemoryQueueManager, QueueManager};
use crate::task_store::{TaskStore, TaskStoreSaver};
use crate::task_update::TaskUpdateManager;

/// Lazily produced events of a streaming call, one result per event.
pub type EventStream = BoxStream<'static, A2aResult<Event>>;

/// Protocol method surface consumed by transports.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// `tasks/get`
    async fn on_get_task(&self, ctx: &CallContext, query: TaskQueryParams) -> A2aResult<Task>;

    /// `tasks/cancel`
    async fn on_cancel_task(&self, ctx: &CallContext, params: TaskIdParams) -> A2aResult<Task>;

    /// `message/send`
    ///
    /// Only the first event the agent writes is consumed and the task's queue
    /// stays registered afterwards. Anything written after that first result
    /// remains buffered and is what the next send or cancel on the same task
    /// reads first.
    async fn on_send_message(
        &self,
        ctx: &CallContext,
        params: MessageSendParams,
    ) -> A2aResult<SendMessageResult>;

    /// `tasks/resubscribe`
    fn on_resubscribe_to_task(&self, ctx: &CallContext, params: TaskIdParams) -> EventStream;

    /// `message/stream`
    ///
    /// The stream owns the task's queue: it is destroyed when the stream ends
    /// or is dropped, and dropping the stream cancels the agent.
    fn on_send_message_stream(&self, ctx: &CallContext, params: MessageSendParams) -> EventStream;

    /// `tasks/pushNotificationConfig/get`
    async fn on_get_task_push_config(
        &self,
        ctx: &CallContext,
        params: GetTaskPushConfigParams,
    ) -> A2aResult<TaskPushConfig>;

    /// `tasks/pushNotificationConfig/list`
    async fn on_list_task_push_config(
        &self,
        ctx: &CallContext,
        params: ListTaskPushConfigParams,
    ) -> A2aResult<Vec<TaskPushConfig>>;

    /// `tasks/pushNotificationConfig/set`
    async fn on_set_task_push_config(
        &self,
        ctx: &CallContext,
        params: TaskPushConfig,
    ) -> A2aResult<TaskPushConfig>;

    /// `tasks/pushNotificationConfig/delete`
    async fn on_delete_task_push_config(
        &self,
        ctx: &CallContext,
        params: DeleteTaskPushConfigParams,
    ) -> A2aResult<()>;
}

/// Wires an [`AgentExecutor`] to per-task event queues and, when configured,
/// task and push config stores.
#[derive(Clone)]
pub struct DefaultRequestHandler {
    executor: Arc<dyn AgentExecutor>,
    queue_manager: Arc<dyn QueueManager>,
    task_store: Option<Arc<dyn TaskStore>>,
    push_config_store: Option<Arc<dyn PushConfigStore>>,
    push_notifier: Option<Arc<dyn PushNotifier>>,
}

impl DefaultRequestHandler {
    pub fn new(executor: Arc<dyn AgentExecutor>, config: HandlerConfig) -> Self {
        let capacity = config.queue_capacity;
        let queue_manager = config
            .queue_manager
            .unwrap_or_else(|| Arc::new(InMemoryQueueManager::with_capacity(capacity)));

        Self {
            executor,
            queue_manager,
            task_store: config.task_store,
            push_config_store: config.push_config_store,
            push_notifier: config.push_notifier,
        }
    }

    async fn request_context(
        &self,
        ctx: &CallContext,
        task_id: &str,
        params: &MessageSendParams,
    ) -> A2aResult<RequestContext> {
        let stored_task = match &self.task_store {
            Some(store) => match store.get(ctx, task_id).await {
                Ok(task) => Some(task),
                Err(A2aError::TaskNotFound(_)) => None,
                Err(err) => return Err(err),
            },
            None => None,
        };

        let context_id = params
            .message
            .context_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| stored_task.as_ref().map(|t| t.context_id.clone()));

        Ok(RequestContext {
            task_id: task_id.to_string(),
            context_id,
            message: Some(params.message.clone()),
            stored_task,
            metadata: params.metadata.clone(),
        })
    }

    /// Register the push callback a send request carries, if any.
    async fn register_push_config(
        &self,
        ctx: &CallContext,
        task_id: &str,
        params: &MessageSendParams,
    ) -> A2aResult<()> {
        let Some(config) = params
            .configuration
            .as_ref()
            .and_then(|c| c.push_config.clone())
        else {
            return Ok(());
        };
        let store = self
            .push_config_store
            .as_ref()
            .ok_or(A2aError::Unimplemented("push notifications"))?;
        store.save(ctx, task_id, config).await?;
        Ok(())
    }

    async fn notify(&self, ctx: &CallContext, task: &Task) {
        let Some(notifier) = &self.push_notifier else {
            return;
        };
        if let Err(err) = notifier.send_push(ctx, task).await {
            warn!(task_id = %task.id, error = %err, "push notification failed");
        }
    }

    fn push_config_store(&self, method: &'static str) -> A2aResult<&Arc<dyn PushConfigStore>> {
        self.push_config_store
            .as_ref()
            .ok_or(A2aError::Unimplemented(method))
    }
}

#[async_trait]
impl RequestHandler for DefaultRequestHandler {
    async fn on_get_task(&self, ctx: &CallContext, query: TaskQueryParams) -> A2aResult<Task> {
        let store = self
            .task_store
            .as_ref()
            .ok_or(A2aError::Unimplemented("tasks/get"))?;

        let mut task = store.get(ctx, &query.id).await?;
        if let Some(limit) = query.history_length {
            let excess = task.history.len().saturating_sub(limit);
            task.history.drain(..excess);
        }
        Ok(task)
    }

    async fn on_cancel_task(&self, ctx: &CallContext, params: TaskIdParams) -> A2aResult<Task> {
        let store = self
            .task_store
            .as_ref()
            .ok_or(A2aError::Unimplemented("tasks/cancel"))?;

        let task = store.get(ctx, &params.id).await?;
        if task.status.state.is_terminal() {
            return Err(A2aError::TaskNotCancelable {
                task_id: task.id,
                state: task.status.state,
            });
        }

        let queue = self
            .queue_manager
            .get_or_create(ctx, &task.id)
            .await
            .map_err(|err| A2aError::QueueRetrieval(Box::new(err)))?;

        let request = RequestContext {
            task_id: task.id.clone(),
            context_id: Some(task.context_id.clone()),
            message: None,
            stored_task: Some(task.clone()),
            metadata: params.metadata,
        };
        self.executor.cancel(ctx, &request, queue.as_ref()).await?;

        let event = queue
            .read(ctx)
            .await
            .map_err(|err| A2aError::QueueRead(Box::new(err)))?;
        let canceled = match event {
            Event::Task(canceled) => canceled,
            other => return Err(A2aError::UnexpectedEventType(other.kind_name())),
        };

        let mut recorder = TaskRecorder::new(Arc::clone(store), Some(task));
        recorder.record(ctx, Event::Task(canceled.clone())).await?;
        self.notify(ctx, &canceled).await;

        info!(task_id = %canceled.id, state = %canceled.status.state, "task cancel handled");
        Ok(canceled)
    }

    async fn on_send_message(
        &self,
        ctx: &CallContext,
        params: MessageSendParams,
    ) -> A2aResult<SendMessageResult> {
        let task_id = params
            .message
            .task_id()
            .ok_or(A2aError::MissingTaskId)?
            .to_string();
        self.register_push_config(ctx, &task_id, &params).await?;

        let queue = self
            .queue_manager
            .get_or_create(ctx, &task_id)
            .await
            .map_err(|err| A2aError::QueueRetrieval(Box::new(err)))?;

        let request = self.request_context(ctx, &task_id, &params).await?;
        self.executor.execute(ctx, &request, queue.as_ref()).await?;

        let event = queue
            .read(ctx)
            .await
            .map_err(|err| A2aError::QueueRead(Box::new(err)))?;

        let result = match event {
            Event::Message(message) => SendMessageResult::Message(message),
            Event::Task(task) => SendMessageResult::Task(task),
            other => return Err(A2aError::UnexpectedEventType(other.kind_name())),
        };

        if let (Some(store), SendMessageResult::Task(task)) = (&self.task_store, &result) {
            let mut recorder = TaskRecorder::new(Arc::clone(store), request.stored_task);
            if recorder.record(ctx, Event::Task(task.clone())).await? {
                self.notify(ctx, task).await;
            }
        }

        debug!(task_id = %task_id, "message send handled");
        Ok(result)
    }

    fn on_resubscribe_to_task(&self, _ctx: &CallContext, _params: TaskIdParams) -> EventStream {
        Box::pin(stream::iter([Err(A2aError::Unimplemented(
            "tasks/resubscribe",
        ))]))
    }

    fn on_send_message_stream(&self, ctx: &CallContext, params: MessageSendParams) -> EventStream {
        let handler = self.clone();
        let ctx = ctx.clone();

        Box::pin(async_stream::stream! {
            let Some(task_id) = params.message.task_id().map(str::to_string) else {
                yield Err(A2aError::MissingTaskId);
                return;
            };
            if let Err(err) = handler.register_push_config(&ctx, &task_id, &params).await {
                yield Err(err);
                return;
            }

            let queue = match handler.queue_manager.get_or_create(&ctx, &task_id).await {
                Ok(queue) => queue,
                Err(err) => {
                    yield Err(A2aError::QueueRetrieval(Box::new(err)));
                    return;
                }
            };
            let release = QueueRelease::new(Arc::clone(&handler.queue_manager), task_id.clone());

            let request = match handler.request_context(&ctx, &task_id, &params).await {
                Ok(request) => request,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            let mut recorder = handler
                .task_store
                .clone()
                .map(|store| TaskRecorder::new(store, request.stored_task.clone()));

            // The executor runs alongside this reader and stops once the consumer goes away.
            let exec_ctx = ctx.child();
            let _cancel_on_drop = exec_ctx.drop_guard();
            let execution = {
                let executor = Arc::clone(&handler.executor);
                let queue = Arc::clone(&queue);
                tokio::spawn(async move {
                    let result = executor.execute(&exec_ctx, &request, queue.as_ref()).await;
                    // Lets the reader drain what was written and then stop.
                    if let Err(err) = queue.close().await {
                        warn!(error = %err, "failed to close queue after execution");
                    }
                    result
                })
            };

            let mut drained = false;
            loop {
                let event = match queue.read(&ctx).await {
                    Ok(event) => event,
                    Err(A2aError::QueueClosed) => {
                        drained = true;
                        break;
                    }
                    Err(err) => {
                        yield Err(A2aError::QueueRead(Box::new(err)));
                        break;
                    }
                };

                if let Some(recorder) = recorder.as_mut() {
                    match recorder.record(&ctx, event.clone()).await {
                        Ok(true) => {
                            if let Some(task) = recorder.task() {
                                handler.notify(&ctx, task).await;
                            }
                        }
                        Ok(false) => {}
                        Err(err) => {
                            yield Err(err);
                            break;
                        }
                    }
                }

                let is_final = event.is_final();
                yield Ok(event);
                if is_final {
                    break;
                }
            }

            if drained {
                match execution.await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => yield Err(err),
                    Err(join_err) => {
                        yield Err(A2aError::from(anyhow::anyhow!("agent execution aborted: {join_err}")))
                    }
                }
            }

            release.release().await;
            debug!(task_id = %task_id, "message stream finished");
        })
    }

    async fn on_get_task_push_config(
        &self,
        ctx: &CallContext,
        params: GetTaskPushConfigParams,
    ) -> A2aResult<TaskPushConfig> {
        let store = self.push_config_store("tasks/pushNotificationConfig/get")?;
        let config = match params.config_id.as_deref().filter(|id| !id.is_empty()) {
            Some(config_id) => store.get(ctx, &params.task_id, config_id).await?,
            None => store
                .list(ctx, &params.task_id)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| A2aError::PushConfigNotFound {
                    task_id: params.task_id.clone(),
                    config_id: String::new(),
                })?,
        };
        Ok(TaskPushConfig {
            task_id: params.task_id,
            config,
        })
    }

    async fn on_list_task_push_config(
        &self,
        ctx: &CallContext,
        params: ListTaskPushConfigParams,
    ) -> A2aResult<Vec<TaskPushConfig>> {
        let store = self.push_config_store("tasks/pushNotificationConfig/list")?;
        let configs = store.list(ctx, &params.task_id).await?;
        Ok(configs
            .into_iter()
            .map(|config| TaskPushConfig {
                task_id: params.task_id.clone(),
                config,
            })
            .collect())
    }

    async fn on_set_task_push_config(
        &self,
        ctx: &CallContext,
        params: TaskPushConfig,
    ) -> A2aResult<TaskPushConfig> {
        let store = self.push_config_store("tasks/pushNotificationConfig/set")?;
        if params.task_id.is_empty() {
            return Err(A2aError::MissingTaskId);
        }
        let config = store.save(ctx, &params.task_id, params.config).await?;
        Ok(TaskPushConfig {
            task_id: params.task_id,
            config,
        })
    }

    async fn on_delete_task_push_config(
        &self,
        ctx: &CallContext,
        params: DeleteTaskPushConfigParams,
    ) -> A2aResult<()> {
        let store = self.push_config_store("tasks/pushNotificationConfig/delete")?;
        store.delete(ctx, &params.task_id, &params.config_id).await
    }
}

/// Destroys a streamed task's queue once the stream finishes, or from a
/// spawned task when the stream is dropped before that.
struct QueueRelease {
    manager: Arc<dyn QueueManager>,
    task_id: Option<TaskId>,
}

impl QueueRelease {
    fn new(manager: Arc<dyn QueueManager>, task_id: TaskId) -> Self {
        Self {
            manager,
            task_id: Some(task_id),
        }
    }

    async fn release(mut self) {
        if let Some(task_id) = self.task_id.take() {
            destroy_queue(Arc::clone(&self.manager), task_id).await;
        }
    }
}

impl Drop for QueueRelease {
    fn drop(&mut self) {
        let Some(task_id) = self.task_id.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(destroy_queue(Arc::clone(&self.manager), task_id));
            }
            Err(_) => warn!(task_id = %task_id, "no runtime left to release queue"),
        }
    }
}

async fn destroy_queue(manager: Arc<dyn QueueManager>, task_id: TaskId) {
    match manager.destroy(&CallContext::new(), &task_id).await {
        Ok(()) => debug!(task_id = %task_id, "stream queue released"),
        Err(err) => debug!(task_id = %task_id, error = %err, "queue already released"),
    }
}

/// Routes a request's events into the task store through a [`TaskUpdateManager`].
struct TaskRecorder {
    store: Arc<dyn TaskStore>,
    manager: Option<TaskUpdateManager>,
}

impl TaskRecorder {
    fn new(store: Arc<dyn TaskStore>, existing: Option<Task>) -> Self {
        let saver = Arc::new(TaskStoreSaver::new(Arc::clone(&store)));
        let manager = existing.map(|task| TaskUpdateManager::new(saver, task));
        Self { store, manager }
    }

    fn task(&self) -> Option<&Task> {
        self.manager.as_ref().map(TaskUpdateManager::task)
    }

    /// Apply one event. Returns whether a task snapshot was persisted.
    async fn record(&mut self, ctx: &CallContext, event: Event) -> A2aResult<bool> {
        if matches!(event, Event::Message(_)) {
            return Ok(false);
        }
        if let Some(manager) = self.manager.as_mut() {
            manager.process(ctx, event).await?;
            return Ok(true);
        }

        let saver = Arc::new(TaskStoreSaver::new(Arc::clone(&self.store)));
        let manager = match event {
            Event::Task(task) => {
                self.store.save(ctx, &task).await?;
                TaskUpdateManager::new(saver, task)
            }
            other => {
                let task_id = other.task_id().unwrap_or_default().to_string();
                let task = self.store.get(ctx, &task_id).await?;
                let mut manager = TaskUpdateManager::new(saver, task);
                manager.process(ctx, other).await?;
                manager
            }
        };
        self.manager = Some(manager);
        Ok(true)
    }
}
