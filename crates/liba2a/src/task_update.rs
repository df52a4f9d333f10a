use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use a2a_protocol::{Event, Metadata, Task, TaskArtifactUpdateEvent, TaskStatusUpdateEvent};

use crate::context::CallContext;
use crate::error::{A2aError, A2aResult};

/// Sink receiving every task snapshot a [`TaskUpdateManager`] commits.
#[async_trait]
pub trait Saver: Send + Sync {
    async fn save(&self, ctx: &CallContext, task: &Task) -> A2aResult<()>;
}

/// Folds agent events into one task, persisting each transition.
///
/// Not meant for concurrent use: callers apply a task's events one at a time.
/// A failed save leaves the managed task exactly as it was before the event.
pub struct TaskUpdateManager {
    task: Task,
    saver: Arc<dyn Saver>,
}

impl TaskUpdateManager {
    pub fn new(saver: Arc<dyn Saver>, task: Task) -> Self {
        Self { task, saver }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn into_task(self) -> Task {
        self.task
    }

    pub async fn process(&mut self, ctx: &CallContext, event: Event) -> A2aResult<()> {
        match event {
            Event::Message(_) => Ok(()),
            Event::Task(snapshot) => {
                self.validate(&snapshot.id, &snapshot.context_id)?;
                self.commit(ctx, snapshot).await
            }
            Event::StatusUpdate(update) => {
                self.validate(&update.task_id, &update.context_id)?;
                let next = apply_status_update(&self.task, update);
                self.commit(ctx, next).await
            }
            Event::ArtifactUpdate(update) => {
                self.validate(&update.task_id, &update.context_id)?;
                let next = apply_artifact_update(&self.task, update);
                self.commit(ctx, next).await
            }
        }
    }

    async fn commit(&mut self, ctx: &CallContext, next: Task) -> A2aResult<()> {
        self.saver.save(ctx, &next).await?;
        debug!(task_id = %next.id, state = %next.status.state, "task updated");
        self.task = next;
        Ok(())
    }

    fn validate(&self, task_id: &str, context_id: &str) -> A2aResult<()> {
        if self.task.id != task_id {
            return Err(A2aError::TaskIdMismatch {
                expected: self.task.id.clone(),
                actual: task_id.to_string(),
            });
        }
        if self.task.context_id != context_id {
            return Err(A2aError::ContextIdMismatch {
                expected: self.task.context_id.clone(),
                actual: context_id.to_string(),
            });
        }
        Ok(())
    }
}

/// The superseded status message moves into history before the new status lands.
fn apply_status_update(current: &Task, update: TaskStatusUpdateEvent) -> Task {
    let mut next = current.clone();
    if let Some(previous) = next.status.message.take() {
        next.history.push(previous);
    }
    merge_metadata(&mut next.metadata, update.metadata);
    next.status = update.status;
    next
}

/// Artifacts are keyed by id. Appending extends the parts of an existing artifact,
/// otherwise the artifact replaces its namesake in place or is added at the end.
fn apply_artifact_update(current: &Task, update: TaskArtifactUpdateEvent) -> Task {
    let mut next = current.clone();
    let incoming = update.artifact;

    match next
        .artifacts
        .iter_mut()
        .find(|a| a.artifact_id == incoming.artifact_id)
    {
        Some(existing) if update.append => {
            existing.parts.extend(incoming.parts);
            merge_metadata(&mut existing.metadata, incoming.metadata);
            if incoming.name.is_some() {
                existing.name = incoming.name;
            }
            if incoming.description.is_some() {
                existing.description = incoming.description;
            }
        }
        Some(existing) => *existing = incoming,
        None => next.artifacts.push(incoming),
    }

    merge_metadata(&mut next.metadata, update.metadata);
    next
}

fn merge_metadata(target: &mut Metadata, updates: Metadata) {
    for (key, value) in updates {
        target.insert(key, value);
    }
}
