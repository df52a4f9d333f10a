use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::push::{InMemoryPushConfigStore, PushConfigStore, PushNotifier};
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::queue_manager::QueueManager;
use crate::task_store::{InMemoryTaskStore, TaskStore};

/// Collaborators and limits of a [`crate::DefaultRequestHandler`].
///
/// Unset collaborators get defaults: an in-memory queue manager sized by
/// `queue_capacity`. Without a task store or push config store the protocol
/// methods relying on them answer `Unimplemented`.
#[derive(Clone)]
pub struct HandlerConfig {
    pub queue_capacity: usize,
    pub queue_manager: Option<Arc<dyn QueueManager>>,
    pub task_store: Option<Arc<dyn TaskStore>>,
    pub push_config_store: Option<Arc<dyn PushConfigStore>>,
    pub push_notifier: Option<Arc<dyn PushNotifier>>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_manager: None,
            task_store: None,
            push_config_store: None,
            push_notifier: None,
        }
    }
}

impl std::fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("queue_capacity", &self.queue_capacity)
            .field("queue_manager", &self.queue_manager.is_some())
            .field("task_store", &self.task_store.is_some())
            .field("push_config_store", &self.push_config_store.is_some())
            .field("push_notifier", &self.push_notifier.is_some())
            .finish()
    }
}

/// File-backed runtime settings.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_true")]
    pub in_memory_task_store: bool,
    #[serde(default)]
    pub in_memory_push_config_store: bool,
}

impl RuntimeConfig {
    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(contents)?;
        config.queue_capacity = config.queue_capacity.max(1);
        Ok(config)
    }

    pub fn into_handler_config(self) -> HandlerConfig {
        HandlerConfig {
            queue_capacity: self.queue_capacity,
            task_store: self
                .in_memory_task_store
                .then(|| Arc::new(InMemoryTaskStore::new()) as Arc<dyn TaskStore>),
            push_config_store: self
                .in_memory_push_config_store
                .then(|| Arc::new(InMemoryPushConfigStore::new()) as Arc<dyn PushConfigStore>),
            ..HandlerConfig::default()
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            in_memory_task_store: true,
            in_memory_push_config_store: false,
        }
    }
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_true() -> bool {
    true
}
