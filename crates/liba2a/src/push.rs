use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use a2a_protocol::{PushConfig, Task, TaskId};

use crate::context::CallContext;
use crate::error::{A2aError, A2aResult};

/// Storage for the push notification callbacks registered on each task.
#[async_trait]
pub trait PushConfigStore: Send + Sync {
    /// Store a config, assigning an id when it has none. Replaces a config with the same id.
    async fn save(&self, ctx: &CallContext, task_id: &str, config: PushConfig) -> A2aResult<PushConfig>;

    async fn get(&self, ctx: &CallContext, task_id: &str, config_id: &str) -> A2aResult<PushConfig>;

    /// All configs of a task in registration order. Empty for unknown tasks.
    async fn list(&self, ctx: &CallContext, task_id: &str) -> A2aResult<Vec<PushConfig>>;

    async fn delete(&self, ctx: &CallContext, task_id: &str, config_id: &str) -> A2aResult<()>;
}

/// Delivers task snapshots to the callbacks registered for them.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn send_push(&self, ctx: &CallContext, task: &Task) -> A2aResult<()>;
}

#[derive(Default)]
pub struct InMemoryPushConfigStore {
    configs: RwLock<HashMap<TaskId, Vec<PushConfig>>>,
}

impl InMemoryPushConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(task_id: &str, config_id: &str) -> A2aError {
    A2aError::PushConfigNotFound {
        task_id: task_id.to_string(),
        config_id: config_id.to_string(),
    }
}

#[async_trait]
impl PushConfigStore for InMemoryPushConfigStore {
    async fn save(&self, _ctx: &CallContext, task_id: &str, mut config: PushConfig) -> A2aResult<PushConfig> {
        if config.id.is_empty() {
            config.id = uuid::Uuid::new_v4().to_string();
        }

        let mut configs = self.configs.write().await;
        let entries = configs.entry(task_id.to_string()).or_default();
        match entries.iter_mut().find(|c| c.id == config.id) {
            Some(existing) => *existing = config.clone(),
            None => entries.push(config.clone()),
        }
        Ok(config)
    }

    async fn get(&self, _ctx: &CallContext, task_id: &str, config_id: &str) -> A2aResult<PushConfig> {
        self.configs
            .read()
            .await
            .get(task_id)
            .and_then(|entries| entries.iter().find(|c| c.id == config_id))
            .cloned()
            .ok_or_else(|| not_found(task_id, config_id))
    }

    async fn list(&self, _ctx: &CallContext, task_id: &str) -> A2aResult<Vec<PushConfig>> {
        Ok(self
            .configs
            .read()
            .await
            .get(task_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, _ctx: &CallContext, task_id: &str, config_id: &str) -> A2aResult<()> {
        let mut configs = self.configs.write().await;
        let entries = configs
            .get_mut(task_id)
            .ok_or_else(|| not_found(task_id, config_id))?;

        let before_len = entries.len();
        entries.retain(|c| c.id != config_id);
        if entries.len() == before_len {
            return Err(not_found(task_id, config_id));
        }
        if entries.is_empty() {
            configs.remove(task_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(id: &str, url: &str) -> PushConfig {
        PushConfig {
            id: id.to_string(),
            url: url.to_string(),
            ..PushConfig::default()
        }
    }

    #[tokio::test]
    async fn save_assigns_missing_id() {
        let ctx = CallContext::new();
        let store = InMemoryPushConfigStore::new();
        let saved = store.save(&ctx, "t1", config("", "https://cb")).await.unwrap();
        assert!(!saved.id.is_empty());
        assert_eq!(store.get(&ctx, "t1", &saved.id).await.unwrap(), saved);
    }

    #[tokio::test]
    async fn save_replaces_same_id() {
        let ctx = CallContext::new();
        let store = InMemoryPushConfigStore::new();
        store.save(&ctx, "t1", config("a", "https://one")).await.unwrap();
        store.save(&ctx, "t1", config("b", "https://two")).await.unwrap();
        store.save(&ctx, "t1", config("a", "https://three")).await.unwrap();

        let listed = store.list(&ctx, "t1").await.unwrap();
        let urls: Vec<_> = listed.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(urls, vec!["https://three", "https://two"]);
    }

    #[tokio::test]
    async fn delete_and_missing_entries() {
        let ctx = CallContext::new();
        let store = InMemoryPushConfigStore::new();
        assert!(store.list(&ctx, "t1").await.unwrap().is_empty());

        store.save(&ctx, "t1", config("a", "https://one")).await.unwrap();
        store.delete(&ctx, "t1", "a").await.unwrap();

        let err = store.get(&ctx, "t1", "a").await.unwrap_err();
        assert!(matches!(err, A2aError::PushConfigNotFound { .. }));
        let err = store.delete(&ctx, "t1", "a").await.unwrap_err();
        assert!(matches!(err, A2aError::PushConfigNotFound { .. }));
    }
}
