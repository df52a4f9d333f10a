use serde::{Deserialize, Serialize};

use crate::{Metadata, TaskId};

/// Authentication details for a push notification endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PushAuthInfo {
    pub schemes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

/// Where and how the agent should deliver task update notifications.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct PushConfig {
    /// Client-chosen id, allowing several callbacks per task. Assigned by the store when empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<PushAuthInfo>,
}

/// A push configuration bound to a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskPushConfig {
    pub task_id: TaskId,
    pub config: PushConfig,
}

/// Parameters of `tasks/pushNotificationConfig/get`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GetTaskPushConfigParams {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// Parameters of `tasks/pushNotificationConfig/list`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ListTaskPushConfigParams {
    pub task_id: TaskId,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// Parameters of `tasks/pushNotificationConfig/delete`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeleteTaskPushConfigParams {
    pub task_id: TaskId,
    pub config_id: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}
