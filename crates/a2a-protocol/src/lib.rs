pub mod push;

pub use push::{
    DeleteTaskPushConfigParams, GetTaskPushConfigParams, ListTaskPushConfigParams, PushAuthInfo,
    PushConfig, TaskPushConfig,
};

use serde::{Deserialize, Serialize};

/// Unique identifier for a task, stable for the task's whole lifetime.
pub type TaskId = String;

/// Identifier grouping related tasks and messages into one conversation.
pub type ContextId = String;

/// String-keyed extension data attached to tasks, messages, and events.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

pub fn new_task_id() -> TaskId {
    uuid::Uuid::new_v4().to_string()
}

pub fn new_context_id() -> ContextId {
    uuid::Uuid::new_v4().to_string()
}

pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Who authored a message.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

/// File payload, either referenced by URI or carried inline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum FileContent {
    Uri(String),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

/// One piece of message or artifact content.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Metadata::is_empty")]
        metadata: Metadata,
    },
    Data {
        data: serde_json::Value,
        #[serde(default, skip_serializing_if = "Metadata::is_empty")]
        metadata: Metadata,
    },
    File {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        file: FileContent,
        #[serde(default, skip_serializing_if = "Metadata::is_empty")]
        metadata: Metadata,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// A single turn of communication between a client and an agent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: String,
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<ContextId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_task_ids: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Message {
    /// Build a message with a fresh id and the given parts.
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            message_id: new_message_id(),
            role,
            parts,
            task_id: None,
            context_id: None,
            reference_task_ids: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_task(mut self, task_id: impl Into<TaskId>, context_id: impl Into<ContextId>) -> Self {
        self.task_id = Some(task_id.into());
        self.context_id = Some(context_id.into());
        self
    }

    /// The task id this message belongs to, treating an empty id as absent.
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Text of the first text part, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }
}

/// Lifecycle state of a task.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    AuthRequired,
    Completed,
    Canceled,
    Failed,
    Rejected,
    #[default]
    Unknown,
}

impl TaskState {
    /// A terminal state admits no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Canceled | TaskState::Failed | TaskState::Rejected
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::AuthRequired => "auth-required",
            TaskState::Completed => "completed",
            TaskState::Canceled => "canceled",
            TaskState::Failed => "failed",
            TaskState::Rejected => "rejected",
            TaskState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Current status of a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct TaskStatus {
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_ms: Option<u64>,
}

impl TaskStatus {
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp_ms: None,
        }
    }

    pub fn with_message(state: TaskState, message: Message) -> Self {
        Self {
            state,
            message: Some(message),
            timestamp_ms: None,
        }
    }
}

/// Output produced by an agent for a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Artifact {
    pub artifact_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Artifact {
    pub fn new(artifact_id: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            artifact_id: artifact_id.into(),
            name: None,
            description: None,
            parts,
            metadata: Metadata::new(),
        }
    }
}

/// Stateful unit of agent work.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Task {
    pub id: TaskId,
    pub context_id: ContextId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Message>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, context_id: impl Into<ContextId>) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            ..Self::default()
        }
    }
}

/// Build a freshly submitted task whose history starts with `message`.
pub fn new_submitted_task(message: Message) -> Task {
    let context_id = message
        .context_id
        .clone()
        .filter(|id| !id.is_empty())
        .unwrap_or_else(new_context_id);

    Task {
        id: new_task_id(),
        context_id,
        status: TaskStatus::new(TaskState::Submitted),
        history: vec![message],
        artifacts: Vec::new(),
        metadata: Metadata::new(),
    }
}

/// Status change notification for a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskStatusUpdateEvent {
    pub task_id: TaskId,
    pub context_id: ContextId,
    pub status: TaskStatus,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl TaskStatusUpdateEvent {
    pub fn new(task_id: impl Into<TaskId>, context_id: impl Into<ContextId>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            status,
            is_final: false,
            metadata: Metadata::new(),
        }
    }
}

/// Artifact produced or extended for a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskArtifactUpdateEvent {
    pub task_id: TaskId,
    pub context_id: ContextId,
    pub artifact: Artifact,
    /// Extend a previously sent artifact with the same id instead of replacing it.
    #[serde(default)]
    pub append: bool,
    #[serde(default)]
    pub last_chunk: bool,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl TaskArtifactUpdateEvent {
    pub fn new(task_id: impl Into<TaskId>, context_id: impl Into<ContextId>, artifact: Artifact) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            artifact,
            append: false,
            last_chunk: false,
            metadata: Metadata::new(),
        }
    }
}

/// Events an agent executor writes to a task's queue.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    Message(Message),
    Task(Task),
    StatusUpdate(TaskStatusUpdateEvent),
    ArtifactUpdate(TaskArtifactUpdateEvent),
}

impl Event {
    /// Name of the concrete variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Event::Message(_) => "Message",
            Event::Task(_) => "Task",
            Event::StatusUpdate(_) => "TaskStatusUpdateEvent",
            Event::ArtifactUpdate(_) => "TaskArtifactUpdateEvent",
        }
    }

    /// Task id carried by the event. Plain messages only carry one optionally.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Event::Message(m) => m.task_id(),
            Event::Task(t) => Some(&t.id),
            Event::StatusUpdate(e) => Some(&e.task_id),
            Event::ArtifactUpdate(e) => Some(&e.task_id),
        }
    }

    /// Whether no further events are expected for the request after this one.
    pub fn is_final(&self) -> bool {
        match self {
            Event::Message(_) => true,
            Event::Task(t) => t.status.state.is_terminal(),
            Event::StatusUpdate(e) => e.is_final || e.status.state.is_terminal(),
            Event::ArtifactUpdate(_) => false,
        }
    }
}

impl From<Message> for Event {
    fn from(message: Message) -> Self {
        Event::Message(message)
    }
}

impl From<Task> for Event {
    fn from(task: Task) -> Self {
        Event::Task(task)
    }
}

impl From<TaskStatusUpdateEvent> for Event {
    fn from(event: TaskStatusUpdateEvent) -> Self {
        Event::StatusUpdate(event)
    }
}

impl From<TaskArtifactUpdateEvent> for Event {
    fn from(event: TaskArtifactUpdateEvent) -> Self {
        Event::ArtifactUpdate(event)
    }
}

/// Result of a non-streaming send: the agent either answers directly or returns a task.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SendMessageResult {
    Message(Message),
    Task(Task),
}

impl From<SendMessageResult> for Event {
    fn from(result: SendMessageResult) -> Self {
        match result {
            SendMessageResult::Message(m) => Event::Message(m),
            SendMessageResult::Task(t) => Event::Task(t),
        }
    }
}

/// Optional knobs for a send request.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MessageSendConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accepted_output_modes: Vec<String>,
    #[serde(default)]
    pub blocking: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_config: Option<PushConfig>,
}

/// Parameters of `message/send` and `message/stream`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageSendParams {
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<MessageSendConfig>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl MessageSendParams {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            configuration: None,
            metadata: Metadata::new(),
        }
    }
}

/// Parameters of `tasks/get`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskQueryParams {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// Parameters of `tasks/cancel` and `tasks/resubscribe`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskIdParams {
    pub id: TaskId,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl TaskIdParams {
    pub fn new(id: impl Into<TaskId>) -> Self {
        Self {
            id: id.into(),
            metadata: Metadata::new(),
        }
    }
}

/// Error codes for structured error handling.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidParams,
    TaskNotFound,
    TaskNotCancelable,
    PushNotificationNotSupported,
    UnsupportedOperation,
    Internal,
}

impl ErrorCode {
    /// Numeric code used on JSON-RPC transports.
    pub fn json_rpc_code(self) -> i32 {
        match self {
            ErrorCode::InvalidParams => -32602,
            ErrorCode::TaskNotFound => -32001,
            ErrorCode::TaskNotCancelable => -32002,
            ErrorCode::PushNotificationNotSupported => -32003,
            ErrorCode::UnsupportedOperation => -32004,
            ErrorCode::Internal => -32603,
        }
    }
}

/// Base64 encoding for byte arrays in JSON.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        for state in [
            TaskState::Completed,
            TaskState::Canceled,
            TaskState::Failed,
            TaskState::Rejected,
        ] {
            assert!(state.is_terminal(), "{state} should be terminal");
        }
        for state in [
            TaskState::Submitted,
            TaskState::Working,
            TaskState::InputRequired,
            TaskState::AuthRequired,
            TaskState::Unknown,
        ] {
            assert!(!state.is_terminal(), "{state} should not be terminal");
        }
    }

    #[test]
    fn event_tag_format() {
        let event = Event::StatusUpdate(TaskStatusUpdateEvent::new(
            "t1",
            "c1",
            TaskStatus::new(TaskState::Working),
        ));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "status-update");
        assert_eq!(json["task_id"], "t1");
        assert_eq!(json["status"]["state"], "working");
        assert_eq!(json["final"], false);
    }

    #[test]
    fn event_kind_names() {
        let msg = Message::new(Role::Agent, vec![Part::text("hi")]);
        assert_eq!(Event::from(msg).kind_name(), "Message");
        assert_eq!(Event::from(Task::new("t", "c")).kind_name(), "Task");
        let artifact = TaskArtifactUpdateEvent::new("t", "c", Artifact::new("a", vec![]));
        assert_eq!(Event::from(artifact).kind_name(), "TaskArtifactUpdateEvent");
    }

    #[test]
    fn final_events() {
        let msg = Message::new(Role::Agent, vec![Part::text("done")]);
        assert!(Event::from(msg).is_final());

        let mut task = Task::new("t", "c");
        assert!(!Event::from(task.clone()).is_final());
        task.status.state = TaskState::Completed;
        assert!(Event::from(task).is_final());

        let mut update = TaskStatusUpdateEvent::new("t", "c", TaskStatus::new(TaskState::Working));
        assert!(!Event::from(update.clone()).is_final());
        update.is_final = true;
        assert!(Event::from(update).is_final());
    }

    #[test]
    fn message_empty_task_id_is_absent() {
        let mut msg = Message::new(Role::User, vec![Part::text("hi")]);
        assert_eq!(msg.task_id(), None);
        msg.task_id = Some(String::new());
        assert_eq!(msg.task_id(), None);
        msg.task_id = Some("t1".to_string());
        assert_eq!(msg.task_id(), Some("t1"));
    }

    #[test]
    fn submitted_task_keeps_message_context() {
        let msg = Message::new(Role::User, vec![Part::text("hi")]).with_task("ignored", "ctx-1");
        let task = new_submitted_task(msg.clone());
        assert_eq!(task.context_id, "ctx-1");
        assert_eq!(task.status.state, TaskState::Submitted);
        assert_eq!(task.history, vec![msg]);
        assert!(!task.id.is_empty());
    }

    #[test]
    fn submitted_task_generates_context() {
        let msg = Message::new(Role::User, vec![Part::text("hi")]);
        let task = new_submitted_task(msg);
        assert!(!task.context_id.is_empty());
    }

    #[test]
    fn file_bytes_are_base64() {
        let part = Part::File {
            name: Some("a.bin".to_string()),
            mime_type: None,
            file: FileContent::Bytes(vec![1, 2, 3]),
            metadata: Metadata::new(),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["file"]["bytes"], "AQID");
        let parsed: Part = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, part);
    }

    #[test]
    fn error_codes() {
        assert_eq!(ErrorCode::TaskNotFound.json_rpc_code(), -32001);
        assert_eq!(ErrorCode::UnsupportedOperation.json_rpc_code(), -32004);
    }
}
