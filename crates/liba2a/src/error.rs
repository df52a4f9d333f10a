use a2a_protocol::{ErrorCode, TaskId, TaskState};
use thiserror::Error;

pub type A2aResult<T> = std::result::Result<T, A2aError>;

#[derive(Error, Debug)]
pub enum A2aError {
    #[error("message is missing TaskID")]
    MissingTaskId,

    #[error("task IDs don't match: {expected} != {actual}")]
    TaskIdMismatch { expected: TaskId, actual: TaskId },

    #[error("context IDs don't match: {expected} != {actual}")]
    ContextIdMismatch { expected: String, actual: String },

    #[error("queue is closed")]
    QueueClosed,

    #[error("queue cannot be destroyed as queue for taskId: {0} does not exist")]
    QueueNotFound(TaskId),

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("push config {config_id} not found for task {task_id}")]
    PushConfigNotFound { task_id: TaskId, config_id: String },

    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("unexpected event type: {0}")]
    UnexpectedEventType(&'static str),

    #[error("{0} is unimplemented")]
    Unimplemented(&'static str),

    #[error("task {task_id} cannot be canceled in state {state}")]
    TaskNotCancelable { task_id: TaskId, state: TaskState },

    #[error("failed to retrieve queue: {0}")]
    QueueRetrieval(#[source] Box<A2aError>),

    #[error("failed to read event from queue: {0}")]
    QueueRead(#[source] Box<A2aError>),

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl A2aError {
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, A2aError::Unimplemented(_))
    }

    /// Whether the failure was caused by the caller's context firing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, A2aError::Canceled | A2aError::DeadlineExceeded)
    }

    /// Convert to protocol error code and sanitized message.
    pub fn to_error_code(&self) -> (ErrorCode, String) {
        match self {
            A2aError::MissingTaskId
            | A2aError::TaskIdMismatch { .. }
            | A2aError::ContextIdMismatch { .. } => (ErrorCode::InvalidParams, self.to_string()),
            A2aError::TaskNotFound(_) => (ErrorCode::TaskNotFound, self.to_string()),
            A2aError::TaskNotCancelable { .. } => (ErrorCode::TaskNotCancelable, self.to_string()),
            A2aError::Unimplemented(_) => (ErrorCode::UnsupportedOperation, self.to_string()),
            A2aError::PushConfigNotFound { .. } => {
                (ErrorCode::PushNotificationNotSupported, self.to_string())
            }
            A2aError::QueueRetrieval(inner) | A2aError::QueueRead(inner) => {
                let (code, _) = inner.to_error_code();
                (code, self.to_string())
            }
            A2aError::Upstream(_) => (ErrorCode::Internal, "internal error".to_string()),
            A2aError::QueueClosed
            | A2aError::QueueNotFound(_)
            | A2aError::Canceled
            | A2aError::DeadlineExceeded
            | A2aError::UnexpectedEventType(_) => (ErrorCode::Internal, self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn wrapped_errors_keep_their_cause() {
        let err = A2aError::QueueRetrieval(Box::new(A2aError::QueueClosed));
        assert_eq!(err.to_string(), "failed to retrieve queue: queue is closed");
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "queue is closed");
    }

    #[test]
    fn upstream_is_transparent() {
        let err: A2aError = anyhow::anyhow!("saver failed").into();
        assert_eq!(err.to_string(), "saver failed");
        let (code, message) = err.to_error_code();
        assert_eq!(code, ErrorCode::Internal);
        assert_eq!(message, "internal error");
    }

    #[test]
    fn unimplemented_is_distinguishable() {
        let err = A2aError::Unimplemented("tasks/resubscribe");
        assert!(err.is_unimplemented());
        assert_eq!(err.to_error_code().0, ErrorCode::UnsupportedOperation);
        assert!(!A2aError::QueueClosed.is_unimplemented());
    }

    #[test]
    fn cancellation_causes_are_recognized() {
        assert!(A2aError::Canceled.is_cancellation());
        assert!(A2aError::DeadlineExceeded.is_cancellation());
        assert!(!A2aError::QueueClosed.is_cancellation());
        assert!(!A2aError::QueueRead(Box::new(A2aError::Canceled)).is_cancellation());
    }

    #[test]
    fn wrapped_codes_follow_the_cause() {
        let err = A2aError::QueueRead(Box::new(A2aError::TaskNotFound("t1".to_string())));
        assert_eq!(err.to_error_code().0, ErrorCode::TaskNotFound);
    }
}
