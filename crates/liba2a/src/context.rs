use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::A2aError;

/// Cancellation and deadline scope threaded through every blocking call.
///
/// Cloning shares the same cancellation state. Use [`CallContext::child`] to
/// derive a scope that can be canceled on its own without affecting the parent.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Derived context, canceled whenever `self` is. Keeps the parent's deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel this context when the returned guard is dropped.
    pub fn drop_guard(&self) -> DropGuard {
        self.token.clone().drop_guard()
    }

    /// The cause if the context has already fired.
    pub fn err(&self) -> Option<A2aError> {
        if self.token.is_cancelled() {
            return Some(A2aError::Canceled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(A2aError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context is canceled or its deadline passes.
    pub async fn done(&self) -> A2aError {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => A2aError::Canceled,
                    _ = tokio::time::sleep_until(deadline) => A2aError::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                A2aError::Canceled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_resolves_done() {
        let ctx = CallContext::new();
        assert!(ctx.err().is_none());
        ctx.cancel();
        assert!(matches!(ctx.err(), Some(A2aError::Canceled)));
        assert!(matches!(ctx.done().await, A2aError::Canceled));
    }

    #[tokio::test]
    async fn deadline_resolves_done() {
        let ctx = CallContext::with_timeout(Duration::from_millis(20));
        assert!(matches!(ctx.done().await, A2aError::DeadlineExceeded));
        assert!(matches!(ctx.err(), Some(A2aError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn child_inherits_deadline() {
        let ctx = CallContext::with_timeout(Duration::from_secs(5));
        let child = ctx.child();
        assert!(ctx.deadline().is_some());
        assert_eq!(child.deadline(), ctx.deadline());
    }

    #[tokio::test]
    async fn child_follows_parent_but_not_reverse() {
        let parent = CallContext::new();
        let child = parent.child();
        child.cancel();
        assert!(parent.err().is_none());

        let second = parent.child();
        assert!(second.deadline().is_none());
        parent.cancel();
        assert!(matches!(second.err(), Some(A2aError::Canceled)));
    }

    #[tokio::test]
    async fn drop_guard_cancels() {
        let ctx = CallContext::new();
        let guard = ctx.drop_guard();
        assert!(ctx.err().is_none());
        drop(guard);
        assert!(matches!(ctx.err(), Some(A2aError::Canceled)));
    }
}
