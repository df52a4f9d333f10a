use tokio::sync::SemaphorePermit;

use crate::context::CallContext;
use crate::error::{A2aError, A2aResult};

/// Admission gate whose acquisition can be abandoned when the caller's context fires.
///
/// Once [`Semaphore::close`] is called every pending and future acquisition fails
/// with [`A2aError::QueueClosed`]; permits already handed out stay valid until dropped.
#[derive(Debug)]
pub struct Semaphore {
    inner: tokio::sync::Semaphore,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            inner: tokio::sync::Semaphore::new(permits),
        }
    }

    /// Wait for a permit without a cancellation scope.
    pub async fn acquire(&self) -> A2aResult<SemaphorePermit<'_>> {
        self.inner.acquire().await.map_err(|_| A2aError::QueueClosed)
    }

    /// Wait for a permit, giving up with the context's cause if it fires first.
    pub async fn acquire_with_context(&self, ctx: &CallContext) -> A2aResult<SemaphorePermit<'_>> {
        tokio::select! {
            biased;
            permit = self.inner.acquire() => permit.map_err(|_| A2aError::QueueClosed),
            err = ctx.done() => Err(err),
        }
    }

    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn acquire_blocks_while_held() {
        let sem = Semaphore::new(1);
        let held = sem.acquire().await.unwrap();

        let ctx = CallContext::with_timeout(Duration::from_millis(50));
        let err = sem.acquire_with_context(&ctx).await.unwrap_err();
        assert!(matches!(err, A2aError::DeadlineExceeded));

        drop(held);
        let ctx = CallContext::new();
        assert!(sem.acquire_with_context(&ctx).await.is_ok());
    }

    #[tokio::test]
    async fn canceled_context_aborts_wait() {
        let sem = Semaphore::new(1);
        let _held = sem.acquire().await.unwrap();
        let ctx = CallContext::new();
        ctx.cancel();
        let err = sem.acquire_with_context(&ctx).await.unwrap_err();
        assert!(matches!(err, A2aError::Canceled));
    }

    #[tokio::test]
    async fn close_wakes_waiters() {
        let sem = std::sync::Arc::new(Semaphore::new(1));
        let held = sem.acquire().await.unwrap();

        let waiter = {
            let sem = std::sync::Arc::clone(&sem);
            tokio::spawn(async move {
                let ctx = CallContext::new();
                sem.acquire_with_context(&ctx).await.map(|_| ())
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        sem.close();
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(A2aError::QueueClosed)));
        assert!(sem.is_closed());
        drop(held);
    }
}
