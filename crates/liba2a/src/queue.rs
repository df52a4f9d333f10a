use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use a2a_protocol::Event;

use crate::context::CallContext;
use crate::error::{A2aError, A2aResult};
use crate::semaphore::Semaphore;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Ordered handoff of one task's events from an agent executor to the request handler.
#[async_trait]
pub trait EventQueue: Send + Sync {
    /// Enqueue an event, waiting while a bounded queue is full.
    async fn write(&self, ctx: &CallContext, event: Event) -> A2aResult<()>;

    /// Dequeue the next event, waiting while the queue is empty.
    async fn read(&self, ctx: &CallContext) -> A2aResult<Event>;

    /// Refuse further writes. Events already buffered remain readable.
    async fn close(&self) -> A2aResult<()>;
}

/// Bounded in-process [`EventQueue`].
pub struct InMemoryQueue {
    // Held by a writer for its whole enqueue attempt, which may be long when the
    // buffer is full. Close takes it too so the buffer is never torn down under a write.
    admission: Semaphore,
    sender: Mutex<Option<mpsc::Sender<Event>>>,
    receiver: Mutex<mpsc::Receiver<Event>>,
    // Fired first thing in close so a writer parked on a full buffer gives up its permit.
    closing: CancellationToken,
    // Serializes close calls: later callers wait for the first to finish.
    close_lock: Mutex<()>,
    closed: AtomicBool,
}

impl InMemoryQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            admission: Semaphore::new(1),
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(rx),
            closing: CancellationToken::new(),
            close_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[async_trait]
impl EventQueue for InMemoryQueue {
    async fn write(&self, ctx: &CallContext, event: Event) -> A2aResult<()> {
        let _permit = self.admission.acquire_with_context(ctx).await?;

        if self.closing.is_cancelled() {
            return Err(A2aError::QueueClosed);
        }

        let sender = self.sender.lock().await;
        let Some(tx) = sender.as_ref() else {
            return Err(A2aError::QueueClosed);
        };

        tokio::select! {
            biased;
            _ = self.closing.cancelled() => Err(A2aError::QueueClosed),
            sent = tx.send(event) => sent.map_err(|_| A2aError::QueueClosed),
            err = ctx.done() => Err(err),
        }
    }

    async fn read(&self, ctx: &CallContext) -> A2aResult<Event> {
        // Buffered events drain before QueueClosed is reported.
        let mut receiver = tokio::select! {
            biased;
            receiver = self.receiver.lock() => receiver,
            err = ctx.done() => return Err(err),
        };

        tokio::select! {
            biased;
            event = receiver.recv() => event.ok_or(A2aError::QueueClosed),
            err = ctx.done() => Err(err),
        }
    }

    async fn close(&self) -> A2aResult<()> {
        let _close_guard = self.close_lock.lock().await;
        if self.is_closed() {
            return Ok(());
        }

        self.closing.cancel();
        let permit = self.admission.acquire().await?;

        // Dropping the only sender lets readers drain what is buffered, then see QueueClosed.
        self.sender.lock().await.take();
        self.closed.store(true, Ordering::Release);
        self.admission.close();
        drop(permit);

        debug!("event queue closed");
        Ok(())
    }
}
