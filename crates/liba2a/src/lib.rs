pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod handler;
pub mod push;
pub mod queue;
pub mod queue_manager;
pub mod semaphore;
pub mod task_store;
pub mod task_update;

pub use config::{HandlerConfig, RuntimeConfig};
pub use context::CallContext;
pub use error::{A2aError, A2aResult};
pub use executor::{AgentExecutor, RequestContext};
pub use handler::{DefaultRequestHandler, EventStream, RequestHandler};
pub use push::{InMemoryPushConfigStore, PushConfigStore, PushNotifier};
pub use queue::{DEFAULT_QUEUE_CAPACITY, EventQueue, InMemoryQueue};
pub use queue_manager::{InMemoryQueueManager, QueueManager};
pub use task_store::{InMemoryTaskStore, TaskStore, TaskStoreSaver};
pub use task_update::{Saver, TaskUpdateManager};
