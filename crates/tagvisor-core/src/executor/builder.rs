use std::sync::Arc;

use tagvisor_model::ExecutorConfig;
use tokio::runtime::Handle;
use tracing::debug;

use super::{TaskExecutor, WorkerPool};
use crate::{
    CoreError, EventLoop,
    listener::{ErrorHandler, TaskListener},
};

/// Builder for [`TaskExecutor`].
pub struct ExecutorBuilder {
    config: ExecutorConfig,
    listeners: Vec<Arc<dyn TaskListener>>,
    error_handler: Option<Arc<dyn ErrorHandler>>,
    event_loop: Option<EventLoop>,
    runtime: Option<Handle>,
}

impl ExecutorBuilder {
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            listeners: Vec::new(),
            error_handler: None,
            event_loop: None,
            runtime: None,
        }
    }

    /// Initial global listener, appended in call order.
    pub fn with_listener(mut self, listener: Arc<dyn TaskListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn with_listeners<I>(mut self, listeners: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn TaskListener>>,
    {
        self.listeners.extend(listeners);
        self
    }

    /// Replaces the default handler, which logs listener panics.
    pub fn with_error_handler(mut self, error_handler: Arc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(error_handler);
        self
    }

    /// Loop receiving callbacks of listeners that ask for
    /// [`Dispatch::EventLoop`](crate::Dispatch::EventLoop).
    pub fn with_event_loop(mut self, event_loop: EventLoop) -> Self {
        self.event_loop = Some(event_loop);
        self
    }

    /// Run units on an existing runtime's blocking pool instead of an owned
    /// one; `workers` and `keep_alive_ms` are then governed by that runtime.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> Result<TaskExecutor, CoreError> {
        self.config.validate()?;

        let pool = match self.runtime {
            Some(handle) => WorkerPool::shared(handle),
            None => WorkerPool::owned(&self.config)?,
        };
        debug!(
            workers = self.config.workers,
            listeners = self.listeners.len(),
            event_loop = self.event_loop.is_some(),
            "executor built"
        );

        Ok(TaskExecutor::from_parts(
            self.config,
            pool,
            self.event_loop,
            self.listeners,
            self.error_handler,
        ))
    }
}
