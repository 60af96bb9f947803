mod builder;
pub use builder::ExecutorBuilder;

mod pool;
pub(crate) use pool::WorkerPool;

use std::{fmt, sync::Arc};

use tagvisor_model::{ExecutorConfig, Tags};
use tracing::{debug, info, instrument};

use crate::{
    CoreError, EventLoop, Locked, Pack, Submission, Task, TaskHandler, TaskSet,
    domain::{Domain, Record, Values},
    listener::{ErrorHandler, TaskListener},
    set::interrupt_matching,
};

/// Entry point: owns the lock domain, the worker pool, the global listeners
/// and the shutdown flag.
///
/// Cheap to clone; clones share everything. The worker pool is released when
/// the last clone (including those held by live handlers) is dropped.
#[derive(Clone)]
pub struct TaskExecutor {
    shared: Arc<Shared>,
}

struct Shared {
    domain: Arc<Domain>,
    pool: WorkerPool,
    event_loop: Option<EventLoop>,
    args: Pack,
    config: ExecutorConfig,
}

impl TaskExecutor {
    /// Executor with its own worker pool and default listeners.
    pub fn new(config: ExecutorConfig) -> Result<Self, CoreError> {
        Self::builder(config).build()
    }

    pub fn builder(config: ExecutorConfig) -> ExecutorBuilder {
        ExecutorBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: ExecutorConfig,
        pool: WorkerPool,
        event_loop: Option<EventLoop>,
        listeners: Vec<Arc<dyn TaskListener>>,
        error_handler: Option<Arc<dyn ErrorHandler>>,
    ) -> Self {
        let domain = Domain::new();
        {
            let mut core = domain.lock();
            core.registry.listeners = listeners;
            if let Some(error_handler) = error_handler {
                core.registry.error_handler = error_handler;
            }
        }
        let args = Pack::in_domain(&domain, Values::new());

        Self {
            shared: Arc::new(Shared {
                domain,
                pool,
                event_loop,
                args,
                config,
            }),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.shared.config
    }

    /// Take the executor lock to inspect handlers and packs atomically.
    pub fn lock(&self) -> Locked<'_> {
        Locked::new(&self.shared.domain)
    }

    /// Pack shared by the executor and every task it runs.
    pub fn args(&self) -> &Pack {
        &self.shared.args
    }

    /// Empty pack under the executor lock.
    pub fn new_pack(&self) -> Pack {
        Pack::in_domain(&self.shared.domain, Values::new())
    }

    /// Independent pack under the executor lock with the entries of `source`.
    pub fn new_pack_from(&self, source: &Pack) -> Pack {
        source.copy_into(&self.shared.domain)
    }

    /// Live view of the handlers carrying every tag in `tags`.
    pub fn queue(&self, tags: impl Into<Tags>) -> TaskSet {
        TaskSet::new(self.clone(), tags.into())
    }

    /// Live view of every handler.
    pub fn all(&self) -> TaskSet {
        self.queue(Tags::none())
    }

    /// Submit `task` with `tags`, fresh arguments and no extra listeners.
    pub fn execute<T: Task>(&self, task: T, tags: impl Into<Tags>) -> TaskHandler {
        self.submit(Submission::new(task).with_tags(tags))
    }

    /// Submit without blocking and return the handler.
    ///
    /// Arguments under another lock are copied into a pack under this
    /// executor's lock. After [`shutdown`](Self::shutdown), or while an
    /// interrupted [`TaskSet`] covering `tags` still has live handlers, the
    /// handler is born `Canceled` and its body never runs.
    #[instrument(level = "debug", skip(self, submission), fields(task = submission.task.name(), tags = %submission.tags))]
    pub fn submit(&self, submission: Submission) -> TaskHandler {
        let Submission {
            task,
            args,
            listeners: extra,
            tags,
        } = submission;

        let domain = &self.shared.domain;
        let args = match args {
            Some(pack) => pack.rehome(domain),
            None => self.new_pack(),
        };
        let owner = self.queue(tags.clone());

        let (handler, born_canceled) = {
            let mut core = domain.lock();
            let born_canceled = core.scope_interrupted(&tags);

            let mut listeners = core.registry.listeners.clone();
            listeners.extend(extra);

            let handler = TaskHandler::new(
                self.clone(),
                owner,
                task,
                args,
                tags.clone(),
                listeners,
            );
            core.tasks
                .insert(handler.id(), Record::new(born_canceled));
            if born_canceled {
                handler.token().cancel();
            } else {
                core.registry.index.add(handler.clone(), tags);
            }
            (handler, born_canceled)
        };

        if born_canceled {
            debug!(task = %handler.id(), "submitted into interrupted scope; born canceled");
        } else {
            debug!(task = %handler.id(), "task submitted");
        }

        handler.clone().start();
        handler
    }

    /// Append a global listener; only handlers submitted afterwards see it.
    pub fn add_listener(&self, listener: Arc<dyn TaskListener>) {
        self.shared.domain.lock().registry.listeners.push(listener);
    }

    /// Remove the last occurrence of `listener` (compared by pointer).
    pub fn remove_listener(&self, listener: &Arc<dyn TaskListener>) -> bool {
        let removed = {
            let mut core = self.shared.domain.lock();
            let listeners = &mut core.registry.listeners;
            listeners
                .iter()
                .rposition(|l| Arc::ptr_eq(l, listener))
                .map(|at| listeners.remove(at))
        };
        removed.is_some()
    }

    pub fn set_error_handler(&self, error_handler: Arc<dyn ErrorHandler>) {
        let previous = std::mem::replace(
            &mut self.shared.domain.lock().registry.error_handler,
            error_handler,
        );
        drop(previous);
    }

    pub fn error_handler(&self) -> Arc<dyn ErrorHandler> {
        Arc::clone(&self.shared.domain.lock().registry.error_handler)
    }

    /// Stop accepting work and interrupt every live handler. Idempotent.
    pub fn shutdown(&self) {
        let touched = {
            let mut core = self.shared.domain.lock();
            if core.registry.shutdown {
                return;
            }
            core.registry.shutdown = true;
            interrupt_matching(&mut core, &Tags::none(), &[])
        };
        for handler in &touched {
            handler.wake();
        }
        info!(interrupted = touched.len(), "executor shut down");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.domain.lock().registry.shutdown
    }

    pub(crate) fn domain(&self) -> &Arc<Domain> {
        &self.shared.domain
    }

    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.shared.pool
    }

    pub(crate) fn event_loop(&self) -> Option<&EventLoop> {
        self.shared.event_loop.as_ref()
    }
}

impl fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("config", &self.shared.config)
            .field("event_loop", &self.shared.event_loop)
            .finish()
    }
}
