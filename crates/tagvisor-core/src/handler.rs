use std::{
    cell::Cell,
    fmt,
    future::Future,
    hash::{Hash, Hasher},
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Condvar, PoisonError},
    time::Duration,
};

use tagvisor_model::{LifecycleEvent, Tags, TaskId, TaskState};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    JoinError, Pack, Task, TaskError, TaskExecutor, TaskSet,
    dispatch::notify,
    domain::{Core, Domain},
    listener::TaskListener,
};

thread_local! {
    /// Handler whose life cycle the current thread is driving.
    static DRIVING: Cell<Option<TaskId>> = const { Cell::new(None) };
}

struct Driving(Option<TaskId>);

impl Driving {
    fn enter(id: TaskId) -> Self {
        Self(DRIVING.with(|d| d.replace(Some(id))))
    }
}

impl Drop for Driving {
    fn drop(&mut self) {
        DRIVING.with(|d| d.set(self.0));
    }
}

/// Life-cycle controller and observable handle of one submitted task.
///
/// Cheap to clone; all clones refer to the same task. Equality and hashing
/// use the task id.
#[derive(Clone)]
pub struct TaskHandler {
    inner: Arc<HandlerInner>,
}

struct HandlerInner {
    id: TaskId,
    executor: TaskExecutor,
    owner: TaskSet,
    task: Arc<dyn Task>,
    args: Pack,
    tags: Tags,
    /// Global listeners at submission followed by the per-call ones.
    listeners: Vec<Arc<dyn TaskListener>>,
    token: CancellationToken,
    /// Signalled on settle and on interrupt; waited on with the domain lock.
    joined: Condvar,
}

impl Drop for HandlerInner {
    fn drop(&mut self) {
        self.executor.domain().bury_task(self.id);
    }
}

impl TaskHandler {
    pub(crate) fn new(
        executor: TaskExecutor,
        owner: TaskSet,
        task: Arc<dyn Task>,
        args: Pack,
        tags: Tags,
        listeners: Vec<Arc<dyn TaskListener>>,
    ) -> Self {
        Self {
            inner: Arc::new(HandlerInner {
                id: TaskId::new(),
                executor,
                owner,
                task,
                args,
                tags,
                listeners,
                token: CancellationToken::new(),
                joined: Condvar::new(),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        self.inner.task.name()
    }

    /// The submitted task, e.g. to submit it again from its own body.
    pub fn task(&self) -> Arc<dyn Task> {
        Arc::clone(&self.inner.task)
    }

    pub fn args(&self) -> &Pack {
        &self.inner.args
    }

    pub fn tags(&self) -> &Tags {
        &self.inner.tags
    }

    /// The task set this handler was submitted under.
    pub fn owner(&self) -> &TaskSet {
        &self.inner.owner
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.inner.executor
    }

    pub(crate) fn listeners(&self) -> &[Arc<dyn TaskListener>] {
        &self.inner.listeners
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    fn domain(&self) -> &Arc<Domain> {
        self.inner.executor.domain()
    }

    pub fn state(&self) -> TaskState {
        self.domain().lock().state_of(&self.inner.id)
    }

    /// Failure cause; only set in `Failed`.
    pub fn error(&self) -> Option<Arc<TaskError>> {
        self.domain()
            .lock()
            .tasks
            .get(&self.inner.id)
            .and_then(|r| r.error.clone())
    }

    pub fn is_interrupted(&self) -> bool {
        self.domain().lock().is_interrupted(&self.inner.id)
    }

    /// Request cancellation.
    ///
    /// A handler still in `Created` becomes `Canceled` before this returns and
    /// its body never runs. A started handler only gets its interrupted flag
    /// and cancellation token set; the body decides when to stop.
    pub fn interrupt(&self) {
        let removed = {
            let mut core = self.domain().lock();
            self.mark_interrupted(&mut core)
        };
        drop(removed);
        self.wake();
    }

    /// Set the flag under the held lock; returns the index entry removed when
    /// the handler was cancelled before starting.
    pub(crate) fn mark_interrupted(&self, core: &mut Core) -> Option<TaskHandler> {
        let record = core.tasks.get_mut(&self.inner.id)?;
        record.interrupted = true;
        self.inner.token.cancel();

        if record.state != TaskState::Created {
            return None;
        }
        debug_assert!(record.state.can_transition_to(TaskState::Canceled));
        record.state = TaskState::Canceled;
        record.error = None;
        record.settled = true;
        trace!(task = %self.inner.id, "created -> canceled");
        core.registry.index.remove(self)
    }

    pub(crate) fn wake(&self) {
        self.inner.joined.notify_all();
    }

    fn settle(&self) {
        if let Some(record) = self.domain().lock().tasks.get_mut(&self.inner.id) {
            record.settled = true;
        }
        self.wake();
    }

    /// Block until the handler is terminal.
    ///
    /// Fails with [`JoinError::SelfJoin`] when called from the thread driving
    /// this handler (its body or one of its inline listeners).
    pub fn join(&self) -> Result<(), JoinError> {
        self.join_timeout(Duration::ZERO).map(|_| ())
    }

    /// Like [`join`](Self::join) but gives up after `timeout`.
    ///
    /// `Duration::ZERO` waits without bound. Returns whether the handler
    /// became terminal in time.
    pub fn join_timeout(&self, timeout: Duration) -> Result<bool, JoinError> {
        let id = self.inner.id;
        if DRIVING.with(Cell::get) == Some(id) {
            return Err(JoinError::SelfJoin { id });
        }

        let core = self.domain().lock();
        let pending = |c: &mut Core| !c.is_settled(&id);

        if timeout.is_zero() {
            let _core = self
                .inner
                .joined
                .wait_while(core, pending)
                .unwrap_or_else(PoisonError::into_inner);
            return Ok(true);
        }

        let (_core, result) = self
            .inner
            .joined
            .wait_timeout_while(core, timeout, pending)
            .unwrap_or_else(PoisonError::into_inner);
        Ok(!result.timed_out())
    }

    /// Sleep on the handler's condvar; returns early once interrupted.
    fn sleep(&self, duration: Duration) -> Result<(), TaskError> {
        let id = self.inner.id;
        let core = self.domain().lock();
        let (core, _) = self
            .inner
            .joined
            .wait_timeout_while(core, duration, |c| !c.is_interrupted(&id))
            .unwrap_or_else(PoisonError::into_inner);
        let interrupted = core.is_interrupted(&id);
        drop(core);

        if interrupted {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Hand the first hop to the worker pool.
    pub(crate) fn start(self) {
        let executor = self.executor().clone();
        executor.pool().submit(move || self.prepare());
    }

    /// First pool hop: announce the handler and queue the body.
    fn prepare(self) {
        let _driving = Driving::enter(self.inner.id);

        if self.state() != TaskState::Created {
            notify(&self, LifecycleEvent::Create);
            notify(&self, LifecycleEvent::Canceled);
            notify(&self, LifecycleEvent::Destroy);
            self.settle();
            return;
        }

        notify(&self, LifecycleEvent::Create);
        notify(&self, LifecycleEvent::QueueInsert);

        let executor = self.executor().clone();
        executor.pool().submit(move || self.run());
    }

    /// Second pool hop: run the body unless cancelled while queued.
    fn run(self) {
        let _driving = Driving::enter(self.inner.id);
        let id = self.inner.id;

        let started = {
            let mut core = self.domain().lock();
            match core.tasks.get_mut(&id) {
                Some(record) if record.state == TaskState::Created => {
                    debug_assert!(record.state.can_transition_to(TaskState::Started));
                    record.state = TaskState::Started;
                    true
                }
                _ => false,
            }
        };

        if !started {
            notify(&self, LifecycleEvent::Canceled);
            notify(&self, LifecycleEvent::QueueRemove);
            notify(&self, LifecycleEvent::Destroy);
            self.settle();
            return;
        }

        trace!(task = %id, "created -> started");
        notify(&self, LifecycleEvent::Start);

        let result = if self.is_interrupted() {
            Err(TaskError::Cancelled)
        } else {
            let ctx = TaskContext {
                handler: self.clone(),
            };
            catch_unwind(AssertUnwindSafe(|| self.inner.task.run(&ctx)))
                .unwrap_or_else(|panic| Err(TaskError::from_panic(panic)))
        };

        self.log_outcome(&result);
        let succeeded = result.is_ok();

        let removed = {
            let mut core = self.domain().lock();
            if let Some(record) = core.tasks.get_mut(&id) {
                let next = if result.is_ok() {
                    TaskState::Succeeded
                } else {
                    TaskState::Failed
                };
                debug_assert!(record.state.can_transition_to(next));
                record.state = next;
                record.error = result.err().map(Arc::new);
            }
            core.registry.index.remove(&self)
        };
        drop(removed);

        notify(&self, LifecycleEvent::Finish);
        notify(
            &self,
            if succeeded {
                LifecycleEvent::Succeed
            } else {
                LifecycleEvent::Failed
            },
        );
        notify(&self, LifecycleEvent::QueueRemove);
        notify(&self, LifecycleEvent::Destroy);
        self.settle();
    }

    fn log_outcome(&self, result: &Result<(), TaskError>) {
        let id = self.inner.id;
        let task = self.name();
        match result {
            Ok(()) => debug!(%id, task, "started -> succeeded"),
            Err(TaskError::Cancelled) => info!(%id, task, "task cancelled"),
            Err(e) => warn!(%id, task, reason = %e, "started -> failed"),
        }
    }
}

impl PartialEq for TaskHandler {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for TaskHandler {}

impl Hash for TaskHandler {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for TaskHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandler")
            .field("id", &self.inner.id)
            .field("task", &self.name())
            .field("tags", &self.inner.tags)
            .finish()
    }
}

/// What a running task body sees of its environment.
pub struct TaskContext {
    handler: TaskHandler,
}

impl TaskContext {
    pub fn handler(&self) -> &TaskHandler {
        &self.handler
    }

    pub fn id(&self) -> TaskId {
        self.handler.id()
    }

    pub fn executor(&self) -> &TaskExecutor {
        self.handler.executor()
    }

    pub fn owner(&self) -> &TaskSet {
        self.handler.owner()
    }

    pub fn args(&self) -> &Pack {
        self.handler.args()
    }

    pub fn is_interrupted(&self) -> bool {
        self.handler.is_interrupted()
    }

    /// `Err(Cancelled)` once the handler has been interrupted.
    pub fn check_interrupted(&self) -> Result<(), TaskError> {
        if self.is_interrupted() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Set the interrupted flag of the running task.
    pub fn interrupt_self(&self) {
        self.handler.interrupt();
    }

    /// Cancelled together with the interrupted flag.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.handler.token().clone()
    }

    /// Sleep for `duration`, or until interrupted (`Err(Cancelled)`).
    pub fn sleep(&self, duration: Duration) -> Result<(), TaskError> {
        self.handler.sleep(duration)
    }

    /// Drive `fut` to completion on the executor's runtime.
    ///
    /// Resolves to `Err(Cancelled)` as soon as the task is interrupted; the
    /// future is dropped at that point. On a borrowed current-thread runtime
    /// timers only advance while that runtime is driven elsewhere.
    pub fn block_on<F>(&self, fut: F) -> Result<F::Output, TaskError>
    where
        F: Future,
    {
        let token = self.cancellation_token();
        self.executor().pool().handle().block_on(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(TaskError::Cancelled),
                out = fut => Ok(out),
            }
        })
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("handler", &self.handler)
            .finish()
    }
}
