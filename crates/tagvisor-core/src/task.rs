use std::{fmt, sync::Arc};

use tagvisor_model::Tags;

use crate::{Pack, TaskContext, TaskError, TaskListener};

/// A unit of work run by a [`TaskExecutor`](crate::TaskExecutor).
///
/// The body reads and writes its [`Pack`] through the context and is expected
/// to poll [`TaskContext::check_interrupted`] (or wait with
/// [`TaskContext::sleep`]) so that it can be cancelled once started.
pub trait Task: Send + Sync + 'static {
    fn run(&self, ctx: &TaskContext) -> Result<(), TaskError>;

    fn name(&self) -> &str {
        "task"
    }
}

impl<F> Task for F
where
    F: Fn(&TaskContext) -> Result<(), TaskError> + Send + Sync + 'static,
{
    fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        self(ctx)
    }
}

/// A closure with a name.
pub struct TaskFn<F> {
    name: String,
    f: F,
}

impl<F> TaskFn<F>
where
    F: Fn(&TaskContext) -> Result<(), TaskError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    pub fn arc(name: impl Into<String>, f: F) -> Arc<dyn Task> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> Task for TaskFn<F>
where
    F: Fn(&TaskContext) -> Result<(), TaskError> + Send + Sync + 'static,
{
    fn run(&self, ctx: &TaskContext) -> Result<(), TaskError> {
        (self.f)(ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Everything a submission carries: the task, its arguments, per-call
/// listeners and tags.
///
/// Every `execute` shape routes through this type.
#[derive(Clone)]
pub struct Submission {
    pub(crate) task: Arc<dyn Task>,
    pub(crate) args: Option<Pack>,
    pub(crate) listeners: Vec<Arc<dyn TaskListener>>,
    pub(crate) tags: Tags,
}

impl Submission {
    pub fn new<T: Task>(task: T) -> Self {
        Self::from_arc(Arc::new(task))
    }

    /// Submission of an already shared task, e.g. `handler.task()` for a retry.
    pub fn from_arc(task: Arc<dyn Task>) -> Self {
        Self {
            task,
            args: None,
            listeners: Vec::new(),
            tags: Tags::none(),
        }
    }

    /// Arguments for the task; a pack under another lock is copied on submit.
    pub fn with_args(mut self, args: Pack) -> Self {
        self.args = Some(args);
        self
    }

    /// Appended after the executor's global listeners.
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

    /// Adds to the tags already set.
    pub fn with_tags(mut self, tags: impl Into<Tags>) -> Self {
        self.tags = self.tags.union(&tags.into());
        self
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn task(&self) -> &Arc<dyn Task> {
        &self.task
    }
}

impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("task", &self.task.name())
            .field("args", &self.args)
            .field("listeners", &self.listeners.len())
            .field("tags", &self.tags)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;
    impl TaskListener for Noop {}

    #[test]
    fn closures_are_tasks() {
        let sub = Submission::new(|_: &TaskContext| -> Result<(), TaskError> { Ok(()) });
        assert_eq!(sub.task().name(), "task");
    }

    #[test]
    fn named_closure_keeps_its_name() {
        let sub = Submission::new(TaskFn::new("fetch", |_| Ok(())));
        assert_eq!(sub.task().name(), "fetch");
    }

    #[test]
    fn builder_accumulates_tags_and_listeners() {
        let sub = Submission::new(TaskFn::new("t", |_| Ok(())))
            .with_tags("a")
            .with_tags(["b", "c"])
            .with_listener(Arc::new(Noop))
            .with_listeners([Arc::new(Noop) as Arc<dyn TaskListener>]);

        assert_eq!(sub.tags(), &Tags::from(["a", "b", "c"]));
        assert_eq!(sub.listeners.len(), 2);
        assert!(sub.args.is_none());
    }
}
