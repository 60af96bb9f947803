use std::{
    fmt,
    time::{Duration, Instant},
};

use tagvisor_model::{Tags, TaskState};
use tracing::{debug, instrument, trace};

use crate::{
    JoinError, Submission, Task, TaskExecutor, TaskHandler, domain::Core,
};

/// Live, tag-filtered view over the handlers of an executor.
///
/// A set owns nothing: every call re-queries the executor's index for live
/// handlers whose tags are a superset of the set's tags and, when a state
/// filter is given, whose state is one of the listed states.
#[derive(Clone)]
pub struct TaskSet {
    executor: TaskExecutor,
    tags: Tags,
    /// Empty means any state.
    states: Vec<TaskState>,
}

impl TaskSet {
    pub(crate) fn new(executor: TaskExecutor, tags: Tags) -> Self {
        Self {
            executor,
            tags,
            states: Vec::new(),
        }
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// State filter; empty when every live state matches.
    pub fn states(&self) -> &[TaskState] {
        &self.states
    }

    /// A narrower set filtering on these tags and `more`.
    pub fn sub(&self, more: impl Into<Tags>) -> TaskSet {
        TaskSet {
            executor: self.executor.clone(),
            tags: self.tags.union(&more.into()),
            states: self.states.clone(),
        }
    }

    /// The same tag filter restricted to handlers in one of `states`.
    ///
    /// Only `Created` and `Started` handlers are live, so other states never
    /// match.
    pub fn with_states(&self, states: impl IntoIterator<Item = TaskState>) -> TaskSet {
        TaskSet {
            executor: self.executor.clone(),
            tags: self.tags.clone(),
            states: states.into_iter().collect(),
        }
    }

    /// Submit `task` tagged with this set's tags.
    pub fn execute<T: Task>(&self, task: T) -> TaskHandler {
        self.submit(Submission::new(task))
    }

    /// Submit with this set's tags merged into the submission's.
    pub fn submit(&self, submission: Submission) -> TaskHandler {
        self.executor.submit(submission.with_tags(self.tags.clone()))
    }

    /// Snapshot of the live matching handlers, in no particular order.
    pub fn handlers(&self) -> Vec<TaskHandler> {
        select(&self.executor.domain().lock(), &self.tags, &self.states)
    }

    pub fn iter(&self) -> std::vec::IntoIter<TaskHandler> {
        self.handlers().into_iter()
    }

    /// Number of live matching handlers.
    pub fn len(&self) -> usize {
        let core = self.executor.domain().lock();
        if self.states.is_empty() {
            core.registry.index.count(&self.tags)
        } else {
            select(&core, &self.tags, &self.states).len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `handler` is live and matches this set.
    pub fn contains(&self, handler: &TaskHandler) -> bool {
        let core = self.executor.domain().lock();
        core.registry
            .index
            .tags_of(handler)
            .is_some_and(|tags| tags.matches(&self.tags))
            && in_states(&core, handler, &self.states)
    }

    /// Interrupt every live matching handler in one critical section.
    ///
    /// Without a state filter the set also stays interrupted while any of its
    /// handlers is live: work submitted into it meanwhile is born `Canceled`.
    pub fn interrupt(&self) {
        let touched = {
            let mut core = self.executor.domain().lock();
            if self.states.is_empty() {
                core.remember_interrupted(&self.tags);
            }
            interrupt_matching(&mut core, &self.tags, &self.states)
        };
        debug!(tags = %self.tags, interrupted = touched.len(), "task set interrupted");
        for handler in &touched {
            handler.wake();
        }
    }

    /// Whether work submitted into this set would be born `Canceled`.
    pub fn is_interrupted(&self) -> bool {
        self.executor
            .domain()
            .lock()
            .scope_interrupted(&self.tags)
    }

    /// Wait until no live handler matches, including ones submitted while
    /// waiting.
    pub fn join(&self) -> Result<(), JoinError> {
        self.join_timeout(Duration::ZERO).map(|_| ())
    }

    /// Like [`join`](Self::join) with an overall deadline; `Duration::ZERO`
    /// waits without bound. Returns whether the set emptied in time.
    #[instrument(level = "debug", skip(self), fields(tags = %self.tags))]
    pub fn join_timeout(&self, timeout: Duration) -> Result<bool, JoinError> {
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);

        loop {
            let live = self.handlers();
            if live.is_empty() {
                return Ok(true);
            }
            trace!(live = live.len(), "waiting for task set");

            for handler in live {
                let done = match deadline {
                    None => handler.join().map(|_| true)?,
                    Some(deadline) => {
                        let left = deadline.saturating_duration_since(Instant::now());
                        if left.is_zero() {
                            return Ok(false);
                        }
                        handler.join_timeout(left)?
                    }
                };
                if !done {
                    return Ok(false);
                }
            }
        }
    }
}

fn in_states(core: &Core, handler: &TaskHandler, states: &[TaskState]) -> bool {
    states.is_empty() || states.contains(&core.state_of(&handler.id()))
}

fn select(core: &Core, filter: &Tags, states: &[TaskState]) -> Vec<TaskHandler> {
    let mut matching = core.registry.index.associated(filter);
    if !states.is_empty() {
        matching.retain(|handler| in_states(core, handler, states));
    }
    matching
}

/// Interrupt matching handlers under the held lock; returns them so the
/// caller can wake their waiters after unlocking.
pub(crate) fn interrupt_matching(
    core: &mut Core,
    filter: &Tags,
    states: &[TaskState],
) -> Vec<TaskHandler> {
    let matching = select(core, filter, states);
    for handler in &matching {
        // `matching` keeps a clone, so the removed index entry is never the last one
        handler.mark_interrupted(core);
    }
    matching
}

impl IntoIterator for &TaskSet {
    type Item = TaskHandler;
    type IntoIter = std::vec::IntoIter<TaskHandler>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Debug for TaskSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSet")
            .field("tags", &self.tags)
            .field("states", &self.states)
            .finish()
    }
}
