//! The lock domain: one mutex guarding everything an executor owns.
//!
//! Pack contents, handler records and the tag registry all live inside
//! [`Core`]. Objects outside the lock (`Pack`, `TaskHandler`) only carry ids
//! into it; when they are dropped their ids are queued on a graveyard and
//! purged the next time the lock is taken, so a drop never has to acquire the
//! domain lock.

use std::{
    any::Any,
    collections::HashMap,
    mem,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use tagvisor_model::{Tags, TaskId, TaskState};

use crate::{
    TaskError, TaskHandler,
    index::TagIndex,
    listener::{ErrorHandler, LogErrors, TaskListener},
    pack::Pack,
};

pub(crate) type Value = Arc<dyn Any + Send + Sync>;
pub(crate) type Values = HashMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PackId(u64);

/// Mutable part of a handler; only touched with the domain lock held.
pub(crate) struct Record {
    pub(crate) state: TaskState,
    pub(crate) error: Option<Arc<TaskError>>,
    pub(crate) interrupted: bool,
    /// Joiners may return; set once the life cycle needs no further waiting.
    pub(crate) settled: bool,
}

impl Record {
    pub(crate) fn new(born_canceled: bool) -> Self {
        Self {
            state: if born_canceled {
                TaskState::Canceled
            } else {
                TaskState::Created
            },
            error: None,
            interrupted: born_canceled,
            settled: false,
        }
    }
}

/// Executor-wide registry: live handlers, global listeners, shutdown flag.
pub(crate) struct Registry {
    pub(crate) index: TagIndex<TaskHandler>,
    pub(crate) listeners: Vec<Arc<dyn TaskListener>>,
    pub(crate) error_handler: Arc<dyn ErrorHandler>,
    pub(crate) shutdown: bool,
    /// Filters of interrupted task sets; kept while they have live members.
    pub(crate) interrupted: Vec<Tags>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            index: TagIndex::new(),
            listeners: Vec::new(),
            error_handler: Arc::new(LogErrors),
            shutdown: false,
            interrupted: Vec::new(),
        }
    }
}

#[derive(Default)]
pub(crate) struct Core {
    pub(crate) packs: HashMap<PackId, Values>,
    pub(crate) tasks: HashMap<TaskId, Record>,
    pub(crate) registry: Registry,
}

impl Core {
    /// State of a handler; a missing record reads as terminal.
    pub(crate) fn state_of(&self, id: &TaskId) -> TaskState {
        self.tasks
            .get(id)
            .map(|r| r.state)
            .unwrap_or(TaskState::Canceled)
    }

    pub(crate) fn is_interrupted(&self, id: &TaskId) -> bool {
        self.tasks.get(id).is_some_and(|r| r.interrupted)
    }

    pub(crate) fn is_settled(&self, id: &TaskId) -> bool {
        self.tasks.get(id).is_none_or(|r| r.settled)
    }

    /// Remember `filter` as interrupted until its last live member is gone.
    pub(crate) fn remember_interrupted(&mut self, filter: &Tags) {
        if !self.registry.interrupted.contains(filter) {
            self.registry.interrupted.push(filter.clone());
        }
    }

    /// Whether work tagged `tags` must be born canceled: the executor is shut
    /// down, or `tags` falls into an interrupted set that still has live
    /// members. Interrupted sets without live members are forgotten.
    pub(crate) fn scope_interrupted(&mut self, tags: &Tags) -> bool {
        if self.registry.shutdown {
            return true;
        }
        let Registry {
            index, interrupted, ..
        } = &mut self.registry;
        interrupted.retain(|filter| index.count(filter) > 0);
        interrupted.iter().any(|filter| tags.matches(filter))
    }
}

enum Corpse {
    Pack(PackId),
    Task(TaskId),
}

pub(crate) struct Domain {
    core: Mutex<Core>,
    graveyard: Mutex<Vec<Corpse>>,
    next_pack: AtomicU64,
}

impl Domain {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            core: Mutex::new(Core::default()),
            graveyard: Mutex::new(Vec::new()),
            next_pack: AtomicU64::new(1),
        })
    }

    /// Acquire the domain lock.
    ///
    /// Poisoning is ignored: user callbacks never run with the lock held.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Core> {
        self.purge();
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the entries of buried packs and handlers.
    ///
    /// Entries are unlinked under the lock and dropped after it is released,
    /// since stored values may touch packs or handlers from their `Drop`.
    /// Corpses buried by those drops are picked up by the next round.
    fn purge(&self) {
        loop {
            let dead = mem::take(
                &mut *self
                    .graveyard
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            if dead.is_empty() {
                return;
            }

            let mut packs = Vec::new();
            let mut tasks = Vec::new();
            {
                let mut core = self.core.lock().unwrap_or_else(PoisonError::into_inner);
                for corpse in dead {
                    match corpse {
                        Corpse::Pack(id) => packs.extend(core.packs.remove(&id)),
                        Corpse::Task(id) => tasks.extend(core.tasks.remove(&id)),
                    }
                }
            }
            drop(packs);
            drop(tasks);
        }
    }

    pub(crate) fn alloc_pack(&self, values: Values) -> PackId {
        let id = PackId(self.next_pack.fetch_add(1, Ordering::Relaxed));
        self.lock().packs.insert(id, values);
        id
    }

    pub(crate) fn bury_pack(&self, id: PackId) {
        self.bury(Corpse::Pack(id));
    }

    pub(crate) fn bury_task(&self, id: TaskId) {
        self.bury(Corpse::Task(id));
    }

    fn bury(&self, corpse: Corpse) {
        self.graveyard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(corpse);
    }
}

/// Held lock of an executor.
///
/// Reads handler records and reads/writes packs of the same executor inside
/// one critical section. Calling any other executor, handler or pack method
/// while the guard is alive deadlocks.
pub struct Locked<'a> {
    domain: &'a Arc<Domain>,
    core: MutexGuard<'a, Core>,
}

impl<'a> Locked<'a> {
    pub(crate) fn new(domain: &'a Arc<Domain>) -> Self {
        Self {
            domain,
            core: domain.lock(),
        }
    }

    fn owns(&self, handler: &TaskHandler) -> bool {
        Arc::ptr_eq(self.domain, handler.executor().domain())
    }

    /// `None` if the handler belongs to another executor.
    pub fn state(&self, handler: &TaskHandler) -> Option<TaskState> {
        self.owns(handler)
            .then(|| self.core.state_of(&handler.id()))
    }

    pub fn is_interrupted(&self, handler: &TaskHandler) -> Option<bool> {
        self.owns(handler)
            .then(|| self.core.is_interrupted(&handler.id()))
    }

    pub fn error(&self, handler: &TaskHandler) -> Option<Arc<TaskError>> {
        if !self.owns(handler) {
            return None;
        }
        self.core
            .tasks
            .get(&handler.id())
            .and_then(|r| r.error.clone())
    }

    /// `None` if the pack lives under another lock.
    pub fn pack(&mut self, pack: &Pack) -> Option<PackView<'_>> {
        if !Arc::ptr_eq(self.domain, pack.domain()) {
            return None;
        }
        Some(PackView {
            values: self.core.packs.entry(pack.id()).or_default(),
        })
    }
}

/// Contents of a pack, borrowed from a held lock.
pub struct PackView<'g> {
    pub(crate) values: &'g mut Values,
}

impl PackView<'_> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// `None` if the key is absent or holds a value of another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.values
            .get(key)
            .cloned()
            .and_then(|v| v.downcast::<T>().ok())
    }

    pub fn get_or<T: Any + Send + Sync + Clone>(&self, key: &str, default: T) -> T {
        self.get::<T>(key)
            .map(|v| v.as_ref().clone())
            .unwrap_or(default)
    }

    pub fn put<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> Option<Value> {
        self.values.insert(key.into(), Arc::new(value))
    }

    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buried_pack_is_purged_on_next_lock() {
        let domain = Domain::new();
        let id = domain.alloc_pack(Values::new());
        assert!(domain.lock().packs.contains_key(&id));

        domain.bury_pack(id);
        assert!(!domain.lock().packs.contains_key(&id));
    }

    #[test]
    fn bury_while_locked_does_not_deadlock() {
        let domain = Domain::new();
        let id = domain.alloc_pack(Values::new());

        let core = domain.lock();
        domain.bury_pack(id);
        assert!(core.packs.contains_key(&id));
        drop(core);

        assert!(domain.lock().packs.is_empty());
    }

    struct TouchOnDrop(Pack);

    impl Drop for TouchOnDrop {
        fn drop(&mut self) {
            self.0.put("dropped", true);
        }
    }

    #[test]
    fn purged_value_may_touch_same_domain_from_drop() {
        let domain = Domain::new();
        let holder = Pack::in_domain(&domain, Values::new());
        let witness = Pack::in_domain(&domain, Values::new());
        holder.put("value", TouchOnDrop(witness.clone()));

        drop(holder);
        assert_eq!(witness.get_cloned::<bool>("dropped"), Some(true));
        assert_eq!(domain.lock().packs.len(), 1);
    }

    #[test]
    fn born_canceled_record_is_terminal_and_interrupted() {
        let record = Record::new(true);
        assert_eq!(record.state, TaskState::Canceled);
        assert!(record.interrupted);
        assert!(!record.settled);

        let record = Record::new(false);
        assert_eq!(record.state, TaskState::Created);
        assert!(!record.interrupted);
    }

    #[test]
    fn interrupted_scope_without_live_members_is_forgotten() {
        let mut core = Core::default();
        core.remember_interrupted(&Tags::from("x"));
        core.remember_interrupted(&Tags::from("x"));
        assert_eq!(core.registry.interrupted.len(), 1);

        assert!(!core.scope_interrupted(&Tags::from("x")));
        assert!(core.registry.interrupted.is_empty());

        core.registry.shutdown = true;
        assert!(core.scope_interrupted(&Tags::none()));
    }

    #[test]
    fn missing_record_reads_as_terminal() {
        let core = Core::default();
        assert!(core.state_of(&TaskId::new()).is_destroyed());
        assert!(!core.is_interrupted(&TaskId::new()));
        assert!(core.is_settled(&TaskId::new()));
    }
}
