#![allow(dead_code)]

use std::{
    sync::{Arc, Condvar, Mutex},
    time::Duration,
};

use tagvisor_core::{ExecutorConfig, LifecycleEvent, TaskExecutor, TaskHandler, TaskListener};

pub const WAIT: Duration = Duration::from_secs(5);

/// Shared append-only log with blocking lookups.
#[derive(Default)]
pub struct Log {
    entries: Mutex<Vec<String>>,
    changed: Condvar,
}

impl Log {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().unwrap().push(entry.into());
        self.changed.notify_all();
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.lock().unwrap().iter().any(|e| e == entry)
    }

    /// Wait until `entry` has been logged; false on timeout.
    pub fn wait_for(&self, entry: &str) -> bool {
        let guard = self.entries.lock().unwrap();
        let (_guard, result) = self
            .changed
            .wait_timeout_while(guard, WAIT, |entries| !entries.iter().any(|e| e == entry))
            .unwrap();
        !result.timed_out()
    }

    /// Events logged by the recorder called `name`, without the prefix.
    pub fn events_of(&self, name: &str) -> Vec<String> {
        let prefix = format!("{name}:");
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Recorder names in the order they saw `event`.
    pub fn order_of(&self, event: LifecycleEvent) -> Vec<String> {
        let suffix = format!(":{event}");
        self.entries()
            .into_iter()
            .filter_map(|e| e.strip_suffix(&suffix).map(str::to_string))
            .collect()
    }
}

/// Listener logging `"{name}:{event}"` for every callback.
pub struct Recorder {
    name: &'static str,
    log: Arc<Log>,
}

impl Recorder {
    pub fn new(name: &'static str, log: &Arc<Log>) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: Arc::clone(log),
        })
    }

    fn hit(&self, event: LifecycleEvent) {
        self.log.push(format!("{}:{event}", self.name));
    }
}

impl TaskListener for Recorder {
    fn name(&self) -> &str {
        self.name
    }
    fn on_create(&self, _: &TaskHandler) {
        self.hit(LifecycleEvent::Create)
    }
    fn on_queue_insert(&self, _: &TaskHandler) {
        self.hit(LifecycleEvent::QueueInsert)
    }
    fn on_start(&self, _: &TaskHandler) {
        self.hit(LifecycleEvent::Start)
    }
    fn on_finish(&self, _: &TaskHandler) {
        self.hit(LifecycleEvent::Finish)
    }
    fn on_queue_remove(&self, _: &TaskHandler) {
        self.hit(LifecycleEvent::QueueRemove)
    }
    fn on_destroy(&self, _: &TaskHandler) {
        self.hit(LifecycleEvent::Destroy)
    }
    fn on_canceled(&self, _: &TaskHandler) {
        self.hit(LifecycleEvent::Canceled)
    }
    fn on_failed(&self, _: &TaskHandler) {
        self.hit(LifecycleEvent::Failed)
    }
    fn on_succeed(&self, _: &TaskHandler) {
        self.hit(LifecycleEvent::Succeed)
    }
}

/// One-shot gate a task body can block on.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    pub fn wait(&self) {
        let guard = self.open.lock().unwrap();
        let _guard = self.cv.wait_while(guard, |open| !*open).unwrap();
    }
}

pub fn setup_executor(workers: usize) -> TaskExecutor {
    TaskExecutor::new(
        ExecutorConfig::default()
            .with_workers(workers)
            .with_thread_name("tagvisor-test"),
    )
    .unwrap()
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
