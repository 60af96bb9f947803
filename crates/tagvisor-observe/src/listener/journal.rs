use tagvisor_core::{LifecycleEvent, TaskHandler, TaskListener};

use crate::listener::view::log_event;

/// Listener writing every life-cycle event to `tracing`.
///
/// Install it as a global listener to journal all tasks of an executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct Journal;

impl Journal {
    pub fn new() -> Self {
        Self
    }
}

impl TaskListener for Journal {
    fn name(&self) -> &str {
        "journal"
    }
    fn on_create(&self, handler: &TaskHandler) {
        log_event(handler, LifecycleEvent::Create);
    }
    fn on_queue_insert(&self, handler: &TaskHandler) {
        log_event(handler, LifecycleEvent::QueueInsert);
    }
    fn on_start(&self, handler: &TaskHandler) {
        log_event(handler, LifecycleEvent::Start);
    }
    fn on_finish(&self, handler: &TaskHandler) {
        log_event(handler, LifecycleEvent::Finish);
    }
    fn on_queue_remove(&self, handler: &TaskHandler) {
        log_event(handler, LifecycleEvent::QueueRemove);
    }
    fn on_destroy(&self, handler: &TaskHandler) {
        log_event(handler, LifecycleEvent::Destroy);
    }
    fn on_canceled(&self, handler: &TaskHandler) {
        log_event(handler, LifecycleEvent::Canceled);
    }
    fn on_failed(&self, handler: &TaskHandler) {
        log_event(handler, LifecycleEvent::Failed);
    }
    fn on_succeed(&self, handler: &TaskHandler) {
        log_event(handler, LifecycleEvent::Succeed);
    }
}
