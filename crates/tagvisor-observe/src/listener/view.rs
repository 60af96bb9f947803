use tagvisor_core::{LifecycleEvent, TaskHandler, TaskId};
use tracing::{debug, info, trace, warn};

/// What the journal reads from a handler.
pub trait View {
    fn as_task(&self) -> &str;
    fn id(&self) -> TaskId;
    fn tags(&self) -> String;
    fn reason(&self) -> Option<String>;
    fn is_cancellation(&self) -> bool;
}

impl View for TaskHandler {
    #[inline]
    fn as_task(&self) -> &str {
        self.name()
    }
    #[inline]
    fn id(&self) -> TaskId {
        TaskHandler::id(self)
    }
    #[inline]
    fn tags(&self) -> String {
        TaskHandler::tags(self).to_string()
    }
    #[inline]
    fn reason(&self) -> Option<String> {
        self.error().map(|e| e.to_string())
    }
    #[inline]
    fn is_cancellation(&self) -> bool {
        self.error().is_some_and(|e| e.is_cancelled())
    }
}

#[inline]
pub fn message_for(event: LifecycleEvent) -> &'static str {
    match event {
        // submission
        LifecycleEvent::Create => "task created",
        LifecycleEvent::QueueInsert => "task queued for a worker",

        // execution
        LifecycleEvent::Start => "task body started",
        LifecycleEvent::Finish => "task body finished",

        // outcome
        LifecycleEvent::Succeed => "task succeeded",
        LifecycleEvent::Failed => "task failed",
        LifecycleEvent::Canceled => "task canceled before it started",

        // teardown
        LifecycleEvent::QueueRemove => "task left the queue",
        LifecycleEvent::Destroy => "task destroyed",
    }
}

#[inline]
pub fn log_event<V: View>(v: &V, event: LifecycleEvent) {
    let msg = message_for(event);
    let id = v.id();

    match event {
        LifecycleEvent::Create | LifecycleEvent::QueueInsert => {
            trace!(%id, task = v.as_task(), tags = %v.tags(), "{msg}")
        }
        LifecycleEvent::Finish | LifecycleEvent::QueueRemove | LifecycleEvent::Destroy => {
            trace!(%id, task = v.as_task(), "{msg}")
        }
        LifecycleEvent::Start => debug!(%id, task = v.as_task(), "{msg}"),
        LifecycleEvent::Succeed => debug!(%id, task = v.as_task(), "{msg}"),
        LifecycleEvent::Canceled => info!(%id, task = v.as_task(), "{msg}"),
        LifecycleEvent::Failed => {
            let reason = v.reason().unwrap_or_else(|| "unknown".to_string());
            if v.is_cancellation() {
                info!(%id, task = v.as_task(), "task stopped on interrupt");
            } else {
                warn!(%id, task = v.as_task(), %reason, "{msg}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_event_has_a_message() {
        for event in LifecycleEvent::ALL {
            assert!(!message_for(event).is_empty(), "{event}");
        }
        assert_eq!(message_for(LifecycleEvent::Canceled), "task canceled before it started");
    }
}
