use std::fmt;

use serde::{Deserialize, Serialize};

/// The nine listener callbacks of a task life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleEvent {
    Create,
    QueueInsert,
    Start,
    Finish,
    QueueRemove,
    Destroy,
    Canceled,
    Failed,
    Succeed,
}

/// Order in which a listener list is walked for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Insertion order.
    Direct,
    /// Reverse insertion order; the last listener added sees teardown first.
    Reverse,
}

/// Where a listener wants a given callback to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dispatch {
    /// On the thread driving the handle.
    #[default]
    Inline,
    /// On the executor's single-threaded event loop, waiting for completion.
    EventLoop,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 9] = [
        LifecycleEvent::Create,
        LifecycleEvent::QueueInsert,
        LifecycleEvent::Start,
        LifecycleEvent::Finish,
        LifecycleEvent::QueueRemove,
        LifecycleEvent::Destroy,
        LifecycleEvent::Canceled,
        LifecycleEvent::Failed,
        LifecycleEvent::Succeed,
    ];

    pub fn order(&self) -> Order {
        match self {
            LifecycleEvent::Create | LifecycleEvent::QueueInsert | LifecycleEvent::Start => {
                Order::Direct
            }
            _ => Order::Reverse,
        }
    }

    /// Callback name, e.g. `"onQueueInsert"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Create => "onCreate",
            LifecycleEvent::QueueInsert => "onQueueInsert",
            LifecycleEvent::Start => "onStart",
            LifecycleEvent::Finish => "onFinish",
            LifecycleEvent::QueueRemove => "onQueueRemove",
            LifecycleEvent::Destroy => "onDestroy",
            LifecycleEvent::Canceled => "onCanceled",
            LifecycleEvent::Failed => "onFailed",
            LifecycleEvent::Succeed => "onSucceed",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
