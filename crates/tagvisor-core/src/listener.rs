use tagvisor_model::{Dispatch, LifecycleEvent};
use tracing::error;

use crate::{ListenerPanic, TaskHandler};

/// Observer of task life cycles.
///
/// Every callback defaults to a no-op. Listeners attached to a handler are
/// walked in insertion order for `on_create`, `on_queue_insert` and
/// `on_start`, and in reverse insertion order for every other callback.
/// A panicking callback is caught and reported to the executor's
/// [`ErrorHandler`]; the remaining listeners still run.
pub trait TaskListener: Send + Sync + 'static {
    /// Name used when reporting a panic of this listener.
    fn name(&self) -> &str {
        "listener"
    }

    /// Where the callback for `event` runs.
    ///
    /// [`Dispatch::EventLoop`] hands the call to the executor's event loop and
    /// waits for it; without a configured loop the call runs inline.
    fn dispatch(&self, _event: LifecycleEvent) -> Dispatch {
        Dispatch::Inline
    }

    fn on_create(&self, _handler: &TaskHandler) {}
    fn on_queue_insert(&self, _handler: &TaskHandler) {}
    fn on_start(&self, _handler: &TaskHandler) {}
    fn on_finish(&self, _handler: &TaskHandler) {}
    fn on_queue_remove(&self, _handler: &TaskHandler) {}
    fn on_destroy(&self, _handler: &TaskHandler) {}
    fn on_canceled(&self, _handler: &TaskHandler) {}
    fn on_failed(&self, _handler: &TaskHandler) {}
    fn on_succeed(&self, _handler: &TaskHandler) {}
}

/// Route `event` to the matching callback.
pub(crate) fn call(listener: &dyn TaskListener, event: LifecycleEvent, handler: &TaskHandler) {
    match event {
        LifecycleEvent::Create => listener.on_create(handler),
        LifecycleEvent::QueueInsert => listener.on_queue_insert(handler),
        LifecycleEvent::Start => listener.on_start(handler),
        LifecycleEvent::Finish => listener.on_finish(handler),
        LifecycleEvent::QueueRemove => listener.on_queue_remove(handler),
        LifecycleEvent::Destroy => listener.on_destroy(handler),
        LifecycleEvent::Canceled => listener.on_canceled(handler),
        LifecycleEvent::Failed => listener.on_failed(handler),
        LifecycleEvent::Succeed => listener.on_succeed(handler),
    }
}

/// Receives panics caught in listener callbacks.
pub trait ErrorHandler: Send + Sync + 'static {
    fn listener_error(&self, listener: &dyn TaskListener, panic: &ListenerPanic);
}

impl<F> ErrorHandler for F
where
    F: Fn(&dyn TaskListener, &ListenerPanic) + Send + Sync + 'static,
{
    fn listener_error(&self, listener: &dyn TaskListener, panic: &ListenerPanic) {
        self(listener, panic)
    }
}

/// Default error handler: logs the panic.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrors;

impl ErrorHandler for LogErrors {
    fn listener_error(&self, listener: &dyn TaskListener, panic: &ListenerPanic) {
        error!(
            listener = listener.name(),
            event = %panic.event,
            reason = %panic.reason,
            "listener panicked"
        );
    }
}
