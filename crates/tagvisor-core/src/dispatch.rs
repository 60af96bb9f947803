//! Listener dispatch: ordering, routing to the event loop, panic isolation.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use tagvisor_model::{Dispatch, LifecycleEvent, Order};
use tracing::error;

use crate::{
    EventLoop, ListenerPanic, TaskHandler,
    error::panic_message,
    listener::{TaskListener, call},
};

/// Fire `event` on every listener of `handler`.
///
/// Must be called without the domain lock held.
pub(crate) fn notify(handler: &TaskHandler, event: LifecycleEvent) {
    let listeners = handler.listeners();
    let event_loop = handler.executor().event_loop();

    let mut each = |listener: &Arc<dyn TaskListener>| {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            deliver(listener, event, handler, event_loop)
        }))
        .map_err(|p| panic_message(p.as_ref()))
        .and_then(|r| r);

        if let Err(reason) = outcome {
            report(handler, listener.as_ref(), event, reason);
        }
    };

    match event.order() {
        Order::Direct => listeners.iter().for_each(&mut each),
        Order::Reverse => listeners.iter().rev().for_each(&mut each),
    }
}

fn deliver(
    listener: &Arc<dyn TaskListener>,
    event: LifecycleEvent,
    handler: &TaskHandler,
    event_loop: Option<&EventLoop>,
) -> Result<(), String> {
    match (listener.dispatch(event), event_loop) {
        (Dispatch::EventLoop, Some(el)) => {
            let listener = Arc::clone(listener);
            let handler = handler.clone();
            el.invoke(move || call(listener.as_ref(), event, &handler))
        }
        _ => {
            call(listener.as_ref(), event, handler);
            Ok(())
        }
    }
}

fn report(handler: &TaskHandler, listener: &dyn TaskListener, event: LifecycleEvent, reason: String) {
    let error_handler = Arc::clone(&handler.executor().domain().lock().registry.error_handler);
    let panic = ListenerPanic {
        event,
        listener: listener.name().to_string(),
        reason,
    };

    let reported = catch_unwind(AssertUnwindSafe(|| {
        error_handler.listener_error(listener, &panic)
    }));
    if reported.is_err() {
        error!(task = %handler.id(), %panic, "error handler panicked");
    }
}
