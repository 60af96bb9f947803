use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    thread::{self, ThreadId},
};

use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

use crate::{CoreError, error::panic_message};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A dedicated thread running submitted closures one at a time, in order.
///
/// Listeners that declare [`Dispatch::EventLoop`](crate::Dispatch::EventLoop)
/// for a callback have it executed here while the driving thread waits. The
/// thread exits once every clone of the loop has been dropped.
#[derive(Clone)]
pub struct EventLoop {
    inner: Arc<LoopInner>,
}

struct LoopInner {
    tx: mpsc::UnboundedSender<Job>,
    thread: ThreadId,
    name: String,
}

impl EventLoop {
    /// Start the loop thread.
    pub fn spawn(name: impl Into<String>) -> Result<Self, CoreError> {
        let name = name.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
                        warn!(
                            reason = %panic_message(panic.as_ref()),
                            "event loop job panicked"
                        );
                    }
                }
                trace!("event loop drained");
            })?;

        Ok(Self {
            inner: Arc::new(LoopInner {
                tx,
                thread: handle.thread().id(),
                name,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether the caller is running on the loop thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread
    }

    /// Queue `f` without waiting for it. Returns `false` if the loop is gone.
    pub fn post<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.tx.send(Box::new(f)).is_ok()
    }

    /// Run `f` on the loop thread and wait for its result.
    ///
    /// Runs inline when called from the loop thread itself or when the loop
    /// no longer accepts work. A panic in `f` is returned as `Err` with the
    /// panic message.
    pub fn invoke<F, R>(&self, f: F) -> Result<R, String>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return catch_unwind(AssertUnwindSafe(f)).map_err(|p| panic_message(p.as_ref()));
        }

        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            let _ = done_tx.send(catch_unwind(AssertUnwindSafe(f)));
        });

        if let Err(mpsc::error::SendError(job)) = self.inner.tx.send(job) {
            warn!(event_loop = %self.inner.name, "event loop closed; running inline");
            job();
        }

        match done_rx.blocking_recv() {
            Ok(result) => result.map_err(|p| panic_message(p.as_ref())),
            Err(_) => Err(format!("event loop `{}` dropped the call", self.inner.name)),
        }
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("name", &self.inner.name)
            .finish()
    }
}
