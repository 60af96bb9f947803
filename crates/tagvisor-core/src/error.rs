use std::any::Any;

use tagvisor_model::{ConfigError, LifecycleEvent, TaskId};
use thiserror::Error;

/// Outcome of a task body other than success.
///
/// Every variant ends the handle in `Failed`; `Cancelled` is kept apart so
/// cooperative cancellation is not reported as an ordinary failure.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task cancelled")]
    Cancelled,
    #[error("task failed: {reason}")]
    Fail { reason: String },
    #[error("task panicked: {reason}")]
    Panicked { reason: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    pub fn fail(reason: impl Into<String>) -> Self {
        TaskError::Fail {
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        TaskError::Panicked {
            reason: panic_message(payload.as_ref()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("task {id} cannot be joined from the thread driving it")]
    SelfJoin { id: TaskId },
}

/// A panic caught while calling a listener.
#[derive(Error, Debug, Clone)]
#[error("listener `{listener}` panicked in {event}: {reason}")]
pub struct ListenerPanic {
    pub event: LifecycleEvent,
    pub listener: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Runtime(e.to_string())
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_readable() {
        let r = std::panic::catch_unwind(|| panic!("boom"));
        let err = TaskError::from_panic(r.unwrap_err());
        assert_eq!(err.to_string(), "task panicked: boom");

        let r = std::panic::catch_unwind(|| panic!("code {}", 7));
        assert_eq!(panic_message(r.unwrap_err().as_ref()), "code 7");
    }

    #[test]
    fn only_cancelled_is_cancelled() {
        assert!(TaskError::Cancelled.is_cancelled());
        assert!(!TaskError::fail("x").is_cancelled());
        assert!(!TaskError::from(anyhow::anyhow!("io")).is_cancelled());
    }
}
