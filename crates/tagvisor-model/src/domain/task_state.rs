use std::fmt;

use serde::{Deserialize, Serialize};

/// Processing state of a task handle.
///
/// A handle moves along exactly one of two paths:
/// `Created -> Started -> {Failed, Succeeded}` or `Created -> Canceled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    /// Task is registered and waiting for a worker.
    Created,
    /// Task body is executing.
    Started,
    /// Task was interrupted before its body was entered.
    Canceled,
    /// Task body returned an error, panicked or observed cancellation.
    Failed,
    /// Task body returned normally.
    Succeeded,
}

impl TaskState {
    /// Returns `true` for `Created` and `Started`.
    pub fn is_alive(&self) -> bool {
        matches!(self, TaskState::Created | TaskState::Started)
    }

    /// Returns `true` if the state is terminal (won't transition further).
    pub fn is_destroyed(&self) -> bool {
        matches!(
            self,
            TaskState::Canceled | TaskState::Failed | TaskState::Succeeded
        )
    }

    /// Returns `true` if the body ran to completion, successfully or not.
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Failed | TaskState::Succeeded)
    }

    /// Whether `self -> next` is one of the allowed edges.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Created, TaskState::Started)
                | (TaskState::Created, TaskState::Canceled)
                | (TaskState::Started, TaskState::Failed)
                | (TaskState::Started, TaskState::Succeeded)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Created => "created",
            TaskState::Started => "started",
            TaskState::Canceled => "canceled",
            TaskState::Failed => "failed",
            TaskState::Succeeded => "succeeded",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TaskState; 5] = [
        TaskState::Created,
        TaskState::Started,
        TaskState::Canceled,
        TaskState::Failed,
        TaskState::Succeeded,
    ];

    #[test]
    fn destroyed_states() {
        assert!(TaskState::Canceled.is_destroyed());
        assert!(TaskState::Failed.is_destroyed());
        assert!(TaskState::Succeeded.is_destroyed());

        assert!(!TaskState::Created.is_destroyed());
        assert!(!TaskState::Started.is_destroyed());
    }

    #[test]
    fn alive_is_complement_of_destroyed() {
        for s in ALL {
            assert_ne!(s.is_alive(), s.is_destroyed(), "{s}");
        }
    }

    #[test]
    fn finished_states() {
        assert!(TaskState::Failed.is_finished());
        assert!(TaskState::Succeeded.is_finished());
        assert!(!TaskState::Canceled.is_finished());
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for from in ALL.iter().filter(|s| s.is_destroyed()) {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn canceled_only_reachable_from_created() {
        assert!(TaskState::Created.can_transition_to(TaskState::Canceled));
        assert!(!TaskState::Started.can_transition_to(TaskState::Canceled));
        assert!(!TaskState::Created.can_transition_to(TaskState::Succeeded));
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&TaskState::Succeeded).unwrap();
        assert_eq!(json, r#""succeeded""#);

        let back: TaskState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TaskState::Succeeded);
    }
}
