mod task_state;
pub use task_state::TaskState;

mod task_id;
pub use task_id::TaskId;

mod tags;
pub use tags::Tags;

mod event;
pub use event::{Dispatch, LifecycleEvent, Order};

/// Opaque label attached to a submission.
///
/// Tags select groups of tasks for `join`, `interrupt` and inspection.
pub type Tag = String;
