//! Tag-addressable task executor.
//!
//! Tasks are submitted to a [`TaskExecutor`], run on its worker pool and
//! observed through a [`TaskHandler`]. Every submission carries a set of tags;
//! a [`TaskSet`] is a live, tag-filtered view used to join or interrupt groups
//! of tasks. All state of one executor (handler states, the tag index, every
//! [`Pack`] it created) is guarded by a single lock.

mod dispatch;

mod domain;
pub use domain::{Locked, PackView};

mod error;
pub use error::{CoreError, JoinError, ListenerPanic, TaskError};

mod event_loop;
pub use event_loop::EventLoop;

mod executor;
pub use executor::{ExecutorBuilder, TaskExecutor};

mod handler;
pub use handler::{TaskContext, TaskHandler};

pub mod index;
pub use index::TagIndex;

mod listener;
pub use listener::{ErrorHandler, LogErrors, TaskListener};

mod pack;
pub use pack::{KeyCursor, Pack};

mod set;
pub use set::TaskSet;

mod task;
pub use task::{Submission, Task, TaskFn};

pub use tagvisor_model::{
    Dispatch, ExecutorConfig, LifecycleEvent, Order, Tag, Tags, TaskId, TaskState,
};

pub mod prelude {
    pub use crate::{
        Pack, Submission, Task, TaskContext, TaskError, TaskExecutor, TaskFn, TaskHandler,
        TaskListener, TaskSet,
    };
    pub use tagvisor_model::{ExecutorConfig, Tags, TaskState};
}
