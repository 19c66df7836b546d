//! Single-writer task model: a FIFO dispatcher thread that owns the world and
//! a timer thread that feeds it due tasks.

pub mod dispatcher;
pub mod scheduler;
pub mod task;

pub use dispatcher::{DispatchError, Dispatcher, DispatcherHandle, DispatcherSettings};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use task::{Task, TaskId};
