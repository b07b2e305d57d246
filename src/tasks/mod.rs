//! # Task abstractions and completion handles.
//!
//! This module provides the task-related types:
//! - [`Task`] - one-shot, named unit of work (`FnOnce() -> Future<Output = Result<T, E>>`)
//! - [`TaskFuture`] - boxed future a started task returns
//! - [`Scheduled`] - promise-like handle to a task's eventual outcome

mod handle;
mod task;

pub(crate) use handle::Settle;
pub use handle::Scheduled;
pub use task::{Task, TaskFuture};
