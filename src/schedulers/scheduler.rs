//! # Scheduler contract.
//!
//! A [`Scheduler`] accepts a [`Task`] and returns a [`Scheduled`] handle to its eventual outcome.
//! The base contract makes no ordering promise; implementations add their own policies
//! (see [`MaxInFlightScheduler`](crate::MaxInFlightScheduler)).
//!
//! ## Rules
//! - `schedule` never panics and never blocks; every failure arrives through the handle.
//! - A task is dispatched at most once.
//! - Implementations are shared as `Arc<dyn Scheduler<T, E>>` and may decorate one another.

use std::sync::Arc;

use crate::tasks::{Scheduled, Task};

/// Admits tasks and hands back their completion handles.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use inflight::{ImmediateScheduler, Scheduler, Task};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let sched: Arc<dyn Scheduler<u32, String>> = Arc::new(ImmediateScheduler::new());
/// let out = sched.schedule(Task::new(|| async { Ok(2 + 2) })).await;
/// assert_eq!(out, Ok(4));
/// # }
/// ```
pub trait Scheduler<T, E>: Send + Sync + 'static {
    /// Submits `task`; the returned handle settles with the task's outcome.
    fn schedule(&self, task: Task<T, E>) -> Scheduled<T, E>;
}

impl<T, E, S> Scheduler<T, E> for Arc<S>
where
    S: Scheduler<T, E> + ?Sized,
{
    fn schedule(&self, task: Task<T, E>) -> Scheduled<T, E> {
        (**self).schedule(task)
    }
}
