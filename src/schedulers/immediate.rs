//! # Run-now scheduler.
//!
//! [`ImmediateScheduler`] invokes the task closure inside `schedule` and spawns the resulting
//! future on the current Tokio runtime. It has no queue and no limit, and is the usual
//! innermost layer that policy schedulers decorate.
//!
//! ## Failure semantics
//! - `Err(e)` from the task → [`TaskError::Failed`]
//! - panic in the closure or the future → [`TaskError::Panicked`]
//! - no runtime on the calling thread → [`TaskError::NoRuntime`] (the closure is not invoked)
//! - runtime shut down while the future was pending → [`TaskError::Abandoned`]

use tokio::runtime::Handle;

use crate::error::TaskError;
use crate::schedulers::Scheduler;
use crate::tasks::{Scheduled, Task};

/// Scheduler that dispatches every task as soon as it is submitted.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImmediateScheduler;

impl ImmediateScheduler {
    /// Creates the scheduler. It holds no state.
    pub fn new() -> Self {
        Self
    }
}

impl<T, E> Scheduler<T, E> for ImmediateScheduler
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn schedule(&self, task: Task<T, E>) -> Scheduled<T, E> {
        let Ok(rt) = Handle::try_current() else {
            return Scheduled::ready(Err(TaskError::NoRuntime));
        };

        let fut = task.start_caught();
        let (tx, handle) = Scheduled::channel();
        rt.spawn(async move {
            let _ = tx.send(fut.await);
        });
        handle
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[tokio::test]
    async fn forwards_value() {
        let out = ImmediateScheduler::new()
            .schedule(Task::<_, ()>::new(|| async { Ok("pong") }))
            .await;
        assert_eq!(out, Ok("pong"));
    }

    #[tokio::test]
    async fn forwards_task_error_verbatim() {
        let out = ImmediateScheduler::new()
            .schedule(Task::<(), _>::new(|| async { Err("401 unauthorized") }))
            .await;
        assert_eq!(out, Err(TaskError::Failed("401 unauthorized")));
    }

    #[tokio::test]
    async fn invokes_closure_within_schedule() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let handle = ImmediateScheduler::new().schedule(Task::<(), ()>::new(move || {
            flag.store(true, Ordering::SeqCst);
            futures::future::pending()
        }));

        assert!(called.load(Ordering::SeqCst));
        drop(handle);
    }

    #[tokio::test]
    async fn closure_panic_becomes_error() {
        let out = ImmediateScheduler::new()
            .schedule(Task::<(), ()>::new(|| -> futures::future::Ready<Result<(), ()>> {
                panic!("bad request builder")
            }))
            .await;
        assert_eq!(
            out,
            Err(TaskError::Panicked {
                reason: "bad request builder".into()
            })
        );
    }

    #[tokio::test]
    async fn future_panic_becomes_error() {
        let out = ImmediateScheduler::new()
            .schedule(Task::<(), ()>::new(|| async { panic!("decode failed") }))
            .await;
        assert!(matches!(out, Err(TaskError::Panicked { .. })));
    }

    #[test]
    fn without_runtime_resolves_to_no_runtime() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let mut handle = ImmediateScheduler::new().schedule(Task::<(), ()>::new(move || {
            flag.store(true, Ordering::SeqCst);
            async { Ok(()) }
        }));

        assert_eq!(handle.try_result(), Some(Err(TaskError::NoRuntime)));
        assert!(!called.load(Ordering::SeqCst));
    }
}
