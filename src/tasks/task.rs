//! # One-shot unit of work.
//!
//! [`Task`] wraps a closure `F: FnOnce() -> Fut`, producing exactly one future when started.
//! The scheduler never inspects what the task does; it only observes how it settles.
//!
//! ## Concurrency semantics
//! - Starting a task consumes it; a task is dispatched at most once.
//! - The closure runs synchronously at dispatch time, the future runs wherever the
//!   dispatching scheduler drives it.
//!
//! ## Example
//! ```rust
//! use inflight::Task;
//!
//! let t: Task<u32, String> = Task::named("fetch-config", || async { Ok(42) });
//! assert_eq!(t.name(), "fetch-config");
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{TaskError, panic_reason};

/// Boxed future returned by a started task.
pub type TaskFuture<T, E> = BoxFuture<'static, Result<T, E>>;

type Starter<T, E> = Box<dyn FnOnce() -> TaskFuture<T, E> + Send + 'static>;

/// Function-backed task, consumed on dispatch.
pub struct Task<T, E> {
    name: Cow<'static, str>,
    start: Starter<T, E>,
}

impl<T, E> Task<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Creates an unnamed task (reported as `"task"` in events).
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::named("task", f)
    }

    /// Creates a task with a human-readable name used in events and logs.
    pub fn named<F, Fut>(name: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            name: name.into(),
            start: Box::new(move || Box::pin(f())),
        }
    }
}

impl<T, E> Task<T, E> {
    /// Returns the task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the closure and returns the future it produced.
    pub fn start(self) -> TaskFuture<T, E> {
        (self.start)()
    }
}

impl<T, E> Task<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Invokes the closure now and returns a future that never unwinds.
    ///
    /// Panics in the closure or the future become [`TaskError::Panicked`];
    /// `Err(e)` becomes [`TaskError::Failed`].
    pub(crate) fn start_caught(self) -> BoxFuture<'static, Result<T, TaskError<E>>> {
        let fut = match catch_unwind(AssertUnwindSafe(|| self.start())) {
            Ok(fut) => fut,
            Err(payload) => {
                let err = TaskError::Panicked {
                    reason: panic_reason(payload.as_ref()),
                };
                return Box::pin(futures::future::ready(Err(err)));
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(TaskError::Failed(e)),
                Err(payload) => Err(TaskError::Panicked {
                    reason: panic_reason(payload.as_ref()),
                }),
            }
        })
    }
}

impl<T, E> fmt::Debug for Task<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}
