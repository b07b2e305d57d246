//! # Completion handle for scheduled work.
//!
//! [`Scheduled`] is the promise-like side of a schedule/enqueue call. It resolves with the
//! task's value, or with a [`TaskError`] describing why no value is coming.
//!
//! ## Rules
//! - The work behind a handle progresses whether or not the handle is polled.
//! - Dropping the handle discards the result; it does **not** cancel the work.
//! - If the settling side is dropped without sending, the handle resolves to
//!   [`TaskError::Abandoned`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::TaskError;

/// Sending half kept by the scheduler until the task settles.
pub(crate) type Settle<T, E> = oneshot::Sender<Result<T, TaskError<E>>>;

/// Future resolving to the outcome of a scheduled task.
#[must_use = "dropping a Scheduled discards the task's result"]
#[derive(Debug)]
pub struct Scheduled<T, E> {
    rx: oneshot::Receiver<Result<T, TaskError<E>>>,
}

impl<T, E> Scheduled<T, E> {
    /// Creates a connected settle/handle pair.
    pub(crate) fn channel() -> (Settle<T, E>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Creates a handle that is already settled with `res`.
    pub(crate) fn ready(res: Result<T, TaskError<E>>) -> Self {
        let (tx, handle) = Self::channel();
        let _ = tx.send(res);
        handle
    }

    /// Returns the outcome if the task has already settled, without waiting.
    ///
    /// Returns `None` while the task is still waiting or running.
    pub fn try_result(&mut self) -> Option<Result<T, TaskError<E>>> {
        match self.rx.try_recv() {
            Ok(res) => Some(res),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(TaskError::Abandoned)),
        }
    }
}

impl<T, E> Future for Scheduled<T, E> {
    type Output = Result<T, TaskError<E>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(TaskError::Abandoned)))
    }
}
