//! Error types used by schedulers and action queues.
//!
//! This module defines two enums:
//!
//! - [`TaskError`]: how a scheduled task (or queued action) ended, if not with success.
//! - [`BuildError`]: misuse detected while constructing a scheduler.
//!
//! Both types provide [`as_label`](TaskError::as_label) for logs/metrics.

use thiserror::Error;

use crate::core::Purpose;

/// # Failure observed through a [`Scheduled`](crate::Scheduled) handle.
///
/// The task's own error is carried verbatim in [`TaskError::Failed`].
/// The other variants describe failures of the task *shape* (it panicked)
/// or of its environment (nobody is left to settle it).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError<E> {
    /// The task ran and returned `Err(E)`.
    #[error("task failed: {0}")]
    Failed(E),

    /// The task closure or its future panicked.
    #[error("task panicked: {reason}")]
    Panicked {
        /// Panic payload rendered as text.
        reason: String,
    },

    /// The request was dropped before it settled (runtime shut down, scheduler dropped).
    #[error("task abandoned before it settled")]
    Abandoned,

    /// No Tokio runtime was available to drive the task.
    #[error("no tokio runtime available to run the task")]
    NoRuntime,
}

impl<E> TaskError<E> {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use inflight::TaskError;
    ///
    /// let err: TaskError<&str> = TaskError::Failed("boom");
    /// assert_eq!(err.as_label(), "task_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Failed(_) => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Abandoned => "task_abandoned",
            TaskError::NoRuntime => "task_no_runtime",
        }
    }

    /// True when the task itself returned an error.
    pub fn is_failure(&self) -> bool {
        matches!(self, TaskError::Failed(_))
    }

    /// Extracts the task's own error, if that is what this is.
    pub fn into_failure(self) -> Option<E> {
        match self {
            TaskError::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// # Errors raised while building schedulers.
///
/// These are programmer errors and surface at construction, never at schedule time.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    /// A concurrency limit of zero would never admit anything.
    #[error("max in-flight limit must be at least 1 (purpose: {purpose:?})")]
    ZeroLimit {
        /// Lane the limit was configured for, if any.
        purpose: Option<Purpose>,
    },
}

impl BuildError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::ZeroLimit { .. } => "build_zero_limit",
        }
    }
}

/// Renders a panic payload the way `std` prints it.
pub(crate) fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
