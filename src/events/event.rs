//! # Runtime events emitted by schedulers and action queues.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Admission events**: requests entering, leaving, and settling in a scheduler
//! - **Queue events**: per-key action queues starting actions and draining
//! - **Observer events**: listener and subscriber failures that were isolated
//!
//! The [`Event`] struct carries metadata such as timestamps, task name, key,
//! counters, and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use inflight::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskQueued)
//!     .with_task("fetch-diff")
//!     .with_waiting(3);
//!
//! assert_eq!(ev.kind, EventKind::TaskQueued);
//! assert_eq!(ev.task.as_deref(), Some("fetch-diff"));
//! assert_eq!(ev.waiting, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Admission events ===
    /// Capacity was exhausted; the request was parked in the waiting list.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `waiting`: waiting-list length after the push
    TaskQueued,

    /// The request was handed to the wrapped scheduler.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `in_flight`: in-flight count including this request
    TaskDispatched,

    /// The task settled with a value.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `in_flight`: in-flight count after the slot was released
    TaskSucceeded,

    /// The task settled with its own error.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `in_flight`: in-flight count after the slot was released
    /// - `reason`: error label
    TaskFailed,

    /// The task closure or future panicked.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `reason`: panic message
    TaskPanicked,

    /// The wrapped scheduler dropped the task without settling it.
    ///
    /// Sets:
    /// - `task`: task name
    /// - `reason`: error label
    TaskAbandoned,

    // === Queue events ===
    /// An action reached the head of its queue and started.
    ///
    /// Sets:
    /// - `task`: action name
    /// - `key`: queue key, if the queue has one
    /// - `waiting`: queue length including the running action
    ActionStarted,

    /// A queue went from non-empty to empty.
    ///
    /// Sets:
    /// - `key`: queue key, if the queue has one
    QueueDrained,

    // === Observer events ===
    /// A queue listener panicked; the driver carried on.
    ///
    /// Sets:
    /// - `task`: listener name
    /// - `key`: queue key, if the queue has one
    /// - `reason`: panic message
    ListenerPanicked,

    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `task`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task, action, listener or subscriber, if applicable.
    pub task: Option<Arc<str>>,
    /// Queue key, if the event came from a keyed queue.
    pub key: Option<Arc<str>>,
    /// In-flight count observed when the event was built.
    pub in_flight: Option<usize>,
    /// Waiting/queued count observed when the event was built.
    pub waiting: Option<usize>,
    /// Human-readable reason (error labels, panic messages, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            key: None,
            in_flight: None,
            waiting: None,
            reason: None,
        }
    }

    /// Attaches a task name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a queue key.
    #[inline]
    pub fn with_key(mut self, key: impl Into<Arc<str>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attaches an optional queue key (no-op on `None`).
    #[inline]
    pub fn with_key_opt(self, key: Option<&Arc<str>>) -> Self {
        match key {
            Some(k) => self.with_key(Arc::clone(k)),
            None => self,
        }
    }

    /// Attaches the in-flight count.
    #[inline]
    pub fn with_in_flight(mut self, n: usize) -> Self {
        self.in_flight = Some(n);
        self
    }

    /// Attaches the waiting count.
    #[inline]
    pub fn with_waiting(mut self, n: usize) -> Self {
        self.waiting = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    /// True when a subscriber queue was full and the event was dropped for it.
    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// True for events describing a task that did not settle with a value.
    #[inline]
    pub fn is_task_failure(&self) -> bool {
        matches!(
            self.kind,
            EventKind::TaskFailed | EventKind::TaskPanicked | EventKind::TaskAbandoned
        )
    }
}
