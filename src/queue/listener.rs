//! # Queue listener trait.
//!
//! [`QueueListener`] is the extension point for observing an
//! [`ActionQueue`](crate::ActionQueue). It is called on **every** driver step with a
//! snapshot of the pending states, head first. While an action runs, its state stays at the
//! head of the snapshot, so a listener can render "now saving" style transitions.
//!
//! ## Rules
//! - Called synchronously from the queue driver; keep it cheap and non-blocking.
//! - Panics are caught, logged, and published as `EventKind::ListenerPanicked`;
//!   other listeners and the queue itself carry on.
//! - The listener list is snapshotted before each notification, so adding or removing
//!   listeners from inside a callback affects the next step only.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use inflight::{ActionQueue, QueueListener};
//!
//! struct Badge;
//!
//! impl QueueListener<&'static str> for Badge {
//!     fn on_change(&self, pending: &[&'static str]) {
//!         if let Some(head) = pending.first() {
//!             let _ = head; // show "saving…" for the head draft
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "badge" }
//! }
//!
//! let queue = ActionQueue::<&'static str>::new();
//! assert!(queue.add_listener(Arc::new(Badge)));
//! ```

/// Observer of a queue's pending states.
pub trait QueueListener<S>: Send + Sync + 'static {
    /// Receives the states of all pending actions, the running one first.
    ///
    /// An empty slice means the queue just went idle.
    fn on_change(&self, pending: &[S]);

    /// Returns the listener name used in logs and panic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl<S, F> QueueListener<S> for F
where
    F: Fn(&[S]) + Send + Sync + 'static,
{
    fn on_change(&self, pending: &[S]) {
        self(pending)
    }
}
