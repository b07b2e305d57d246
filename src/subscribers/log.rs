//! # LogWriter: event renderer
//!
//! A minimal subscriber that renders incoming [`Event`]s through `tracing`.
//! Failures and panics are logged at `warn`, admission chatter at `debug`, everything else at `info`.
//!
//! ## Example output (with a `fmt` subscriber)
//! ```text
//! DEBUG inflight: [queued] task="fetch" in_flight=5 waiting=3
//! DEBUG inflight: [dispatched] task="fetch" in_flight=5 waiting=2
//!  INFO inflight: [succeeded] task="fetch" in_flight=4 waiting=2
//!  WARN inflight: [failed] task="save" reason="409 conflict"
//!  INFO inflight: [action-started] key="line:7" task="save" pending=2
//!  INFO inflight: [queue-drained] key="line:7"
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("unknown");
        let key = e.key.as_deref();
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::TaskQueued => {
                debug!(task, ?key, in_flight = ?e.in_flight, waiting = ?e.waiting, "[queued]");
            }
            EventKind::TaskDispatched => {
                debug!(task, ?key, in_flight = ?e.in_flight, waiting = ?e.waiting, "[dispatched]");
            }
            EventKind::TaskSucceeded => {
                info!(task, ?key, in_flight = ?e.in_flight, waiting = ?e.waiting, "[succeeded]");
            }
            EventKind::TaskFailed => {
                warn!(task, ?key, reason, "[failed]");
            }
            EventKind::TaskPanicked => {
                warn!(task, ?key, reason, "[panicked]");
            }
            EventKind::TaskAbandoned => {
                warn!(task, ?key, "[abandoned]");
            }
            EventKind::ActionStarted => {
                info!(?key, task, pending = ?e.waiting, "[action-started]");
            }
            EventKind::QueueDrained => {
                info!(?key, "[queue-drained]");
            }
            EventKind::ListenerPanicked => {
                warn!(?key, listener = task, reason, "[listener-panicked]");
            }
            EventKind::SubscriberPanicked => {
                warn!(subscriber = task, reason, "[subscriber-panicked]");
            }
            EventKind::SubscriberOverflow => {
                warn!(subscriber = task, reason, "[subscriber-overflow]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
