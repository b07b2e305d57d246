//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out, and the
//! built-in `LogWriter` (feature `logging`).
//!
//! ## Architecture
//! ```text
//! MaxInFlightScheduler ─┐
//! ActionQueue ──────────┼── publish(Event) ──► Bus ──► Schedulers listener ──► SubscriberSet
//! SubscriberSet workers ┘                                                           │
//!                                                           ┌─────────┬─────────────┤
//!                                                           ▼         ▼             ▼
//!                                                       LogWriter  Metrics       Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use inflight::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct Saturation;
//!
//! #[async_trait]
//! impl Subscribe for Saturation {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::TaskQueued {
//!             // the lane is saturated
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscriber::Subscribe;
