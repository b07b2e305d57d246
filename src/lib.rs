//! # inflight
//!
//! **inflight** is a small task-scheduling core for async Rust.
//!
//! It bounds how many pieces of asynchronous work (typically network requests) are
//! outstanding at once, and runs ordered chains of actions one after another. It is
//! designed as a building block under a request layer: the crate never inspects what a
//! task does, only how it settles.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!            ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!            │ Task (read)  │   │ Task (write) │   │ Task (serial)│
//!            └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!                   ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Schedulers (composition root, one value, no globals)             │
//! │  - MaxInFlightScheduler per Purpose (read=10, write=5, serial=1)  │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        └──────────────────┼──────────────────┘
//!                           ▼
//!                ┌─────────────────────┐
//!                │ base Scheduler      │  (ImmediateScheduler unless overridden)
//!                │ closure → spawn     │
//!                └─────────────────────┘
//!
//!  ActionQueue / KeyedActionQueues (independent of the lanes)
//!    enqueue(task, state) ──► run one at a time, in order ──► listeners see pending states
//! ```
//!
//! ### Admission
//! ```text
//! schedule(task)
//!   ├─► in_flight < max ─► in_flight += 1 ─► base.schedule(task)
//!   └─► otherwise       ─► waiting.push_back
//!
//! task settles (value, error or panic)
//!   ├─► in_flight -= 1
//!   ├─► admit waiting.pop_front() if any
//!   └─► forward the outcome to the caller's Scheduled handle
//! ```
//!
//! ## Features
//! | Area               | Description                                                   | Key types / traits                                   |
//! |--------------------|---------------------------------------------------------------|------------------------------------------------------|
//! | **Tasks**          | One-shot named units of work and their completion handles.    | [`Task`], [`Scheduled`]                              |
//! | **Schedulers**     | Dispatch contract, immediate dispatch, concurrency cap.       | [`Scheduler`], [`ImmediateScheduler`], [`MaxInFlightScheduler`] |
//! | **Queues**         | Serial execution with observable pending states, per key.     | [`ActionQueue`], [`QueueListener`], [`KeyedActionQueues`] |
//! | **Lanes**          | Per-purpose registry built from a [`Config`].                 | [`Schedulers`], [`SchedulersBuilder`], [`Purpose`]   |
//! | **Subscriber API** | Observe admission and queue events.                           | [`Subscribe`], [`SubscriberSet`], [`Event`]          |
//! | **Errors**         | Typed task outcomes and construction errors.                  | [`TaskError`], [`BuildError`]                        |
//!
//! ## Optional features
//! - `logging`: exports a built-in `LogWriter` subscriber that renders events via `tracing`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use inflight::{ActionQueue, Config, Purpose, Schedulers, Task};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn inflight::Subscribe>> = vec![Arc::new(inflight::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn inflight::Subscribe>> = Vec::new();
//!
//!     let schedulers = Schedulers::<String, String>::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build()?;
//!
//!     // Bounded: at most 10 reads are outstanding at once.
//!     let reads = schedulers.get(Purpose::Read);
//!     let body = reads
//!         .schedule(Task::named("GET /changes/42", || async { Ok("{}".to_string()) }))
//!         .await?;
//!     assert_eq!(body, "{}");
//!
//!     // Serial: draft edits on one line never overlap.
//!     let drafts = ActionQueue::keyed("change~42/ps1/line:7");
//!     let writes = schedulers.get(Purpose::Write);
//!     let save = drafts.enqueue(
//!         Task::named("save draft", move || async move {
//!             writes.schedule(Task::new(|| async { Ok("saved".to_string()) })).await
//!         }),
//!         "saving",
//!     );
//!     drafts.await_clear().await;
//!     assert_eq!(save.await.ok().as_deref(), Some("saved"));
//!
//!     schedulers.shutdown().await;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod queue;
mod schedulers;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use crate::core::{Config, Purpose, Schedulers, SchedulersBuilder};
pub use error::{BuildError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use queue::{ActionQueue, KeyedActionQueues, ListenerRef, QueueListener};
pub use schedulers::{ImmediateScheduler, MaxInFlightScheduler, Scheduler};
pub use subscribers::{Subscribe, SubscriberSet};
pub use tasks::{Scheduled, Task, TaskFuture};

// Optional: expose a built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
