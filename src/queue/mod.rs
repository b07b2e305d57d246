//! # Serial action queues.
//!
//! - [`ActionQueue`] - runs actions one at a time in submission order, exposing the pending
//!   caller states to listeners
//! - [`QueueListener`] / [`ListenerRef`] - observer of queue snapshots
//! - [`KeyedActionQueues`] - lazily created queue per caller-chosen key
//!
//! Queues run tasks themselves; they do not go through a [`Scheduler`](crate::Scheduler).
//! To also bound concurrency, enqueue a task whose body schedules its real work on a
//! shared [`MaxInFlightScheduler`](crate::MaxInFlightScheduler) and awaits the handle.

mod action_queue;
mod keyed;
mod listener;

pub use action_queue::{ActionQueue, ListenerRef};
pub use keyed::KeyedActionQueues;
pub use listener::QueueListener;
