//! # Schedulers: the contract and its implementations.
//!
//! - [`Scheduler`] - trait every scheduler implements (`schedule(task) -> Scheduled`)
//! - [`ImmediateScheduler`] - runs each task as soon as it is submitted
//! - [`MaxInFlightScheduler`] - decorator capping outstanding tasks, FIFO admission
//!
//! ## Layering
//! ```text
//! caller ──► MaxInFlightScheduler (policy) ──► ImmediateScheduler (dispatch) ──► tokio::spawn
//! ```

mod immediate;
mod max_in_flight;
mod scheduler;

pub use immediate::ImmediateScheduler;
pub use max_in_flight::MaxInFlightScheduler;
pub use scheduler::Scheduler;
