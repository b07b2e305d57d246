//! Composition root: lane configuration and the per-purpose scheduler registry.
//!
//! - [`Config`] / [`Purpose`]: lane limits and names;
//! - [`Schedulers`]: one bounded scheduler per purpose over a shared base;
//! - [`SchedulersBuilder`]: wires the base scheduler, event bus and subscribers.

mod builder;
mod config;
mod registry;

pub use builder::SchedulersBuilder;
pub use config::{Config, Purpose};
pub use registry::Schedulers;
