//! # Lane configuration.
//!
//! Provides [`Config`], the settings used by [`SchedulersBuilder`](crate::SchedulersBuilder),
//! and [`Purpose`], the name of each concurrency lane.
//!
//! ## Lanes
//! ```text
//! Purpose::Read   ──► MaxInFlightScheduler(read_max_in_flight   = 10) ─┐
//! Purpose::Write  ──► MaxInFlightScheduler(write_max_in_flight  =  5) ─┼──► shared base scheduler
//! Purpose::Serial ──► MaxInFlightScheduler(serial_max_in_flight =  1) ─┘
//! ```
//!
//! ## Sentinel values
//! - any `*_max_in_flight = 0` → rejected by `build()` with `BuildError::ZeroLimit`
//! - `bus_capacity = 0` → clamped to 1
//! - `bus_capacity > Bus::MAX_CAPACITY` → clamped to `Bus::MAX_CAPACITY`

use std::fmt;

use crate::events::Bus;

/// Concurrency lane a task is scheduled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Idempotent fetches; the widest lane.
    Read,
    /// Mutating requests.
    Write,
    /// Requests that must not overlap with each other.
    Serial,
}

impl Purpose {
    /// Every lane, in a fixed order.
    pub const ALL: [Purpose; 3] = [Purpose::Read, Purpose::Write, Purpose::Serial];

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Purpose::Read => "read",
            Purpose::Write => "write",
            Purpose::Serial => "serial",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Purpose::Read => 0,
            Purpose::Write => 1,
            Purpose::Serial => 2,
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Settings for the per-purpose scheduler registry.
///
/// ## Field semantics
/// - `read_max_in_flight`: cap for [`Purpose::Read`] (must be > 0)
/// - `write_max_in_flight`: cap for [`Purpose::Write`] (must be > 0)
/// - `serial_max_in_flight`: cap for [`Purpose::Serial`] (must be > 0, usually 1)
/// - `bus_capacity`: event bus ring buffer size (clamped to `1..=Bus::MAX_CAPACITY`)
///
/// All fields are public. Prefer the helper accessors over reading fields directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum outstanding read tasks.
    pub read_max_in_flight: usize,

    /// Maximum outstanding write tasks.
    pub write_max_in_flight: usize,

    /// Maximum outstanding serial tasks.
    pub serial_max_in_flight: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Receivers that lag behind more than `bus_capacity` messages
    /// receive `Lagged` and skip older items.
    pub bus_capacity: usize,
}

impl Config {
    /// Returns the configured limit for `purpose` (unvalidated).
    #[inline]
    pub fn limit(&self, purpose: Purpose) -> usize {
        match purpose {
            Purpose::Read => self.read_max_in_flight,
            Purpose::Write => self.write_max_in_flight,
            Purpose::Serial => self.serial_max_in_flight,
        }
    }

    /// Sets the limit for `purpose`.
    #[inline]
    pub fn with_limit(mut self, purpose: Purpose, max: usize) -> Self {
        match purpose {
            Purpose::Read => self.read_max_in_flight = max,
            Purpose::Write => self.write_max_in_flight = max,
            Purpose::Serial => self.serial_max_in_flight = max,
        }
        self
    }

    /// Returns the bus capacity clamped to `1..=Bus::MAX_CAPACITY`.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.clamp(1, Bus::MAX_CAPACITY)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `read_max_in_flight = 10`
    /// - `write_max_in_flight = 5`
    /// - `serial_max_in_flight = 1`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            read_max_in_flight: 10,
            write_max_in_flight: 5,
            serial_max_in_flight: 1,
            bus_capacity: 1024,
        }
    }
}
