use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::debug;

use crate::{
    core::{Config, Purpose, Schedulers},
    error::BuildError,
    events::Bus,
    schedulers::{ImmediateScheduler, MaxInFlightScheduler, Scheduler},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing [`Schedulers`] with optional features.
pub struct SchedulersBuilder<T, E> {
    cfg: Config,
    base: Option<Arc<dyn Scheduler<T, E>>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl<T, E> SchedulersBuilder<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            base: None,
            subscribers: Vec::new(),
        }
    }

    /// Sets the scheduler every lane decorates (defaults to [`ImmediateScheduler`]).
    ///
    /// All lanes share this one instance.
    pub fn with_base(mut self, base: impl Scheduler<T, E>) -> Self {
        self.base = Some(Arc::new(base));
        self
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive admission and settlement events through dedicated workers
    /// with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and builds the registry.
    ///
    /// Returns [`BuildError::ZeroLimit`] naming the first lane configured with a zero limit.
    ///
    /// # Panics
    /// When subscribers are set, this spawns their workers and must be called from
    /// within a Tokio runtime.
    pub fn build(self) -> Result<Schedulers<T, E>, BuildError> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let base: Arc<dyn Scheduler<T, E>> = match self.base {
            Some(base) => base,
            None => Arc::new(ImmediateScheduler::new()),
        };

        let lane = |purpose: Purpose| -> Result<Arc<MaxInFlightScheduler<T, E>>, BuildError> {
            let max = NonZeroUsize::new(self.cfg.limit(purpose)).ok_or(BuildError::ZeroLimit {
                purpose: Some(purpose),
            })?;
            Ok(Arc::new(
                MaxInFlightScheduler::with_limit(Arc::clone(&base), max).with_bus(bus.clone()),
            ))
        };
        let lanes = [
            lane(Purpose::Read)?,
            lane(Purpose::Write)?,
            lane(Purpose::Serial)?,
        ];

        let subs = (!self.subscribers.is_empty())
            .then(|| SubscriberSet::new(self.subscribers, bus.clone()));
        debug!(
            read = self.cfg.read_max_in_flight,
            write = self.cfg.write_max_in_flight,
            serial = self.cfg.serial_max_in_flight,
            subscribers = subs.as_ref().map_or(0, SubscriberSet::len),
            "built schedulers"
        );
        Ok(Schedulers::from_parts(self.cfg, lanes, bus, subs))
    }
}
