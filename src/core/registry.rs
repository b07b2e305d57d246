//! # Per-purpose scheduler registry.
//!
//! [`Schedulers`] is the composition root: one [`MaxInFlightScheduler`] per [`Purpose`], all
//! decorating the same base scheduler and publishing to the same [`Bus`]. It is an ordinary
//! value constructed by [`SchedulersBuilder`](crate::SchedulersBuilder) and passed to whoever
//! needs it; there is no global instance.
//!
//! ## Event flow
//! ```text
//! lanes ── publish ──► Bus ──► listener task ──► SubscriberSet ──► workers
//!                                   ▲
//!                     shutdown() ───┘ cancel, drain what is buffered, close workers
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{Config, Purpose, SchedulersBuilder};
use crate::error::BuildError;
use crate::events::Bus;
use crate::schedulers::{MaxInFlightScheduler, Scheduler};
use crate::subscribers::SubscriberSet;
use crate::tasks::{Scheduled, Task};

/// Scheduler per purpose, sharing one base scheduler and one event bus.
///
/// # Example
/// ```
/// use inflight::{Config, Purpose, Schedulers, Task};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), inflight::BuildError> {
/// let schedulers = Schedulers::<String, String>::new(Config::default())?;
/// let serial = schedulers.get(Purpose::Serial);
/// let out = serial.schedule(Task::named("rebase", || async { Ok("done".to_string()) })).await;
/// assert_eq!(out.as_deref(), Ok("done"));
/// schedulers.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Schedulers<T, E> {
    cfg: Config,
    lanes: [Arc<MaxInFlightScheduler<T, E>>; 3],
    bus: Bus,
    token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<T, E> Schedulers<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Builds the registry over an [`ImmediateScheduler`](crate::ImmediateScheduler)
    /// with no subscribers.
    pub fn new(cfg: Config) -> Result<Self, BuildError> {
        SchedulersBuilder::new(cfg).build()
    }

    /// Returns a builder for a customized registry.
    pub fn builder(cfg: Config) -> SchedulersBuilder<T, E> {
        SchedulersBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        cfg: Config,
        lanes: [Arc<MaxInFlightScheduler<T, E>>; 3],
        bus: Bus,
        subs: Option<SubscriberSet>,
    ) -> Self {
        let token = CancellationToken::new();
        let listener = subs.map(|subs| spawn_listener(&bus, subs, token.clone()));
        Self {
            cfg,
            lanes,
            bus,
            token,
            listener: Mutex::new(listener),
        }
    }

    /// Returns the shared scheduler for `purpose`.
    pub fn get(&self, purpose: Purpose) -> Arc<dyn Scheduler<T, E>> {
        Arc::clone(&self.lanes[purpose.index()]) as Arc<dyn Scheduler<T, E>>
    }

    /// Schedules `task` on the lane for `purpose`.
    pub fn schedule(&self, purpose: Purpose, task: Task<T, E>) -> Scheduled<T, E> {
        self.lanes[purpose.index()].schedule(task)
    }
}

impl<T, E> Schedulers<T, E> {
    /// Concrete lane for `purpose`, for reading its counters.
    pub fn lane(&self, purpose: Purpose) -> &MaxInFlightScheduler<T, E> {
        &self.lanes[purpose.index()]
    }

    /// Configuration the registry was built from.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Bus every lane publishes to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Stops forwarding events to subscribers.
    ///
    /// Events already on the bus are delivered and every subscriber worker finishes its
    /// queue before this returns. Tasks in flight are not affected. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        self.token.cancel();
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = listener {
            let _ = handle.await;
        }
    }
}

impl<T, E> Drop for Schedulers<T, E> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Forwards bus events to `subs` until `token` is cancelled, then flushes.
fn spawn_listener(bus: &Bus, subs: SubscriberSet, token: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => subs.emit(&ev),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "subscriber listener lagged behind the bus");
                    }
                }
            }
        }

        loop {
            match rx.try_recv() {
                Ok(ev) => subs.emit(&ev),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        debug!(subscribers = subs.len(), "shutting down subscriber workers");
        subs.shutdown().await;
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use super::*;
    use crate::events::{Event, EventKind};
    use crate::schedulers::ImmediateScheduler;
    use crate::subscribers::Subscribe;

    struct Recorder {
        seen: Arc<Mutex<Vec<(EventKind, Option<Arc<str>>)>>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, ev: &Event) {
            self.seen.lock().unwrap().push((ev.kind, ev.task.clone()));
        }
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Scheduler<u8, ()> for Counting {
        fn schedule(&self, task: Task<u8, ()>) -> Scheduled<u8, ()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ImmediateScheduler::new().schedule(task)
        }
    }

    #[tokio::test]
    async fn lanes_use_configured_limits() {
        let schedulers = Schedulers::<(), ()>::new(Config::default()).unwrap();
        assert_eq!(schedulers.lane(Purpose::Read).max_in_flight(), 10);
        assert_eq!(schedulers.lane(Purpose::Write).max_in_flight(), 5);
        assert_eq!(schedulers.lane(Purpose::Serial).max_in_flight(), 1);
    }

    #[tokio::test]
    async fn oversized_bus_capacity_still_builds() {
        let cfg = Config {
            bus_capacity: usize::MAX,
            ..Config::default()
        };
        let schedulers = Schedulers::<u8, ()>::new(cfg).unwrap();
        let out = schedulers
            .schedule(Purpose::Read, Task::new(|| async { Ok(3) }))
            .await;
        assert_eq!(out, Ok(3));
        schedulers.shutdown().await;
    }

    #[tokio::test]
    async fn zero_limit_names_the_lane() {
        let cfg = Config::default().with_limit(Purpose::Write, 0);
        let err = Schedulers::<(), ()>::new(cfg).err();
        assert_eq!(
            err,
            Some(BuildError::ZeroLimit {
                purpose: Some(Purpose::Write)
            })
        );
    }

    #[tokio::test]
    async fn get_returns_the_shared_lane() {
        let schedulers = Schedulers::<u8, ()>::new(Config::default()).unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let first = schedulers.get(Purpose::Serial).schedule(Task::new(|| async move {
            let _ = rx.await;
            Ok(1)
        }));
        let second = schedulers
            .get(Purpose::Serial)
            .schedule(Task::new(|| async { Ok(2) }));

        assert_eq!(schedulers.lane(Purpose::Serial).in_flight(), 1);
        assert_eq!(schedulers.lane(Purpose::Serial).waiting(), 1);

        // Other lanes are not blocked by the serial lane.
        let read = schedulers.schedule(Purpose::Read, Task::new(|| async { Ok(3) }));
        assert_eq!(read.await, Ok(3));

        tx.send(()).unwrap();
        assert_eq!(first.await, Ok(1));
        assert_eq!(second.await, Ok(2));
    }

    #[tokio::test]
    async fn lanes_share_custom_base() {
        let calls = Arc::new(AtomicUsize::new(0));
        let schedulers = Schedulers::<u8, ()>::builder(Config::default())
            .with_base(Counting {
                calls: Arc::clone(&calls),
            })
            .build()
            .unwrap();

        for purpose in Purpose::ALL {
            assert_eq!(schedulers.schedule(purpose, Task::new(|| async { Ok(0) })).await, Ok(0));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn shutdown_flushes_events_to_subscribers() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let schedulers = Schedulers::<u8, &'static str>::builder(Config::default())
            .with_subscribers(vec![Arc::new(Recorder {
                seen: Arc::clone(&seen),
            })])
            .build()
            .unwrap();

        let ok = schedulers.schedule(Purpose::Write, Task::named("save", || async { Ok(1) }));
        assert_eq!(ok.await, Ok(1));
        let bad = schedulers.schedule(Purpose::Write, Task::named("discard", || async { Err("gone") }));
        assert!(bad.await.is_err());

        schedulers.shutdown().await;
        schedulers.shutdown().await;

        let kinds: Vec<EventKind> = seen.lock().unwrap().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::TaskDispatched,
                EventKind::TaskSucceeded,
                EventKind::TaskDispatched,
                EventKind::TaskFailed,
            ]
        );
        assert_eq!(seen.lock().unwrap()[3].1.as_deref(), Some("discard"));
    }
}
