//! # Bounded-concurrency decorator.
//!
//! [`MaxInFlightScheduler`] wraps any [`Scheduler`] and caps how many of its tasks are
//! outstanding at once. Excess requests wait in a FIFO list and are admitted one by one
//! as running tasks settle, successfully or not.
//!
//! ## Architecture
//! ```text
//! schedule(task)
//!     │
//!     ├─ in_flight < max ──► in_flight += 1 ──► admitted ──► dispatcher ──► base.schedule()
//!     │                                                                        │
//!     └─ otherwise ───────► waiting (FIFO)                                     ▼
//!                               ▲                                    settle watcher (spawned)
//!                               │                                              │
//!                               └── pop_front, in_flight += 1 ◄── in_flight -= 1
//!                                                                              │
//!                                                              forward result to caller
//! ```
//!
//! ## Rules
//! - `in_flight` counts requests admitted and not yet settled; it never exceeds `max`.
//! - Requests reach the wrapped scheduler in exactly the order `schedule` was called.
//!   A single dispatcher drains the admitted list, so settlements on different worker
//!   threads cannot reorder dispatch.
//! - On settlement the slot is released and the next request admitted **before** the
//!   result is forwarded to the caller.
//! - Any settlement frees the slot exactly like a success does. That includes a
//!   settle watcher dropped by runtime shutdown, which releases the slot as abandoned.
//!
//! ## Request lifecycle
//! ```text
//! Waiting ──► Dispatched ──► Settled        (Waiting skipped when capacity is free)
//! ```

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::error::{BuildError, TaskError, panic_reason};
use crate::events::{Bus, Event, EventKind};
use crate::schedulers::Scheduler;
use crate::tasks::{Scheduled, Settle, Task};

/// Request parked in the scheduler until it is handed to the wrapped scheduler.
struct Request<T, E> {
    task: Task<T, E>,
    settle: Settle<T, E>,
}

struct State<T, E> {
    /// Admitted and not yet settled (includes `admitted`).
    in_flight: usize,
    /// Requests waiting for capacity, in arrival order.
    waiting: VecDeque<Request<T, E>>,
    /// Requests holding a slot but not yet handed to `base`.
    admitted: VecDeque<Request<T, E>>,
    /// True while some caller is draining `admitted`.
    dispatching: bool,
}

struct Shared<T, E> {
    base: Box<dyn Scheduler<T, E>>,
    max: NonZeroUsize,
    state: Mutex<State<T, E>>,
    bus: OnceLock<Bus>,
}

/// Scheduler decorator that limits the number of concurrently outstanding tasks.
///
/// # Example
/// ```
/// use std::num::NonZeroUsize;
/// use inflight::{ImmediateScheduler, MaxInFlightScheduler, Scheduler, Task};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let serial = MaxInFlightScheduler::with_limit(ImmediateScheduler::new(), NonZeroUsize::MIN);
/// let a = serial.schedule(Task::<_, ()>::new(|| async { Ok("first") }));
/// let b = serial.schedule(Task::<_, ()>::new(|| async { Ok("second") }));
/// assert_eq!(serial.waiting(), 1);
/// assert_eq!(a.await, Ok("first"));
/// assert_eq!(b.await, Ok("second"));
/// # }
/// ```
pub struct MaxInFlightScheduler<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> Clone for MaxInFlightScheduler<T, E> {
    /// Clones share the same limit, counters and waiting list.
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T, E> MaxInFlightScheduler<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wraps `base`, allowing at most `max` outstanding tasks.
    ///
    /// Returns [`BuildError::ZeroLimit`] when `max == 0`.
    pub fn new(base: impl Scheduler<T, E>, max: usize) -> Result<Self, BuildError> {
        let max = NonZeroUsize::new(max).ok_or(BuildError::ZeroLimit { purpose: None })?;
        Ok(Self::with_limit(base, max))
    }

    /// Wraps `base` with an already validated limit.
    pub fn with_limit(base: impl Scheduler<T, E>, max: NonZeroUsize) -> Self {
        Self {
            shared: Arc::new(Shared {
                base: Box::new(base),
                max,
                state: Mutex::new(State {
                    in_flight: 0,
                    waiting: VecDeque::new(),
                    admitted: VecDeque::new(),
                    dispatching: false,
                }),
                bus: OnceLock::new(),
            }),
        }
    }

    /// Publishes admission events to `bus`. Only the first bus set is kept.
    pub fn with_bus(self, bus: Bus) -> Self {
        let _ = self.shared.bus.set(bus);
        self
    }
}

impl<T, E> MaxInFlightScheduler<T, E> {
    /// Configured concurrency cap.
    pub fn max_in_flight(&self) -> usize {
        self.shared.max.get()
    }

    /// Number of requests admitted and not yet settled.
    pub fn in_flight(&self) -> usize {
        self.shared.lock().in_flight
    }

    /// Number of requests waiting for capacity.
    pub fn waiting(&self) -> usize {
        self.shared.lock().waiting.len()
    }
}

impl<T, E> Scheduler<T, E> for MaxInFlightScheduler<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn schedule(&self, task: Task<T, E>) -> Scheduled<T, E> {
        let (settle, handle) = Scheduled::channel();
        let name: Arc<str> = Arc::from(task.name());
        let req = Request { task, settle };

        {
            let mut st = self.shared.lock();
            if st.in_flight < self.shared.max.get() {
                st.in_flight += 1;
                st.admitted.push_back(req);
            } else {
                st.waiting.push_back(req);
                let waiting = st.waiting.len();
                drop(st);

                trace!(task = %name, waiting, "capacity exhausted, request queued");
                self.shared
                    .publish(|| Event::new(EventKind::TaskQueued).with_task(name).with_waiting(waiting));
                return handle;
            }
        }

        Shared::drain(&self.shared);
        handle
    }
}

impl<T, E> Shared<T, E> {
    fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, ev: impl FnOnce() -> Event) {
        if let Some(bus) = self.bus.get() {
            bus.publish(ev());
        }
    }
}

impl<T, E> Shared<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Hands admitted requests to `base` in order. Only one caller drains at a time;
    /// everyone else just leaves their request in `admitted`.
    fn drain(this: &Arc<Self>) {
        {
            let mut st = this.lock();
            if st.dispatching {
                return;
            }
            st.dispatching = true;
        }

        loop {
            let (req, in_flight) = {
                let mut st = this.lock();
                match st.admitted.pop_front() {
                    Some(req) => (req, st.in_flight),
                    None => {
                        st.dispatching = false;
                        return;
                    }
                }
            };
            Self::dispatch(this, req, in_flight);
        }
    }

    fn dispatch(this: &Arc<Self>, req: Request<T, E>, in_flight: usize) {
        let Request { task, settle } = req;
        let name: Arc<str> = Arc::from(task.name());

        debug!(task = %name, in_flight, max = this.max.get(), "dispatching task");
        this.publish(|| {
            Event::new(EventKind::TaskDispatched)
                .with_task(Arc::clone(&name))
                .with_in_flight(in_flight)
        });

        let inner = catch_unwind(AssertUnwindSafe(|| this.base.schedule(task))).unwrap_or_else(
            |payload| {
                Scheduled::ready(Err(TaskError::Panicked {
                    reason: panic_reason(payload.as_ref()),
                }))
            },
        );

        match Handle::try_current() {
            Ok(rt) => {
                let slot = Slot {
                    shared: Arc::clone(this),
                    name,
                    held: true,
                };
                rt.spawn(async move {
                    let res = inner.await;
                    slot.release(&res);
                    let _ = settle.send(res);
                });
            }
            Err(_) => {
                let res = Err(TaskError::NoRuntime);
                Self::release(this, &name, &res);
                let _ = settle.send(res);
            }
        }
    }

    /// Frees the slot of a settled request and admits the next waiting one, if any.
    fn release(this: &Arc<Self>, name: &Arc<str>, res: &Result<T, TaskError<E>>) {
        let in_flight = {
            let mut st = this.lock();
            st.in_flight = st.in_flight.saturating_sub(1);
            if let Some(next) = st.waiting.pop_front() {
                st.in_flight += 1;
                st.admitted.push_back(next);
            }
            st.in_flight
        };

        this.publish(|| {
            let ev = match res {
                Ok(_) => Event::new(EventKind::TaskSucceeded),
                Err(TaskError::Failed(_)) => {
                    Event::new(EventKind::TaskFailed).with_reason("task_failed")
                }
                Err(TaskError::Panicked { reason }) => {
                    Event::new(EventKind::TaskPanicked).with_reason(reason.as_str())
                }
                Err(other) => Event::new(EventKind::TaskAbandoned).with_reason(other.as_label()),
            };
            ev.with_task(Arc::clone(name)).with_in_flight(in_flight)
        });

        Self::drain(this);
    }
}

/// Slot held by a dispatched request.
///
/// Released with the task's outcome by the settle watcher. If the watcher is dropped
/// first (its runtime shut down), the slot is released as abandoned.
struct Slot<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    shared: Arc<Shared<T, E>>,
    name: Arc<str>,
    held: bool,
}

impl<T, E> Slot<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn release(mut self, res: &Result<T, TaskError<E>>) {
        self.held = false;
        Shared::release(&self.shared, &self.name, res);
    }
}

impl<T, E> Drop for Slot<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn drop(&mut self) {
        if self.held {
            trace!(task = %self.name, "settle watcher dropped, releasing slot");
            Shared::release(&self.shared, &self.name, &Err(TaskError::Abandoned));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::schedulers::ImmediateScheduler;

    type Log = Arc<Mutex<Vec<usize>>>;

    /// Task that records its index when dispatched and settles when triggered.
    fn gated(
        idx: usize,
        log: &Log,
    ) -> (oneshot::Sender<Result<usize, String>>, Task<usize, String>) {
        let (tx, rx) = oneshot::channel();
        let log = Arc::clone(log);
        let task = Task::named(format!("gated-{idx}"), move || {
            log.lock().unwrap().push(idx);
            async move { rx.await.unwrap_or_else(|_| Err("trigger dropped".into())) }
        });
        (tx, task)
    }

    fn dispatched(log: &Log) -> Vec<usize> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn zero_limit_is_rejected() {
        let res = MaxInFlightScheduler::<(), ()>::new(ImmediateScheduler::new(), 0);
        assert_eq!(res.err(), Some(BuildError::ZeroLimit { purpose: None }));
    }

    #[tokio::test]
    async fn admits_up_to_limit_then_queues() {
        let log = Log::default();
        let sched = MaxInFlightScheduler::new(ImmediateScheduler::new(), 2).unwrap();

        let (t0, task0) = gated(0, &log);
        let (t1, task1) = gated(1, &log);
        let (t2, task2) = gated(2, &log);
        let h0 = sched.schedule(task0);
        let h1 = sched.schedule(task1);
        let h2 = sched.schedule(task2);

        assert_eq!(dispatched(&log), vec![0, 1]);
        assert_eq!(sched.in_flight(), 2);
        assert_eq!(sched.waiting(), 1);

        t0.send(Ok(0)).unwrap();
        assert_eq!(h0.await, Ok(0));
        assert_eq!(dispatched(&log), vec![0, 1, 2]);
        assert_eq!(sched.waiting(), 0);

        t1.send(Ok(1)).unwrap();
        t2.send(Ok(2)).unwrap();
        assert_eq!(h1.await, Ok(1));
        assert_eq!(h2.await, Ok(2));
        assert_eq!(sched.in_flight(), 0);
    }

    #[tokio::test]
    async fn failure_frees_slot_and_is_forwarded() {
        let log = Log::default();
        let sched = MaxInFlightScheduler::new(ImmediateScheduler::new(), 2).unwrap();

        let (t0, task0) = gated(0, &log);
        let (t1, task1) = gated(1, &log);
        let (t2, task2) = gated(2, &log);
        let h0 = sched.schedule(task0);
        let h1 = sched.schedule(task1);
        let h2 = sched.schedule(task2);

        t0.send(Err("500 internal".into())).unwrap();
        assert_eq!(h0.await, Err(TaskError::Failed("500 internal".to_string())));
        assert_eq!(dispatched(&log), vec![0, 1, 2]);

        t1.send(Ok(1)).unwrap();
        t2.send(Ok(2)).unwrap();
        assert_eq!(h1.await, Ok(1));
        assert_eq!(h2.await, Ok(2));
    }

    #[tokio::test]
    async fn panicking_task_frees_slot() {
        let sched = MaxInFlightScheduler::new(ImmediateScheduler::new(), 1).unwrap();

        let boom = sched.schedule(Task::<u8, ()>::new(|| async { panic!("boom") }));
        let next = sched.schedule(Task::<u8, ()>::new(|| async { Ok(9) }));

        assert!(matches!(boom.await, Err(TaskError::Panicked { .. })));
        assert_eq!(next.await, Ok(9));
        assert_eq!(sched.in_flight(), 0);
    }

    #[tokio::test]
    async fn serializes_with_limit_one() {
        let log = Log::default();
        let sched = MaxInFlightScheduler::new(ImmediateScheduler::new(), 1).unwrap();

        let (triggers, handles): (Vec<_>, Vec<_>) = (0..4)
            .map(|i| {
                let (tx, task) = gated(i, &log);
                (tx, sched.schedule(task))
            })
            .unzip();

        assert_eq!(dispatched(&log), vec![0]);
        for (i, (tx, h)) in triggers.into_iter().zip(handles).enumerate() {
            tx.send(Ok(i)).unwrap();
            assert_eq!(h.await, Ok(i));
            assert_eq!(dispatched(&log).len(), (i + 2).min(4));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_limit() {
        let sched = MaxInFlightScheduler::new(ImmediateScheduler::new(), 3).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..12u64)
            .map(|i| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                sched.schedule(Task::<u64, ()>::new(move || async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10 + (i * 7) % 30)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                }))
            })
            .collect();

        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(h.await, Ok(i as u64));
        }
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(sched.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn dispatch_order_is_fifo_across_threads() {
        let log = Log::default();
        let sched = MaxInFlightScheduler::new(ImmediateScheduler::new(), 3).unwrap();

        let handles: Vec<_> = (0..64usize)
            .map(|i| {
                let log = Arc::clone(&log);
                sched.schedule(Task::<usize, ()>::new(move || {
                    log.lock().unwrap().push(i);
                    async move {
                        tokio::task::yield_now().await;
                        Ok(i)
                    }
                }))
            })
            .collect();

        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(dispatched(&log), (0..64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn publishes_admission_events() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let sched = MaxInFlightScheduler::new(ImmediateScheduler::new(), 1)
            .unwrap()
            .with_bus(bus);

        let a = sched.schedule(Task::<(), ()>::named("a", || async { Ok(()) }));
        let b = sched.schedule(Task::<(), ()>::named("b", || async { Err(()) }));
        a.await.unwrap();
        let _ = b.await;

        let mut seen = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            seen.push((ev.kind, ev.task.as_deref().map(str::to_string)));
        }
        assert_eq!(
            seen,
            vec![
                (EventKind::TaskDispatched, Some("a".into())),
                (EventKind::TaskQueued, Some("b".into())),
                (EventKind::TaskSucceeded, Some("a".into())),
                (EventKind::TaskDispatched, Some("b".into())),
                (EventKind::TaskFailed, Some("b".into())),
            ]
        );
    }

    #[test]
    fn runtime_shutdown_releases_slot() {
        let sched = MaxInFlightScheduler::new(ImmediateScheduler::new(), 1).unwrap();

        let first = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let mut stuck = first.block_on(async {
            sched.schedule(Task::<(), ()>::named("stuck", || futures::future::pending()))
        });
        drop(first);

        assert_eq!(sched.in_flight(), 0);
        assert_eq!(stuck.try_result(), Some(Err(TaskError::Abandoned)));

        let second = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let out = second.block_on(async {
            tokio::time::timeout(
                Duration::from_secs(1),
                sched.schedule(Task::<(), ()>::new(|| async { Ok(()) })),
            )
            .await
        });
        assert_eq!(out, Ok(Ok(())));
        assert_eq!(sched.in_flight(), 0);
    }
}
