//! # Serial action queue.
//!
//! [`ActionQueue`] runs submitted actions one at a time, strictly in submission order.
//! Each action carries an opaque caller state `S` that listeners can inspect while the
//! action waits or runs.
//!
//! ## Driver
//! ```text
//! enqueue(action, state) ──► items.push_back ──► (idle?) spawn driver
//!
//! driver loop {
//!   ├─► notify listeners with snapshot of states (head = running)
//!   ├─► empty?  ──► go idle, exit
//!   ├─► run head action (head stays visible while it runs)
//!   ├─► settle caller's handle
//!   └─► pop head (drain signal fires when this empties the queue)
//! }
//! ```
//!
//! ## Rules
//! - At most one driver per queue; at most one action running.
//! - A failing or panicking action still gives up its position; the queue moves on.
//! - If the driver's runtime shuts down, every pending action resolves to
//!   [`TaskError::Abandoned`] and the queue counts as drained. A later `enqueue` starts over.
//! - [`ActionQueue::await_clear`] resolves right away when the queue is empty,
//!   otherwise at the next transition to empty. The drain counter is bumped under the
//!   queue lock, so a waiter can never miss a drain or see one that happened before it asked.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{TaskError, panic_reason};
use crate::events::{Bus, Event, EventKind};
use crate::queue::QueueListener;
use crate::tasks::{Scheduled, Task};

/// Type-erased action: runs the task and settles the caller's handle.
type Action = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + 'static>;

/// Shared listener handle.
pub type ListenerRef<S> = Arc<dyn QueueListener<S>>;

struct Item<S> {
    name: Arc<str>,
    state: S,
    /// Taken by the driver when the item starts running.
    action: Option<Action>,
}

struct QueueState<S> {
    items: VecDeque<Item<S>>,
    listeners: Vec<ListenerRef<S>>,
    /// True while a driver task owns the queue.
    running: bool,
}

struct Inner<S> {
    key: Option<Arc<str>>,
    state: Mutex<QueueState<S>>,
    /// Number of times the queue has drained.
    drained: watch::Sender<u64>,
    bus: OnceLock<Bus>,
}

/// Queue that executes its actions sequentially.
///
/// Cloning gives another handle to the same queue.
///
/// # Example
/// ```
/// use inflight::{ActionQueue, Task};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = ActionQueue::new();
/// let save = queue.enqueue(Task::<_, String>::named("save", || async { Ok(201) }), "draft-1");
/// let discard = queue.enqueue(Task::<_, String>::named("discard", || async { Ok(204) }), "draft-1");
/// assert_eq!(queue.len(), 2);
///
/// queue.await_clear().await;
/// assert_eq!(save.await, Ok(201));
/// assert_eq!(discard.await, Ok(204));
/// # }
/// ```
pub struct ActionQueue<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for ActionQueue<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> Default for ActionQueue<S>
where
    S: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ActionQueue<S>
where
    S: Clone + Send + 'static,
{
    /// Creates an empty, unkeyed queue.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates an empty queue labelled with `key` in events and logs.
    pub fn keyed(key: impl Into<Arc<str>>) -> Self {
        Self::build(Some(key.into()))
    }

    fn build(key: Option<Arc<str>>) -> Self {
        let (drained, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                key,
                state: Mutex::new(QueueState {
                    items: VecDeque::new(),
                    listeners: Vec::new(),
                    running: false,
                }),
                drained,
                bus: OnceLock::new(),
            }),
        }
    }

    /// Publishes queue events to `bus`. Only the first bus set is kept.
    pub fn with_bus(self, bus: Bus) -> Self {
        let _ = self.inner.bus.set(bus);
        self
    }

    /// Appends an action with its caller state and returns a handle to its outcome.
    ///
    /// The action starts once every action enqueued before it has settled.
    /// Must be called from within a Tokio runtime; otherwise the handle resolves to
    /// [`TaskError::NoRuntime`] and nothing is queued.
    pub fn enqueue<T, E>(&self, task: Task<T, E>, state: S) -> Scheduled<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        let Ok(rt) = Handle::try_current() else {
            return Scheduled::ready(Err(TaskError::NoRuntime));
        };

        let (settle, handle) = Scheduled::channel();
        let name: Arc<str> = Arc::from(task.name());
        let action: Action = Box::new(move || -> BoxFuture<'static, ()> {
            let fut = task.start_caught();
            Box::pin(async move {
                let _ = settle.send(fut.await);
            })
        });

        let spawn_driver = {
            let mut st = self.inner.lock();
            st.items.push_back(Item {
                name,
                state,
                action: Some(action),
            });
            !std::mem::replace(&mut st.running, true)
        };

        if spawn_driver {
            rt.spawn(Inner::drive(Driver {
                inner: Arc::clone(&self.inner),
                finished: false,
            }));
        }
        handle
    }

    /// Returns a future that resolves when the queue is empty.
    ///
    /// - Queue empty now → resolves immediately.
    /// - Otherwise → resolves at the next transition from non-empty to empty.
    ///
    /// The state is captured when this method is called, not when the future is polled.
    pub fn await_clear(&self) -> impl Future<Output = ()> + Send + 'static + use<S> {
        let (mut rx, target) = {
            let st = self.inner.lock();
            let rx = self.inner.drained.subscribe();
            let target = (!st.items.is_empty()).then(|| *rx.borrow() + 1);
            (rx, target)
        };

        async move {
            if let Some(target) = target {
                let _ = rx.wait_for(|drains| *drains >= target).await;
            }
        }
    }

    /// Registers a listener called on every driver step.
    ///
    /// Returns `false` (and changes nothing) if the same `Arc` is already registered.
    pub fn add_listener(&self, listener: ListenerRef<S>) -> bool {
        let mut st = self.inner.lock();
        if st.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        st.listeners.push(listener);
        true
    }

    /// Unregisters a listener previously passed to [`add_listener`](Self::add_listener).
    pub fn remove_listener(&self, listener: &ListenerRef<S>) -> bool {
        let mut st = self.inner.lock();
        let before = st.listeners.len();
        st.listeners.retain(|l| !Arc::ptr_eq(l, listener));
        st.listeners.len() != before
    }

    /// States of all pending actions, the running one first.
    pub fn states(&self) -> Vec<S> {
        self.inner.lock().items.iter().map(|i| i.state.clone()).collect()
    }
}

impl<S> ActionQueue<S> {
    /// Number of pending actions, including the one currently running.
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// True when nothing is pending and no driver is active.
    pub fn is_idle(&self) -> bool {
        let st = self.inner.lock();
        st.items.is_empty() && !st.running
    }

    /// Key the queue was created with, if any.
    pub fn key(&self) -> Option<&str> {
        self.inner.key.as_deref()
    }

    /// Number of handles (including running drivers) sharing this queue.
    pub(crate) fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl<S> Inner<S> {
    fn lock(&self) -> MutexGuard<'_, QueueState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, ev: impl FnOnce() -> Event) {
        if let Some(bus) = self.bus.get() {
            bus.publish(ev().with_key_opt(self.key.as_ref()));
        }
    }
}

impl<S> Inner<S>
where
    S: Clone + Send + 'static,
{
    async fn drive(mut driver: Driver<S>) {
        let this = &driver.inner;
        loop {
            let (listeners, snapshot, head) = {
                let mut st = this.lock();
                let snapshot: Vec<S> = st.items.iter().map(|i| i.state.clone()).collect();
                let head = st
                    .items
                    .front_mut()
                    .map(|item| (Arc::clone(&item.name), item.action.take()));
                (st.listeners.clone(), snapshot, head)
            };
            this.notify(&listeners, &snapshot);

            let Some((name, action)) = head else {
                // A listener may have enqueued more work during notification.
                let mut st = this.lock();
                if st.items.is_empty() {
                    st.running = false;
                    driver.finished = true;
                    return;
                }
                continue;
            };

            debug!(key = ?this.key, action = %name, pending = snapshot.len(), "starting queued action");
            this.publish(|| {
                Event::new(EventKind::ActionStarted)
                    .with_task(Arc::clone(&name))
                    .with_waiting(snapshot.len())
            });
            drop(snapshot);

            if let Some(action) = action {
                action().await;
            }

            let drained = {
                let mut st = this.lock();
                st.items.pop_front();
                let drained = st.items.is_empty();
                if drained {
                    this.drained.send_modify(|n| *n += 1);
                }
                drained
            };
            if drained {
                debug!(key = ?this.key, "action queue drained");
                this.publish(|| Event::new(EventKind::QueueDrained));
            }
        }
    }

    fn notify(&self, listeners: &[ListenerRef<S>], snapshot: &[S]) {
        for listener in listeners {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.on_change(snapshot))) {
                let reason = panic_reason(payload.as_ref());
                warn!(key = ?self.key, listener = listener.name(), %reason, "queue listener panicked");
                self.publish(|| {
                    Event::new(EventKind::ListenerPanicked)
                        .with_task(listener.name())
                        .with_reason(reason)
                });
            }
        }
    }
}

/// The driver role of one queue, owned by the spawned driver task.
///
/// Dropped before the queue went idle (its runtime shut down), it abandons every pending
/// action and counts that as a drain. The next `enqueue` then starts a fresh driver.
struct Driver<S> {
    inner: Arc<Inner<S>>,
    finished: bool,
}

impl<S> Drop for Driver<S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let abandoned = {
            let mut st = self.inner.lock();
            st.running = false;
            let items = std::mem::take(&mut st.items);
            if !items.is_empty() {
                self.inner.drained.send_modify(|n| *n += 1);
            }
            items
        };
        // Actions are dropped outside the lock; that settles their handles as abandoned.
        if !abandoned.is_empty() {
            warn!(key = ?self.inner.key, abandoned = abandoned.len(), "queue driver stopped before draining");
            self.inner.publish(|| Event::new(EventKind::QueueDrained));
        }
    }
}
