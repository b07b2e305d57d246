//! # Per-key action queues.
//!
//! [`KeyedActionQueues`] maps caller-chosen keys to independent [`ActionQueue`]s.
//! Actions under the same key run strictly one after another; different keys never wait
//! on each other.
//!
//! ```text
//!   enqueue("change~1/ps2/line:10", save)  ──► ActionQueue A ──► save, discard
//!   enqueue("change~1/ps2/line:10", discard) ─┘
//!   enqueue("change~1/ps2/line:44", save)  ──► ActionQueue B ──► save      (runs concurrently with A)
//! ```
//!
//! Queues are created lazily on first use and are never destroyed implicitly; an empty
//! queue is a valid resting state. [`KeyedActionQueues::prune`] reclaims idle queues.
//! Deriving the key is up to the caller.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::events::Bus;
use crate::queue::{ActionQueue, ListenerRef};
use crate::tasks::{Scheduled, Task};

struct Registry<K, S> {
    queues: HashMap<K, ActionQueue<S>>,
    listeners: Vec<ListenerRef<S>>,
}

/// Lazily populated set of serial queues, one per key.
pub struct KeyedActionQueues<K, S> {
    registry: Mutex<Registry<K, S>>,
    bus: Option<Bus>,
}

impl<K, S> Default for KeyedActionQueues<K, S>
where
    K: Eq + Hash + Clone + fmt::Display,
    S: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S> KeyedActionQueues<K, S>
where
    K: Eq + Hash + Clone + fmt::Display,
    S: Clone + Send + 'static,
{
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry {
                queues: HashMap::new(),
                listeners: Vec::new(),
            }),
            bus: None,
        }
    }

    /// Queues created from now on publish their events to `bus`.
    pub fn with_bus(mut self, bus: Bus) -> Self {
        self.bus = Some(bus);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Registry<K, S>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the queue for `key`, creating it on first use.
    pub fn queue(&self, key: &K) -> ActionQueue<S> {
        let mut reg = self.lock();
        if let Some(queue) = reg.queues.get(key) {
            return queue.clone();
        }

        let mut queue = ActionQueue::keyed(key.to_string());
        if let Some(bus) = &self.bus {
            queue = queue.with_bus(bus.clone());
        }
        for listener in &reg.listeners {
            queue.add_listener(Arc::clone(listener));
        }
        debug!(%key, "created action queue");
        reg.queues.insert(key.clone(), queue.clone());
        queue
    }

    /// Appends an action to the queue for `key`.
    pub fn enqueue<T, E>(&self, key: &K, task: Task<T, E>, state: S) -> Scheduled<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        self.queue(key).enqueue(task, state)
    }

    /// Resolves when the queue for `key` is empty (immediately for unknown keys).
    ///
    /// The drain to wait for is fixed when this is called, not when the future is polled.
    pub fn await_clear(&self, key: &K) -> impl Future<Output = ()> + Send + 'static {
        let clear = self.lock().queues.get(key).map(ActionQueue::await_clear);
        async move {
            if let Some(clear) = clear {
                clear.await;
            }
        }
    }

    /// Pending actions for `key`, including the running one (0 for unknown keys).
    pub fn len(&self, key: &K) -> usize {
        self.lock().queues.get(key).map_or(0, ActionQueue::len)
    }

    /// Keys that currently have a queue.
    pub fn keys(&self) -> Vec<K> {
        self.lock().queues.keys().cloned().collect()
    }

    /// Attaches `listener` to every existing queue and to every queue created later.
    ///
    /// Returns `false` if the same `Arc` was already attached.
    pub fn add_listener(&self, listener: ListenerRef<S>) -> bool {
        let mut reg = self.lock();
        if reg.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            return false;
        }
        for queue in reg.queues.values() {
            queue.add_listener(Arc::clone(&listener));
        }
        reg.listeners.push(listener);
        true
    }

    /// Drops idle queues that no caller holds a handle to. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let mut reg = self.lock();
        let before = reg.queues.len();
        reg.queues
            .retain(|_, queue| !(queue.is_idle() && queue.handle_count() == 1));
        before - reg.queues.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::FutureExt;
    use tokio::sync::oneshot;

    use super::*;

    #[tokio::test]
    async fn keys_are_independent() {
        let queues = KeyedActionQueues::<String, &'static str>::new();
        let a = "line:10".to_string();
        let b = "line:44".to_string();

        let (tx, rx) = oneshot::channel::<()>();
        let blocked = queues.enqueue(
            &a,
            Task::<(), ()>::new(|| async move {
                let _ = rx.await;
                Ok(())
            }),
            "saving",
        );
        let free = queues.enqueue(&b, Task::<u8, ()>::new(|| async { Ok(1) }), "saving");

        assert_eq!(free.await, Ok(1));
        assert_eq!(queues.len(&a), 1);
        queues.await_clear(&b).await;
        assert_eq!(queues.len(&b), 0);

        tx.send(()).unwrap();
        assert_eq!(blocked.await, Ok(()));
        let mut keys = queues.keys();
        keys.sort();
        assert_eq!(keys, vec![a, b]);
    }

    #[tokio::test]
    async fn same_key_returns_same_queue() {
        let queues = KeyedActionQueues::<u64, ()>::new();
        let first = queues.queue(&7);
        let _pending = first.enqueue(Task::<(), ()>::new(|| futures::future::pending()), ());
        assert_eq!(queues.queue(&7).len(), 1);
        assert_eq!(first.key(), Some("7"));
    }

    #[tokio::test]
    async fn unknown_key_is_clear_and_empty() {
        let queues = KeyedActionQueues::<&'static str, ()>::new();
        queues.await_clear(&"nothing").await;
        assert_eq!(queues.len(&"nothing"), 0);
        assert!(queues.keys().is_empty());
    }

    #[tokio::test]
    async fn await_clear_counts_drain_before_first_poll() {
        let queues = KeyedActionQueues::<&'static str, ()>::new();
        let (tx, rx) = oneshot::channel::<()>();
        let gated = queues.enqueue(
            &"k",
            Task::<(), ()>::new(|| async move {
                let _ = rx.await;
                Ok(())
            }),
            (),
        );
        let clear = queues.await_clear(&"k");

        tx.send(()).unwrap();
        assert_eq!(gated.await, Ok(()));
        while queues.len(&"k") != 0 {
            tokio::task::yield_now().await;
        }
        let _refill = queues.enqueue(&"k", Task::<(), ()>::new(|| futures::future::pending()), ());

        // The drain above already satisfied `clear`; the refill must not hold it back.
        assert!(clear.now_or_never().is_some());
    }

    #[tokio::test]
    async fn listeners_reach_existing_and_new_queues() {
        let queues = KeyedActionQueues::<&'static str, u8>::new();
        let _existing = queues.queue(&"a");

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let listener: ListenerRef<u8> = Arc::new(move |_: &[u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(queues.add_listener(Arc::clone(&listener)));
        assert!(!queues.add_listener(listener));

        for key in ["a", "b"] {
            queues
                .enqueue(&key, Task::<(), ()>::new(|| async { Ok(()) }), 0)
                .await
                .unwrap();
            queues.await_clear(&key).await;
        }
        tokio::task::yield_now().await;

        // Each queue notifies once with the running action and once when it goes idle.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn prune_drops_only_idle_unshared_queues() {
        let queues = KeyedActionQueues::<&'static str, ()>::new();
        queues
            .enqueue(&"done", Task::<(), ()>::new(|| async { Ok(()) }), ())
            .await
            .unwrap();
        queues.await_clear(&"done").await;
        tokio::task::yield_now().await;

        let held = queues.queue(&"held");
        let _busy = queues.enqueue(&"busy", Task::<(), ()>::new(|| futures::future::pending()), ());
        tokio::task::yield_now().await;

        assert_eq!(queues.prune(), 1);
        let mut keys = queues.keys();
        keys.sort();
        assert_eq!(keys, vec!["busy", "held"]);
        drop(held);
        assert_eq!(queues.prune(), 1);
    }
}
