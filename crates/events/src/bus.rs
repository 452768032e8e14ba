//! Observer-registry pub/sub (mechanics only).
//!
//! The bus is an explicit mapping from subscriber id to callback. `emit`
//! iterates a defensive copy of the registry, so a subscriber may
//! unsubscribe itself (or others) mid-delivery without poisoning the walk.
//!
//! Delivery guarantees:
//! - **Synchronous**: `emit` returns after every callback has run.
//! - **Ordered**: callbacks run in subscription order, one event at a time.
//! - **Isolated**: a panicking subscriber is caught and logged; the
//!   remaining subscribers still receive the event.
//!
//! The bus is for distribution, not storage - the audit log is the durable
//! record, and events are emitted only after it has been appended.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

/// Opaque handle identifying one subscription on a bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Callback<M> = Arc<dyn Fn(&M) + Send + Sync + 'static>;

/// In-process observer registry.
///
/// Generic over the message type so tests can drive it with plain values;
/// the ledger instantiates it with [`crate::LedgerEvent`].
pub struct ObserverBus<M> {
    subscribers: Mutex<Vec<(SubscriberId, Callback<M>)>>,
    next_id: AtomicU64,
}

impl<M> core::fmt::Debug for ObserverBus<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObserverBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<M> ObserverBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback; returns the handle needed to unsubscribe.
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&M) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((id, Arc::new(callback)));
        }
        id
    }

    /// Remove a subscription. Returns false if the id was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        match self.subscribers.lock() {
            Ok(mut subs) => {
                let before = subs.len();
                subs.retain(|(sub_id, _)| *sub_id != id);
                subs.len() != before
            }
            Err(_) => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Deliver `message` to every currently-subscribed callback.
    ///
    /// Iterates a snapshot of the registry taken before delivery starts;
    /// subscriptions added during delivery see the next event.
    pub fn emit(&self, message: &M) {
        let snapshot: Vec<(SubscriberId, Callback<M>)> = match self.subscribers.lock() {
            Ok(subs) => subs.clone(),
            Err(_) => return,
        };

        for (id, callback) in snapshot {
            let delivery = catch_unwind(AssertUnwindSafe(|| callback(message)));
            if delivery.is_err() {
                warn!(subscriber = id.0, "subscriber panicked during delivery; continuing");
            }
        }
    }
}

impl<M> Default for ObserverBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}
