//! Live subscriber membership.
//!
//! Every `WebSocket` connection registers one subscriber. A subscriber is a
//! bounded outbound queue plus a liveness flag; the connection's own writer
//! task drains the queue, so one slow socket never stalls the tick loop or
//! its peers.
//!
//! Membership is guarded by a [`std::sync::RwLock`] that is only held to
//! copy or edit the member map, never across I/O. [`members`] hands the
//! broadcaster a stable copy taken at call time, so connections arriving
//! or leaving mid-broadcast are safe.
//!
//! [`members`]: ConnectionRegistry::members

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use axum::extract::ws::Utf8Bytes;
use groundlink_types::SubscriberId;
use tokio::sync::mpsc;

/// Default capacity of each subscriber's outbound queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Connection state of one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Accepting snapshots.
    Connected,
    /// The client started closing; no further snapshots are queued.
    Closing,
}

#[derive(Debug, Default)]
struct LivenessFlag {
    closing: AtomicBool,
}

impl LivenessFlag {
    fn get(&self) -> Liveness {
        if self.closing.load(Ordering::Acquire) {
            Liveness::Closing
        } else {
            Liveness::Connected
        }
    }
}

/// One registered subscriber as seen by the broadcaster.
#[derive(Debug, Clone)]
pub struct Member {
    id: SubscriberId,
    tx: mpsc::Sender<Utf8Bytes>,
    liveness: Arc<LivenessFlag>,
}

impl Member {
    /// Subscriber id.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Current liveness.
    pub fn liveness(&self) -> Liveness {
        self.liveness.get()
    }

    /// Queue `payload` without waiting.
    ///
    /// # Errors
    ///
    /// Returns the queue error if the queue is full or its receiver is gone.
    pub fn try_send(&self, payload: Utf8Bytes) -> Result<(), mpsc::error::TrySendError<Utf8Bytes>> {
        self.tx.try_send(payload)
    }
}

/// The connection-side end of a registration.
#[derive(Debug)]
pub struct SubscriberHandle {
    id: SubscriberId,
    rx: mpsc::Receiver<Utf8Bytes>,
    liveness: Arc<LivenessFlag>,
}

impl SubscriberHandle {
    /// Subscriber id.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued payload. `None` once the subscriber has been removed
    /// from the registry and the queue is drained.
    pub async fn recv(&mut self) -> Option<Utf8Bytes> {
        self.rx.recv().await
    }

    /// Mark the subscriber as closing. The broadcaster drops it on its next
    /// pass.
    pub fn mark_closing(&self) {
        self.liveness.closing.store(true, Ordering::Release);
    }

    /// Current liveness.
    pub fn liveness(&self) -> Liveness {
        self.liveness.get()
    }
}

/// The set of live subscribers.
#[derive(Debug)]
pub struct ConnectionRegistry {
    members: RwLock<BTreeMap<SubscriberId, Member>>,
    queue_capacity: usize,
}

impl ConnectionRegistry {
    /// Create an empty registry whose subscribers buffer up to
    /// `queue_capacity` snapshots each.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            members: RwLock::new(BTreeMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new subscriber.
    pub fn add(&self) -> SubscriberHandle {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let liveness = Arc::new(LivenessFlag::default());
        let member = Member {
            id,
            tx,
            liveness: Arc::clone(&liveness),
        };
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, member);
        SubscriberHandle { id, rx, liveness }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    ///
    /// Dropping the member closes its queue, which ends the connection's
    /// writer once it has drained what was already queued.
    pub fn remove(&self, id: SubscriberId) -> bool {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Remove every subscriber. Returns how many were registered.
    pub fn clear(&self) -> usize {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        let count = members.len();
        members.clear();
        count
    }

    /// Copy of the membership at call time.
    pub fn members(&self) -> Vec<Member> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
