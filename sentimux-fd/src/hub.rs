//! Broadcast hub
//!
//! Fans each published event out to every active subscriber. Each subscriber
//! owns a bounded outbound queue with drop-oldest overflow and a monotonic
//! dropped-event counter, so the publisher never blocks on a slow consumer.
//! The subscriber list lock is held only long enough to copy the list; actual
//! delivery happens without it.
//!
//! Subscriber lifecycle: `Connecting -> Active -> Draining -> Closed`.
//! A send failure moves the subscriber to Draining; one retry is attempted,
//! and on a second failure the subscriber is Closed and removed. Closed is
//! terminal.

use sentimux_common::events::SentimentEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{debug, trace, warn};
use uuid::Uuid;

/// Default per-subscriber outbound queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Subscriber lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Handle created, not yet registered
    Connecting,
    /// Registered and receiving events
    Active,
    /// A send failed; one retry pending
    Draining,
    /// Terminal; removed from the active set
    Closed,
}

/// Bounded drop-oldest event queue shared by hub (producer) and handle (consumer)
struct SubscriberQueue {
    events: Mutex<VecDeque<SentimentEvent>>,
    capacity: usize,
    /// Monotonically increasing count of events dropped on overflow
    dropped: AtomicU64,
    closed: AtomicBool,
    notify: Notify,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Enqueue, dropping the oldest entry on overflow; never blocks
    fn push(&self, event: SentimentEvent) -> Result<(), ()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(());
        }
        {
            let mut events = self.events.lock().unwrap();
            events.push_back(event);
            while events.len() > self.capacity {
                events.pop_front();
                let count = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if count % 100 == 0 {
                    warn!("Subscriber queue overflow (total dropped: {})", count);
                }
            }
        }
        self.notify.notify_one();
        Ok(())
    }

    fn pop(&self) -> Option<SentimentEvent> {
        self.events.lock().unwrap().pop_front()
    }

    /// Close and discard pending events; idempotent
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.events.lock().unwrap().clear();
        self.notify.notify_waiters();
    }
}

/// Consumer handle returned by [`SentimentHub::subscribe`]
///
/// Dropping the handle closes the queue; the hub evicts the subscriber on the
/// next delivery attempt.
pub struct Subscriber {
    id: Uuid,
    queue: Arc<SubscriberQueue>,
}

impl Subscriber {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Receive the next event in publish order
    ///
    /// Returns None once the subscriber is closed and its queue drained.
    pub async fn recv(&self) -> Option<SentimentEvent> {
        loop {
            // Arm the notification before checking, so a push between the
            // check and the await still wakes us.
            let notified = self.queue.notify.notified();
            if let Some(event) = self.queue.pop() {
                return Some(event);
            }
            if self.queue.closed.load(Ordering::Acquire) {
                return None;
            }
            notified.await;
        }
    }

    /// Non-blocking receive
    pub fn try_recv(&self) -> Option<SentimentEvent> {
        self.queue.pop()
    }

    /// Events dropped from this subscriber's queue due to overflow
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }

    /// Whether the hub (or a drop of this handle) has closed the queue
    pub fn is_closed(&self) -> bool {
        self.queue.closed.load(Ordering::Acquire)
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.queue.close();
    }
}

struct SubscriberEntry {
    id: Uuid,
    state: SubscriberState,
    queue: Arc<SubscriberQueue>,
}

/// Hub statistics
#[derive(Debug, Clone, Copy)]
pub struct HubStats {
    /// Currently registered subscribers
    pub active_subscribers: usize,
    /// Events dropped across current subscriber queues
    pub dropped_events: u64,
    /// Subscribers evicted after delivery failure
    pub evicted_total: u64,
}

/// Multi-subscriber broadcaster
pub struct SentimentHub {
    subscribers: Mutex<Vec<SubscriberEntry>>,
    queue_capacity: usize,
    evicted_total: AtomicU64,
}

impl SentimentHub {
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            queue_capacity: queue_capacity.max(1),
            evicted_total: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber and return its consumer handle
    pub fn subscribe(&self) -> Subscriber {
        let queue = Arc::new(SubscriberQueue::new(self.queue_capacity));
        let mut entry = SubscriberEntry {
            id: Uuid::new_v4(),
            state: SubscriberState::Connecting,
            queue: Arc::clone(&queue),
        };

        // Registration is the Connecting -> Active transition
        entry.state = SubscriberState::Active;
        let id = entry.id;
        self.subscribers.lock().unwrap().push(entry);
        debug!("Subscriber {} registered", id);

        Subscriber { id, queue }
    }

    /// Fan an event out to every active subscriber
    ///
    /// The subscriber list is copied under a brief lock; delivery happens
    /// without it. A failed send gets exactly one retry before the
    /// subscriber is evicted. Never blocks on a slow subscriber.
    pub fn publish(&self, event: &SentimentEvent) {
        let targets: Vec<(Uuid, Arc<SubscriberQueue>)> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers
                .iter()
                .filter(|e| e.state == SubscriberState::Active)
                .map(|e| (e.id, Arc::clone(&e.queue)))
                .collect()
        };

        let mut failed: Vec<Uuid> = Vec::new();
        for (id, queue) in &targets {
            if queue.push(event.clone()).is_err() {
                failed.push(*id);
            }
        }

        for id in failed {
            self.retry_or_evict(id, event);
        }
    }

    /// One retry while Draining, then Closed and removed
    fn retry_or_evict(&self, id: Uuid, event: &SentimentEvent) {
        let queue = {
            let mut subscribers = self.subscribers.lock().unwrap();
            match subscribers.iter_mut().find(|e| e.id == id) {
                Some(entry) => {
                    entry.state = SubscriberState::Draining;
                    Arc::clone(&entry.queue)
                }
                // Already evicted by a concurrent publisher
                None => return,
            }
        };

        if queue.push(event.clone()).is_ok() {
            // Delivery recovered; re-activate
            let mut subscribers = self.subscribers.lock().unwrap();
            if let Some(entry) = subscribers.iter_mut().find(|e| e.id == id) {
                entry.state = SubscriberState::Active;
            }
            return;
        }

        let mut subscribers = self.subscribers.lock().unwrap();
        if let Some(pos) = subscribers.iter().position(|e| e.id == id) {
            subscribers[pos].state = SubscriberState::Closed;
            subscribers[pos].queue.close();
            subscribers.remove(pos);
            self.evicted_total.fetch_add(1, Ordering::Relaxed);
            debug!("Subscriber {} evicted after failed retry", id);
        }
    }

    /// Remove a subscriber; pending and future sends are cancelled
    ///
    /// Idempotent: unknown or already-evicted ids are a no-op.
    pub fn unsubscribe(&self, id: Uuid) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if let Some(pos) = subscribers.iter().position(|e| e.id == id) {
            subscribers[pos].state = SubscriberState::Closed;
            subscribers[pos].queue.close();
            subscribers.remove(pos);
            trace!("Subscriber {} unsubscribed", id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn stats(&self) -> HubStats {
        let subscribers = self.subscribers.lock().unwrap();
        HubStats {
            active_subscribers: subscribers.len(),
            dropped_events: subscribers
                .iter()
                .map(|e| e.queue.dropped.load(Ordering::Relaxed))
                .sum(),
            evicted_total: self.evicted_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for SentimentHub {
    fn default() -> Self {
        Self::new()
    }
}
