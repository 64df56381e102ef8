use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{BusError, BusResult};
use crate::event::DeliveryEvent;
use crate::DEFAULT_CHANNEL_CAPACITY;

/// Receiving half of a topic, shared by every consumer of that topic.
type SharedReceiver = Arc<Mutex<mpsc::Receiver<DeliveryEvent>>>;

/// One topic: a bounded channel whose receiver is shared by the topic's
/// consumer group. `sender` is `None` once the bus is closed.
struct Topic {
    sender: Option<mpsc::Sender<DeliveryEvent>>,
    receiver: SharedReceiver,
}

/// In-process publish/subscribe bus with one bounded channel per topic.
///
/// Topics are created on first use by either side, so events published
/// before any consumer subscribes are buffered rather than lost. All
/// consumers of a topic form one group: each event is received by exactly
/// one of them.
///
/// Closing the bus stops new publishes; consumers drain what is buffered
/// and then see the end of the stream.
pub struct EventBus {
    topics: RwLock<HashMap<String, Topic>>,
    capacity: usize,
    published: AtomicU64,
    closed: AtomicBool,
}

impl EventBus {
    /// Create a bus with the default per-topic capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus whose topics buffer at most `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            published: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events accepted by the bus.
    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Publish an event on its topic, waiting for room if the topic is full.
    pub async fn publish(&self, event: DeliveryEvent) -> BusResult<()> {
        let (sender, _) = self.topic(&event.topic)?;
        let sender = sender.ok_or(BusError::Closed)?;
        let id = event.id;
        let topic = event.topic.clone();
        sender.send(event).await.map_err(|_| BusError::Closed)?;
        self.published.fetch_add(1, Ordering::Relaxed);
        debug!(%id, topic = %topic, "event published");
        Ok(())
    }

    /// Publish without waiting; fails with [`BusError::Full`] if the topic
    /// has no room.
    pub fn try_publish(&self, event: DeliveryEvent) -> BusResult<()> {
        let (sender, _) = self.topic(&event.topic)?;
        let sender = sender.ok_or(BusError::Closed)?;
        let topic = event.topic.clone();
        match sender.try_send(event) {
            Ok(()) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(id = %event.id, topic = %topic, "topic full; event rejected");
                Err(BusError::Full { topic })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(BusError::Closed),
        }
    }

    /// Join the consumer group of `topic`.
    pub fn subscribe(&self, topic: &str) -> BusResult<TopicConsumer> {
        let (_, receiver) = self.topic(topic)?;
        debug!(topic, "consumer subscribed");
        Ok(TopicConsumer {
            topic: topic.to_string(),
            receiver,
        })
    }

    /// Stop accepting events. Buffered events are still delivered.
    pub fn close(&self) {
        let mut topics = self.topics.write().unwrap_or_else(|p| p.into_inner());
        self.closed.store(true, Ordering::SeqCst);
        for topic in topics.values_mut() {
            topic.sender = None;
        }
        info!(topics = topics.len(), "event bus closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Events buffered on `topic` and not yet received.
    pub fn pending(&self, topic: &str) -> usize {
        let topics = self.topics.read().unwrap_or_else(|p| p.into_inner());
        topics
            .get(topic)
            .and_then(|t| t.sender.as_ref())
            .map(|s| s.max_capacity() - s.capacity())
            .unwrap_or(0)
    }

    /// Sender and shared receiver for `topic`, creating it on first use.
    fn topic(&self, name: &str) -> BusResult<(Option<mpsc::Sender<DeliveryEvent>>, SharedReceiver)> {
        {
            let topics = self.topics.read().unwrap_or_else(|p| p.into_inner());
            if let Some(topic) = topics.get(name) {
                return Ok((topic.sender.clone(), Arc::clone(&topic.receiver)));
            }
        }
        let mut topics = self.topics.write().unwrap_or_else(|p| p.into_inner());
        let closed = self.closed.load(Ordering::SeqCst);
        let topic = topics.entry(name.to_string()).or_insert_with(|| {
            let (tx, rx) = mpsc::channel(self.capacity);
            Topic {
                sender: (!closed).then_some(tx),
                receiver: Arc::new(Mutex::new(rx)),
            }
        });
        Ok((topic.sender.clone(), Arc::clone(&topic.receiver)))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("events_published", &self.events_published())
            .finish()
    }
}

/// A member of a topic's consumer group.
///
/// Clones share the same group: an event received by one clone is never
/// seen by another.
#[derive(Clone)]
pub struct TopicConsumer {
    topic: String,
    receiver: SharedReceiver,
}

impl TopicConsumer {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next event. Returns `None` once the bus is closed and
    /// the topic is drained.
    pub async fn recv(&self) -> Option<DeliveryEvent> {
        self.receiver.lock().await.recv().await
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&self) -> Option<DeliveryEvent> {
        let mut receiver = self.receiver.try_lock().ok()?;
        receiver.try_recv().ok()
    }
}

impl std::fmt::Debug for TopicConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicConsumer")
            .field("topic", &self.topic)
            .finish()
    }
}
