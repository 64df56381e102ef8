use tokio::task::JoinSet;
use tracing::{info, warn};

use fanout_bus::TopicConsumer;

use crate::state::DeliveryOutcome;
use crate::worker::DeliveryWorker;

/// A pool of delivery workers sharing one topic consumer.
///
/// Every worker pulls from the same consumer group, so each event is
/// handled by exactly one of them while different events proceed in
/// parallel. [`DeliveryService::run`] is a batch run: it returns when the
/// bus is closed and drained, then releases every lock still recorded.
pub struct DeliveryService {
    worker: DeliveryWorker,
    workers: usize,
}

impl DeliveryService {
    pub fn new(worker: DeliveryWorker, workers: usize) -> Self {
        Self {
            worker,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run the pool until `consumer`'s bus closes. Outcomes are returned in
    /// no particular order.
    pub async fn run(&self, consumer: TopicConsumer) -> Vec<DeliveryOutcome> {
        info!(workers = self.workers, topic = consumer.topic(), "delivery service started");

        let mut tasks = JoinSet::new();
        for _ in 0..self.workers {
            let worker = self.worker.clone();
            let consumer = consumer.clone();
            tasks.spawn(async move { worker.run(consumer).await });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(batch) => outcomes.extend(batch),
                Err(e) => warn!(error = %e, "delivery worker aborted"),
            }
        }

        let cleared = self.worker.locks().clear_all();
        let failed = outcomes.iter().filter(|o| !o.is_done()).count();
        info!(
            handled = outcomes.len(),
            failed,
            locks_cleared = cleared,
            "delivery service stopped"
        );
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use fanout_bus::{DeliveryEvent, EventBus};
    use fanout_routing::RouterChain;
    use fanout_store::{ContentStore, InMemoryContentStore, LockManager, SessionFactory, ShardedPathResolver};
    use fanout_transport::{InternalTransport, TransportRegistry};
    use fanout_types::{props, ContentItem};

    use super::*;
    use crate::state::DeliveryState;

    const TOPIC: &str = "fanout/message/deliver";

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pool_handles_each_event_once_and_clears_locks() {
        let store = Arc::new(InMemoryContentStore::new());
        store.create_node("/messages").unwrap();
        let sessions = SessionFactory::new(store.clone());
        let locks = LockManager::new();
        let transports = Arc::new(TransportRegistry::new());
        transports.register(Arc::new(InternalTransport::new(
            sessions.clone(),
            locks.clone(),
            ShardedPathResolver::default(),
            "/feeds",
        )));
        let worker = DeliveryWorker::new(sessions.clone(), locks.clone(), Arc::new(RouterChain::new()), transports);
        let service = DeliveryService::new(worker, 3);

        let bus = EventBus::with_capacity(4);
        let consumer = bus.subscribe(TOPIC).unwrap();
        let run = tokio::spawn(async move { service.run(consumer).await });

        for n in 0..20 {
            let id = format!("m{n}");
            let item = ContentItem::new(format!("/messages/{id}"), id.as_str())
                .with(props::TO, "alice, bob")
                .with(props::ACTOR, "carol");
            store.put(&item).unwrap();
            bus.publish(DeliveryEvent::new(TOPIC, item.path(), "carol")).await.unwrap();
        }
        // A stale lock left behind by some earlier run.
        let _stale = locks.try_acquire("/stale").unwrap().unwrap();
        bus.close();

        let outcomes = run.await.unwrap();
        assert_eq!(outcomes.len(), 20);
        assert!(outcomes.iter().all(|o| o.state == DeliveryState::Done));
        let events: HashSet<_> = outcomes.iter().map(|o| o.event).collect();
        assert_eq!(events.len(), 20);
        assert_eq!(locks.held_count(), 0);
        assert_eq!(sessions.open_sessions(), 0);
    }

    #[test]
    fn at_least_one_worker() {
        let sessions = SessionFactory::new(Arc::new(InMemoryContentStore::new()));
        let worker = DeliveryWorker::new(
            sessions,
            LockManager::new(),
            Arc::new(RouterChain::new()),
            Arc::new(TransportRegistry::new()),
        );
        assert_eq!(DeliveryService::new(worker, 0).workers(), 1);
    }
}
