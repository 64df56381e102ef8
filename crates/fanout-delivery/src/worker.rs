use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use fanout_bus::{DeliveryEvent, TopicConsumer};
use fanout_routing::RouterChain;
use fanout_store::{LockManager, SessionFactory};
use fanout_transport::{RouteReport, TransportRegistry};
use fanout_types::{props, ContentItem};

use crate::error::{DeliveryError, DeliveryResult};
use crate::state::{DeliveryOutcome, DeliveryState};

/// Consumes delivery events and drives each through the delivery stages.
///
/// Cheap to clone: clones share the router chain, transport registry, lock
/// table and session factory.
#[derive(Clone)]
pub struct DeliveryWorker {
    sessions: SessionFactory,
    locks: LockManager,
    chain: Arc<RouterChain>,
    transports: Arc<TransportRegistry>,
    lock_timeout: Duration,
}

impl DeliveryWorker {
    pub fn new(
        sessions: SessionFactory,
        locks: LockManager,
        chain: Arc<RouterChain>,
        transports: Arc<TransportRegistry>,
    ) -> Self {
        Self {
            sessions,
            locks,
            chain,
            transports,
            lock_timeout: fanout_transport::DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Handle one event to a terminal state. Never panics and never
    /// re-publishes; the outcome records what happened.
    pub async fn handle(&self, event: &DeliveryEvent) -> DeliveryOutcome {
        let mut state = DeliveryState::Received;
        let mut reports = Vec::new();
        let result = self.process(event, &mut state, &mut reports).await;

        let (terminal, failed_at, error) = match result {
            Ok(()) => {
                info!(event = %event.id, routes = reports.len(), "delivery done");
                (DeliveryState::Done, None, None)
            }
            Err(e) => {
                if e.is_producer_error() {
                    error!(event = %event.id, stage = %state, error = %e, "dropping event");
                } else {
                    warn!(event = %event.id, stage = %state, error = %e, "delivery failed");
                }
                (DeliveryState::Failed, Some(state), Some(e.to_string()))
            }
        };

        DeliveryOutcome {
            event: event.id,
            item_path: event.item_path().map(str::to_string),
            state: terminal,
            failed_at,
            error,
            reports,
        }
    }

    async fn process(
        &self,
        event: &DeliveryEvent,
        state: &mut DeliveryState,
        reports: &mut Vec<RouteReport>,
    ) -> DeliveryResult<()> {
        let item = self.load(event)?;
        *state = DeliveryState::Validated;

        let table = self.chain.build_routes(&item)?;
        *state = DeliveryState::Routed;
        debug!(event = %event.id, path = item.path(), routes = table.len(), "routes built");

        *state = DeliveryState::Delivering;
        *reports = self.transports.dispatch(&table, &item, event).await;

        let failed = reports.iter().filter(|r| r.outcome.is_failure()).count();
        if failed > 0 {
            return Err(DeliveryError::RoutesFailed {
                failed,
                total: reports.len(),
            });
        }
        self.mark_notified(item.path()).await
    }

    /// Load the event's item and check it names an actor.
    fn load(&self, event: &DeliveryEvent) -> DeliveryResult<ContentItem> {
        let path = event.item_path().ok_or_else(|| DeliveryError::MissingItemPath {
            event: event.id.to_string(),
        })?;
        let store = self.sessions.admin();
        let item = store
            .get(path)?
            .ok_or_else(|| DeliveryError::ItemNotFound(path.to_string()))?;
        if item.string(props::ACTOR).is_none() {
            return Err(DeliveryError::MissingActor {
                path: path.to_string(),
            });
        }
        Ok(item)
    }

    async fn mark_notified(&self, path: &str) -> DeliveryResult<()> {
        let _lock = self.locks.acquire(path, self.lock_timeout).await?;
        let store = self.sessions.admin();
        store.set_property(path, props::SEND_STATE, props::SEND_STATE_NOTIFIED.into())?;
        Ok(())
    }

    /// Handle events from `consumer` until the bus closes.
    pub async fn run(&self, consumer: TopicConsumer) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::new();
        while let Some(event) = consumer.recv().await {
            outcomes.push(self.handle(&event).await);
        }
        debug!(topic = consumer.topic(), handled = outcomes.len(), "worker stopped");
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use fanout_routing::{DedupRouter, GroupExpansionRouter, InMemoryDirectory};
    use fanout_store::{ContentStore, InMemoryContentStore, ShardedPathResolver};
    use fanout_transport::{InternalTransport, RouteOutcome};

    use super::*;

    const FEEDS: &str = "/feeds";
    const TOPIC: &str = "fanout/message/deliver";

    struct Fixture {
        store: Arc<InMemoryContentStore>,
        sessions: SessionFactory,
        worker: DeliveryWorker,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryContentStore::new());
        store.create_node("/messages").unwrap();
        let sessions = SessionFactory::new(store.clone());
        let locks = LockManager::new();

        let directory = InMemoryDirectory::new();
        directory.add_group("g-sitegroup", ["alice", "bob", "carol"]);
        let chain = Arc::new(RouterChain::new());
        chain.register(Arc::new(GroupExpansionRouter::new(Arc::new(directory))));
        chain.register(Arc::new(DedupRouter));

        let transports = Arc::new(TransportRegistry::new());
        transports.register(Arc::new(InternalTransport::new(
            sessions.clone(),
            locks.clone(),
            ShardedPathResolver::default(),
            FEEDS,
        )));

        let worker = DeliveryWorker::new(sessions.clone(), locks, chain, transports)
            .with_lock_timeout(Duration::from_millis(200));
        Fixture {
            store,
            sessions,
            worker,
        }
    }

    fn store_message(store: &InMemoryContentStore, id: &str, to: &str) -> ContentItem {
        let item = ContentItem::new(format!("/messages/{id}"), id)
            .with(props::TO, to)
            .with(props::ACTOR, "dave")
            .with(props::SEND_STATE, props::SEND_STATE_PENDING);
        store.put(&item).unwrap();
        item
    }

    fn feed_path(member: &str, id: &str) -> String {
        format!("{}/{id}", ShardedPathResolver::default().resolve(FEEDS, member))
    }

    // ----------------------------------------------------------------
    // End to end
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn group_message_lands_in_every_member_feed() {
        let f = fixture();
        let item = store_message(&f.store, "m1", "g-sitegroup");
        let outcome = f
            .worker
            .handle(&DeliveryEvent::new(TOPIC, item.path(), "dave"))
            .await;

        assert_eq!(outcome.state, DeliveryState::Done);
        assert_eq!(outcome.delivered_paths().len(), 3);
        for member in ["alice", "bob", "carol"] {
            let copy = f.store.get(&feed_path(member, "m1")).unwrap().unwrap();
            assert_eq!(copy.string(props::PREVIOUS), Some(item.path()));
            assert_eq!(copy.string(props::RECIPIENT), Some(member));
        }

        let original = f.store.get(item.path()).unwrap().unwrap();
        assert_eq!(original.string(props::SEND_STATE), Some(props::SEND_STATE_NOTIFIED));
        assert_eq!(original.long(props::RETRY_COUNT).unwrap(), None);
        assert_eq!(f.sessions.open_sessions(), 0);
        assert_eq!(f.worker.locks().held_count(), 0);
    }

    #[tokio::test]
    async fn redelivery_creates_no_second_copy() {
        let f = fixture();
        let item = store_message(&f.store, "m1", "alice, bob");
        let event = DeliveryEvent::new(TOPIC, item.path(), "dave");
        f.worker.handle(&event).await;
        let size = f.store.len();

        let again = f.worker.handle(&event).await;
        assert!(again.is_done());
        assert!(again
            .reports
            .iter()
            .all(|r| matches!(r.outcome, RouteOutcome::AlreadyDelivered { .. })));
        assert_eq!(f.store.len(), size);
    }

    // ----------------------------------------------------------------
    // Failures
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn missing_actor_fails_at_received() {
        let f = fixture();
        let item = ContentItem::new("/messages/m2", "m2").with(props::TO, "alice");
        f.store.put(&item).unwrap();

        let outcome = f
            .worker
            .handle(&DeliveryEvent::new(TOPIC, item.path(), "dave"))
            .await;
        assert_eq!(outcome.state, DeliveryState::Failed);
        assert_eq!(outcome.failed_at, Some(DeliveryState::Received));
        assert!(outcome.reports.is_empty());
        assert!(!f.store.exists(&feed_path("alice", "m2")).unwrap());
        assert_eq!(f.sessions.open_sessions(), 0);
    }

    #[tokio::test]
    async fn unknown_item_and_no_recipients_fail() {
        let f = fixture();
        let missing = f
            .worker
            .handle(&DeliveryEvent::new(TOPIC, "/messages/nope", "dave"))
            .await;
        assert_eq!(missing.failed_at, Some(DeliveryState::Received));

        let item = store_message(&f.store, "m3", "");
        let outcome = f
            .worker
            .handle(&DeliveryEvent::new(TOPIC, item.path(), "dave"))
            .await;
        assert_eq!(outcome.state, DeliveryState::Failed);
        assert_eq!(outcome.failed_at, Some(DeliveryState::Validated));
    }

    #[tokio::test]
    async fn partial_failure_keeps_item_pending() {
        let f = fixture();
        let item = store_message(&f.store, "m4", "alice, bob");
        let alice_feed = ShardedPathResolver::default().resolve(FEEDS, "alice");
        f.store.fail_writes_under(alice_feed);

        let outcome = f
            .worker
            .handle(&DeliveryEvent::new(TOPIC, item.path(), "dave"))
            .await;
        assert_eq!(outcome.state, DeliveryState::Failed);
        assert_eq!(outcome.failed_at, Some(DeliveryState::Delivering));
        assert_eq!(outcome.failed_routes(), 1);
        assert!(f.store.exists(&feed_path("bob", "m4")).unwrap());

        let original = f.store.get(item.path()).unwrap().unwrap();
        assert_eq!(original.string(props::SEND_STATE), Some(props::SEND_STATE_PENDING));
        assert_eq!(f.sessions.open_sessions(), 0);
    }
}
