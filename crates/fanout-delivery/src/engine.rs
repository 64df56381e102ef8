use std::sync::Arc;

use tracing::info;

use fanout_bus::{DeliveryEvent, EventBus, EventId, TopicConsumer};
use fanout_routing::{
    DedupRouter, Directory, GroupExpansionRouter, PreferenceRouter, RouterChain, TopicRouter,
};
use fanout_store::{ContentStore, LockManager, SessionFactory, ShardedPathResolver};
use fanout_transport::{InternalTransport, SmtpTransport, TransportRegistry};
use fanout_types::props;

use crate::config::FanoutConfig;
use crate::error::{DeliveryError, DeliveryResult};
use crate::service::DeliveryService;
use crate::worker::DeliveryWorker;

/// Every fanout component, wired from one configuration.
///
/// The chain gets the four stock routers and the registry the `internal`
/// and `smtp` transports. Both stay open for further registration.
pub struct FanoutEngine {
    config: FanoutConfig,
    resolver: ShardedPathResolver,
    sessions: SessionFactory,
    locks: LockManager,
    chain: Arc<RouterChain>,
    transports: Arc<TransportRegistry>,
    bus: Arc<EventBus>,
}

impl FanoutEngine {
    pub fn new(
        config: FanoutConfig,
        store: Arc<dyn ContentStore>,
        directory: Arc<dyn Directory>,
    ) -> DeliveryResult<Self> {
        config.validate()?;
        let resolver = config.shard.resolver()?;
        let sessions = SessionFactory::new(store);
        let locks = LockManager::new();

        let chain = Arc::new(RouterChain::new());
        chain.register(Arc::new(TopicRouter::new(config.topics.clone())));
        chain.register(Arc::new(GroupExpansionRouter::new(Arc::clone(&directory))));
        chain.register(Arc::new(PreferenceRouter::new(directory)));
        chain.register(Arc::new(DedupRouter));

        let transports = Arc::new(TransportRegistry::new());
        transports.register(Arc::new(
            InternalTransport::new(sessions.clone(), locks.clone(), resolver, config.store_root.clone())
                .with_lock_timeout(config.lock_timeout()),
        ));
        transports.register(Arc::new(
            SmtpTransport::new(sessions.clone(), locks.clone(), resolver, config.outbox_root.clone())
                .with_lock_timeout(config.lock_timeout()),
        ));

        let bus = Arc::new(EventBus::with_capacity(config.channel_capacity));
        info!(
            routers = ?chain.router_names(),
            transports = ?transports.transport_types(),
            "fanout engine ready"
        );

        Ok(Self {
            config,
            resolver,
            sessions,
            locks,
            chain,
            transports,
            bus,
        })
    }

    pub fn config(&self) -> &FanoutConfig {
        &self.config
    }

    pub fn chain(&self) -> &Arc<RouterChain> {
        &self.chain
    }

    pub fn transports(&self) -> &Arc<TransportRegistry> {
        &self.transports
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn sessions(&self) -> &SessionFactory {
        &self.sessions
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Path at which `recipient`'s copy of `item_id` is delivered.
    pub fn feed_path(&self, recipient: &str, item_id: &str) -> String {
        fanout_types::path::join(&self.resolver.resolve(&self.config.store_root, recipient), item_id)
    }

    pub fn worker(&self) -> DeliveryWorker {
        DeliveryWorker::new(
            self.sessions.clone(),
            self.locks.clone(),
            Arc::clone(&self.chain),
            Arc::clone(&self.transports),
        )
        .with_lock_timeout(self.config.lock_timeout())
    }

    pub fn service(&self) -> DeliveryService {
        DeliveryService::new(self.worker(), self.config.workers)
    }

    /// Join the consumer group of the configured delivery topic.
    pub fn subscribe(&self) -> DeliveryResult<TopicConsumer> {
        Ok(self.bus.subscribe(&self.config.topic)?)
    }

    /// Publish a delivery trigger for the item at `item_path`.
    ///
    /// Producer mistakes are returned here rather than surfacing later in a
    /// worker: an unknown item, a missing actor, or a `to` with no valid
    /// address fails the call and nothing is published.
    pub async fn publish(&self, item_path: &str, user_id: &str) -> DeliveryResult<EventId> {
        self.check_item(item_path)?;
        let event = DeliveryEvent::new(self.config.topic.clone(), item_path, user_id);
        let id = event.id;
        self.bus.publish(event).await?;
        Ok(id)
    }

    fn check_item(&self, item_path: &str) -> DeliveryResult<()> {
        let store = self.sessions.admin();
        let item = store
            .get(item_path)?
            .ok_or_else(|| DeliveryError::ItemNotFound(item_path.to_string()))?;
        if item.string(props::ACTOR).is_none() {
            return Err(DeliveryError::MissingActor {
                path: item_path.to_string(),
            });
        }
        self.chain.initial_routes(&item)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use fanout_routing::{InMemoryDirectory, Profile, RoutingError};
    use fanout_store::InMemoryContentStore;
    use fanout_transport::RouteOutcome;
    use fanout_types::{ContentItem, Route};

    use super::*;

    fn engine(store: Arc<InMemoryContentStore>) -> FanoutEngine {
        let directory = InMemoryDirectory::new();
        directory.add_group("g-sitegroup", ["alice", "bob"]);
        directory.add_group("g-mods", ["mod1"]);
        directory.add_user("bob", Profile::preferring("smtp").with_address("smtp", "bob@x.org"));

        let mut config = FanoutConfig {
            workers: 2,
            ..FanoutConfig::default()
        };
        config.topics = BTreeMap::from([("discussion".to_string(), vec!["g-mods".to_string()])]);
        FanoutEngine::new(config, store, Arc::new(directory)).unwrap()
    }

    #[test]
    fn wires_routers_and_transports() {
        let e = engine(Arc::new(InMemoryContentStore::new()));
        assert_eq!(
            e.chain().router_names(),
            vec!["topic", "group-expansion", "preference", "dedup"]
        );
        assert_eq!(e.transports().transport_types(), vec!["internal", "smtp"]);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = FanoutConfig {
            workers: 0,
            ..FanoutConfig::default()
        };
        let result = FanoutEngine::new(
            config,
            Arc::new(InMemoryContentStore::new()),
            Arc::new(InMemoryDirectory::new()),
        );
        assert!(result.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn publish_and_run_batch() {
        let store = Arc::new(InMemoryContentStore::new());
        let e = engine(store.clone());
        store.create_node("/messages").unwrap();
        let item = ContentItem::new("/messages/m1", "m1")
            .with(props::TO, "g-sitegroup")
            .with(props::ACTOR, "carol")
            .with(props::TOPIC, "discussion");
        store.put(&item).unwrap();

        let consumer = e.subscribe().unwrap();
        e.publish(item.path(), "carol").await.unwrap();
        e.bus().close();
        let outcomes = e.service().run(consumer).await;

        assert_eq!(outcomes.len(), 1);
        let outcome = &outcomes[0];
        assert!(outcome.is_done(), "{outcome:?}");

        // alice and the expanded moderator get feed copies, bob prefers mail.
        for member in ["alice", "mod1"] {
            let copy = store.get(&e.feed_path(member, "m1")).unwrap().unwrap();
            assert_eq!(copy.string(props::PREVIOUS), Some("/messages/m1"));
        }
        assert!(!store.exists(&e.feed_path("bob", "m1")).unwrap());
        let mail = outcome
            .reports
            .iter()
            .find(|r| r.route == Route::new("smtp", "bob@x.org"))
            .unwrap();
        assert!(matches!(mail.outcome, RouteOutcome::Delivered { .. }));
    }

    #[tokio::test]
    async fn publish_rejects_bad_producer_input() {
        let store = Arc::new(InMemoryContentStore::new());
        let e = engine(store.clone());
        store.create_node("/messages").unwrap();
        store
            .put(
                &ContentItem::new("/messages/m1", "m1")
                    .with(props::TO, "smtp:, ,")
                    .with(props::ACTOR, "carol"),
            )
            .unwrap();
        store
            .put(&ContentItem::new("/messages/m2", "m2").with(props::TO, "alice"))
            .unwrap();

        let err = e.publish("/messages/m1", "carol").await.unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::Routing(RoutingError::NoRecipients { ref path }) if path == "/messages/m1"
        ));
        assert!(matches!(
            e.publish("/messages/nope", "carol").await,
            Err(DeliveryError::ItemNotFound(_))
        ));
        assert!(matches!(
            e.publish("/messages/m2", "carol").await,
            Err(DeliveryError::MissingActor { .. })
        ));

        assert_eq!(e.bus().events_published(), 0);
        assert_eq!(e.bus().pending(&e.config().topic), 0);
        assert_eq!(e.sessions().open_sessions(), 0);
    }
}
