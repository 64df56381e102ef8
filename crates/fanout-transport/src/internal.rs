use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use fanout_bus::DeliveryEvent;
use fanout_store::{LockManager, SessionFactory, ShardedPathResolver};
use fanout_types::{path, props, ContentItem, Route, DEFAULT_TRANSPORT};

use crate::error::TransportResult;
use crate::placement::{check_segment, Placed, Placement};
use crate::transport::{RouteOutcome, RouteReport, Transport};
use crate::DEFAULT_LOCK_TIMEOUT;

/// Delivers items into recipients' feeds inside the store.
///
/// Each recipient owns a feed directory at
/// `<feeds_root>/<shard(recipient)>`. Delivering item `m1` to `alice` writes
/// a copy at `<feeds_root>/<shard(alice)>/m1` carrying:
///
/// - `fanout:previous`: the store-of-record path
/// - `fanout:messagebox`: `inbox`
/// - `fanout:read`: `false`
/// - `fanout:recipient`: the recipient id
///
/// A recipient that already holds the copy is skipped.
pub struct InternalTransport {
    feeds_root: String,
    resolver: ShardedPathResolver,
    placement: Placement,
}

impl InternalTransport {
    pub const TYPE: &'static str = DEFAULT_TRANSPORT;

    pub fn new(
        sessions: SessionFactory,
        locks: LockManager,
        resolver: ShardedPathResolver,
        feeds_root: impl Into<String>,
    ) -> Self {
        Self {
            feeds_root: feeds_root.into(),
            resolver,
            placement: Placement::new(sessions, locks, DEFAULT_LOCK_TIMEOUT),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.placement.set_lock_timeout(timeout);
        self
    }

    /// Feed directory of `recipient`.
    pub fn feed_dir(&self, recipient: &str) -> String {
        self.resolver.resolve(&self.feeds_root, recipient)
    }

    /// Path of `item_id`'s copy in `recipient`'s feed.
    pub fn feed_path(&self, recipient: &str, item_id: &str) -> String {
        path::join(&self.feed_dir(recipient), item_id)
    }

    async fn deliver_one(&self, recipient: &str, item: &ContentItem) -> TransportResult<RouteOutcome> {
        check_segment(recipient)?;
        let target = self.feed_path(recipient, item.id());
        let placed = self
            .placement
            .place(item, &target, |copy| {
                copy.set(props::MESSAGE_BOX, props::BOX_INBOX);
                copy.set(props::READ, false);
                copy.set(props::RECIPIENT, recipient);
            })
            .await?;
        Ok(match placed {
            Placed::Created => RouteOutcome::Delivered { path: target },
            Placed::Existing => RouteOutcome::AlreadyDelivered { path: target },
        })
    }
}

#[async_trait]
impl Transport for InternalTransport {
    fn transport_type(&self) -> &str {
        Self::TYPE
    }

    async fn deliver(
        &self,
        routes: &[Route],
        item: &ContentItem,
        event: &DeliveryEvent,
    ) -> Vec<RouteReport> {
        let mut reports = Vec::with_capacity(routes.len());
        for route in routes {
            let Some(recipient) = route.recipient() else {
                reports.push(RouteReport::failed(route.clone(), "route has no recipient"));
                continue;
            };
            let outcome = match self.deliver_one(recipient, item).await {
                Ok(outcome) => {
                    debug!(event = %event.id, recipient, %outcome, "feed delivery");
                    outcome
                }
                Err(e) => {
                    warn!(
                        event = %event.id,
                        path = item.path(),
                        recipient,
                        error = %e,
                        "feed delivery abandoned"
                    );
                    RouteOutcome::Failed { reason: e.to_string() }
                }
            };
            reports.push(RouteReport::new(route.clone(), outcome));
        }
        if !routes.is_empty() {
            info!(
                event = %event.id,
                path = item.path(),
                routes = routes.len(),
                failed = reports.iter().filter(|r| r.outcome.is_failure()).count(),
                "internal delivery finished"
            );
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fanout_store::{ContentStore, InMemoryContentStore};

    use super::*;

    const FEEDS: &str = "/feeds";

    struct Fixture {
        store: Arc<InMemoryContentStore>,
        sessions: SessionFactory,
        locks: LockManager,
        transport: InternalTransport,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryContentStore::new());
        let sessions = SessionFactory::new(store.clone());
        let locks = LockManager::new();
        let transport = InternalTransport::new(
            sessions.clone(),
            locks.clone(),
            ShardedPathResolver::default(),
            FEEDS,
        )
        .with_lock_timeout(Duration::from_millis(100));
        Fixture {
            store,
            sessions,
            locks,
            transport,
        }
    }

    fn message(store: &InMemoryContentStore, id: &str) -> ContentItem {
        store.create_node("/messages").unwrap();
        let item = ContentItem::new(format!("/messages/{id}"), id)
            .with("subject", "lunch")
            .with(props::ACTOR, "carol");
        store.put(&item).unwrap();
        item
    }

    fn event(item: &ContentItem) -> DeliveryEvent {
        DeliveryEvent::new("fanout/message/deliver", item.path(), "carol")
    }

    // ----------------------------------------------------------------
    // Placement and idempotency
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn empty_route_list_is_noop() {
        let f = fixture();
        let item = message(&f.store, "m1");
        let before = f.store.len();
        let reports = f.transport.deliver(&[], &item, &event(&item)).await;
        assert!(reports.is_empty());
        assert_eq!(f.store.len(), before);
    }

    #[tokio::test]
    async fn copy_lands_in_sharded_feed() {
        let f = fixture();
        let item = message(&f.store, "m1");
        let reports = f
            .transport
            .deliver(&[Route::internal("alice")], &item, &event(&item))
            .await;

        let expected = format!("{}/m1", ShardedPathResolver::default().resolve(FEEDS, "alice"));
        assert_eq!(
            reports[0].outcome,
            RouteOutcome::Delivered { path: expected.clone() }
        );
        let copy = f.store.get(&expected).unwrap().unwrap();
        assert_eq!(copy.string(props::MESSAGE_BOX), Some(props::BOX_INBOX));
        assert_eq!(copy.bool(props::READ), Some(false));
        assert_eq!(copy.string(props::RECIPIENT), Some("alice"));
        assert_eq!(copy.string("subject"), Some("lunch"));
    }

    #[tokio::test]
    async fn repeated_delivery_is_noop() {
        let f = fixture();
        let item = message(&f.store, "m1");
        let routes = [Route::internal("alice")];
        f.transport.deliver(&routes, &item, &event(&item)).await;
        let size = f.store.len();

        let reports = f.transport.deliver(&routes, &item, &event(&item)).await;
        assert!(matches!(reports[0].outcome, RouteOutcome::AlreadyDelivered { .. }));
        assert_eq!(f.store.len(), size);
        assert_eq!(f.store.paths_under(&f.transport.feed_dir("alice")).len(), 2);
    }

    #[tokio::test]
    async fn back_reference_resolves_to_store_of_record() {
        let f = fixture();
        let item = message(&f.store, "m1");
        f.transport
            .deliver(&[Route::internal("bob")], &item, &event(&item))
            .await;

        let copy = f.store.get(&f.transport.feed_path("bob", "m1")).unwrap().unwrap();
        let back = copy.string(props::PREVIOUS).unwrap();
        let original = f.store.get(back).unwrap().unwrap();
        assert_eq!(original.path(), item.path());
        assert_eq!(original.id(), item.id());
    }

    // ----------------------------------------------------------------
    // Concurrency
    // ----------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deliveries_create_feed_directory_once() {
        let f = fixture();
        f.store.create_node(FEEDS).unwrap();
        let first = message(&f.store, "m1");
        let second = message(&f.store, "m2");
        let baseline = f.store.nodes_created();
        let transport = Arc::new(f.transport);

        let spawn = |item: ContentItem| {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                transport
                    .deliver(&[Route::internal("dave")], &item, &event(&item))
                    .await
            })
        };
        let (a, b) = tokio::join!(spawn(first), spawn(second));
        let reports: Vec<_> = a.unwrap().into_iter().chain(b.unwrap()).collect();

        assert!(reports
            .iter()
            .all(|r| matches!(r.outcome, RouteOutcome::Delivered { .. })));
        // Three shard levels plus the recipient directory, created once.
        assert_eq!(f.store.nodes_created() - baseline, 4);
        assert_eq!(f.store.children(&transport.feed_dir("dave")).unwrap().len(), 2);
        assert_eq!(f.locks.held_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_target_yields_one_copy() {
        let f = fixture();
        let item = message(&f.store, "m1");
        let transport = Arc::new(f.transport);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let transport = Arc::clone(&transport);
            let item = item.clone();
            handles.push(tokio::spawn(async move {
                transport
                    .deliver(&[Route::internal("erin")], &item, &event(&item))
                    .await
            }));
        }
        let mut delivered = 0;
        for handle in handles {
            let reports = handle.await.unwrap();
            assert!(!reports[0].outcome.is_failure());
            if matches!(reports[0].outcome, RouteOutcome::Delivered { .. }) {
                delivered += 1;
            }
        }
        assert_eq!(delivered, 1);
        assert_eq!(f.store.children(&transport.feed_dir("erin")).unwrap().len(), 1);
    }

    // ----------------------------------------------------------------
    // Failures
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn lock_timeout_fails_only_that_route() {
        let f = fixture();
        let item = message(&f.store, "m1");
        let _held = f.locks.try_acquire(&f.transport.feed_dir("alice")).unwrap().unwrap();

        let reports = f
            .transport
            .deliver(
                &[Route::internal("alice"), Route::internal("bob")],
                &item,
                &event(&item),
            )
            .await;
        assert!(reports[0].outcome.is_failure());
        assert!(matches!(reports[1].outcome, RouteOutcome::Delivered { .. }));
    }

    #[tokio::test]
    async fn store_failure_leaves_siblings_and_sessions_intact() {
        let f = fixture();
        let item = message(&f.store, "m1");
        f.store.fail_writes_under(f.transport.feed_dir("alice"));

        let reports = f
            .transport
            .deliver(
                &[
                    Route::internal("alice"),
                    Route::internal("a/b"),
                    Route::internal("bob"),
                ],
                &item,
                &event(&item),
            )
            .await;
        assert!(reports[0].outcome.is_failure());
        assert!(reports[1].outcome.is_failure());
        assert!(matches!(reports[2].outcome, RouteOutcome::Delivered { .. }));
        assert_eq!(f.sessions.open_sessions(), 0);
        assert_eq!(f.locks.held_count(), 0);
    }
}
