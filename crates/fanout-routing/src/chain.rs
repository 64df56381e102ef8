use std::cmp::Reverse;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use fanout_types::{parse_address, props, ContentItem};

use crate::error::{RoutingError, RoutingResult};
use crate::router::Router;
use crate::table::RouteTable;

/// The ordered set of registered routers.
///
/// Routers are registered at composition time and may be added or removed
/// while the chain is in use; each [`RouterChain::build_routes`] call works
/// on a snapshot of the registry taken when it starts.
pub struct RouterChain {
    routers: RwLock<Vec<Arc<dyn Router>>>,
}

impl RouterChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            routers: RwLock::new(Vec::new()),
        }
    }

    /// Add a router. A router registered under an existing name replaces it
    /// in place.
    pub fn register(&self, router: Arc<dyn Router>) {
        let mut routers = self.write();
        match routers.iter().position(|r| r.name() == router.name()) {
            Some(idx) => routers[idx] = router,
            None => routers.push(router),
        }
    }

    /// Remove the router registered under `name`. Returns `true` if found.
    pub fn unregister(&self, name: &str) -> bool {
        let mut routers = self.write();
        let before = routers.len();
        routers.retain(|r| r.name() != name);
        routers.len() != before
    }

    /// Number of registered routers.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Router names in invocation order.
    pub fn router_names(&self) -> Vec<String> {
        self.ordered().iter().map(|r| r.name().to_string()).collect()
    }

    /// Parse the item's `to` addresses into the starting table.
    ///
    /// Fails with [`RoutingError::NoRecipients`] if the item has no address
    /// that parses to a valid route.
    pub fn initial_routes(&self, item: &ContentItem) -> RoutingResult<RouteTable> {
        let mut table = RouteTable::new();
        for raw in item.strings(props::TO) {
            let route = parse_address(&raw);
            if route.is_valid() {
                table.add(route);
            } else {
                warn!(path = item.path(), address = %raw, "ignoring unparseable address");
            }
        }
        if table.is_empty() {
            return Err(RoutingError::NoRecipients {
                path: item.path().to_string(),
            });
        }
        Ok(table)
    }

    /// Build the route table for `item`.
    ///
    /// Each router runs against a working copy of the table. If it fails,
    /// the copy is discarded, the failure is logged, and the chain moves on
    /// with the table as it was before that router ran.
    pub fn build_routes(&self, item: &ContentItem) -> RoutingResult<RouteTable> {
        let mut table = self.initial_routes(item)?;

        for router in self.ordered() {
            let mut working = table.clone();
            match router.route(item, &mut working) {
                Ok(()) => {
                    if working != table {
                        debug!(
                            router = router.name(),
                            before = table.len(),
                            after = working.len(),
                            "router rewrote routes"
                        );
                    }
                    table = working;
                }
                Err(e) => {
                    warn!(
                        router = router.name(),
                        path = item.path(),
                        error = %e,
                        "router failed; keeping routes unchanged"
                    );
                }
            }
        }

        Ok(table)
    }

    /// Snapshot of the routers, highest priority first, ties in
    /// registration order.
    fn ordered(&self) -> Vec<Arc<dyn Router>> {
        let mut routers = self.read().clone();
        routers.sort_by_key(|r| Reverse(r.priority()));
        routers
    }

    // The registry only holds `Arc`s, so a panic while it was locked cannot
    // leave it half-updated; recover the guard instead of failing.
    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn Router>>> {
        self.routers.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn Router>>> {
        self.routers.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for RouterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RouterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterChain")
            .field("routers", &self.router_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use fanout_types::Route;

    use super::*;
    use crate::table::Rewrite;

    /// Records its invocation and optionally adds or removes a route.
    struct ScriptedRouter {
        name: &'static str,
        priority: i32,
        log: Arc<Mutex<Vec<&'static str>>>,
        add: Option<Route>,
        remove: Option<Route>,
        fail: bool,
    }

    impl ScriptedRouter {
        fn new(name: &'static str, priority: i32, log: &Arc<Mutex<Vec<&'static str>>>) -> Self {
            Self {
                name,
                priority,
                log: Arc::clone(log),
                add: None,
                remove: None,
                fail: false,
            }
        }
    }

    impl Router for ScriptedRouter {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn route(&self, _item: &ContentItem, table: &mut RouteTable) -> RoutingResult<()> {
            self.log.lock().unwrap().push(self.name);
            if let Some(add) = &self.add {
                table.add_unique(add.clone());
            }
            if let Some(remove) = &self.remove {
                table.rewrite(|r| {
                    if r == remove {
                        Rewrite::Replace(Vec::new())
                    } else {
                        Rewrite::Keep
                    }
                });
            }
            if self.fail {
                return Err(RoutingError::Router {
                    router: self.name.into(),
                    message: "backing store down".into(),
                });
            }
            Ok(())
        }
    }

    fn item(to: &str) -> ContentItem {
        ContentItem::at("/messages/m1").with(props::TO, to)
    }

    // -----------------------------------------------------------------------
    // Initial table
    // -----------------------------------------------------------------------

    #[test]
    fn initial_routes_parse_every_address() {
        let chain = RouterChain::new();
        let table = chain.initial_routes(&item("alice, smtp:b@c.org")).unwrap();
        assert_eq!(
            table.to_vec(),
            vec![Route::internal("alice"), Route::new("smtp", "b@c.org")]
        );
    }

    #[test]
    fn missing_or_empty_to_is_a_producer_error() {
        let chain = RouterChain::new();
        let no_to = ContentItem::at("/messages/m1");
        assert!(matches!(
            chain.build_routes(&no_to),
            Err(RoutingError::NoRecipients { .. })
        ));
        assert!(matches!(
            chain.build_routes(&item("smtp:, ,")),
            Err(RoutingError::NoRecipients { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn routers_run_highest_priority_first_with_stable_ties() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = RouterChain::new();
        chain.register(Arc::new(ScriptedRouter::new("low", 1, &log)));
        chain.register(Arc::new(ScriptedRouter::new("tie-a", 5, &log)));
        chain.register(Arc::new(ScriptedRouter::new("high", 9, &log)));
        chain.register(Arc::new(ScriptedRouter::new("tie-b", 5, &log)));

        chain.build_routes(&item("alice")).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["high", "tie-a", "tie-b", "low"]);
        assert_eq!(chain.router_names(), vec!["high", "tie-a", "tie-b", "low"]);
    }

    #[test]
    fn lower_priority_sees_and_removes_higher_priority_additions() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let added = Route::new("smtp", "x@y");

        let mut high = ScriptedRouter::new("adder", 20, &log);
        high.add = Some(added.clone());
        let mut low = ScriptedRouter::new("remover", 10, &log);
        low.remove = Some(added.clone());

        let chain = RouterChain::new();
        chain.register(Arc::new(low));
        chain.register(Arc::new(high));

        let table = chain.build_routes(&item("alice")).unwrap();
        assert!(!table.contains(&added));
        assert_eq!(table.to_vec(), vec![Route::internal("alice")]);
    }

    #[test]
    fn higher_priority_never_sees_lower_priority_additions() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let added = Route::new("smtp", "x@y");

        let mut low = ScriptedRouter::new("adder", 10, &log);
        low.add = Some(added.clone());
        let mut high = ScriptedRouter::new("remover", 20, &log);
        high.remove = Some(added.clone());

        let chain = RouterChain::new();
        chain.register(Arc::new(low));
        chain.register(Arc::new(high));

        let table = chain.build_routes(&item("alice")).unwrap();
        assert!(table.contains(&added));
    }

    // -----------------------------------------------------------------------
    // Failure isolation
    // -----------------------------------------------------------------------

    #[test]
    fn failing_router_contribution_is_discarded() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut broken = ScriptedRouter::new("broken", 20, &log);
        broken.remove = Some(Route::internal("alice"));
        broken.fail = true;
        let mut healthy = ScriptedRouter::new("healthy", 10, &log);
        healthy.add = Some(Route::internal("bob"));

        let chain = RouterChain::new();
        chain.register(Arc::new(broken));
        chain.register(Arc::new(healthy));

        let table = chain.build_routes(&item("alice")).unwrap();
        assert_eq!(
            table.to_vec(),
            vec![Route::internal("alice"), Route::internal("bob")]
        );
        assert_eq!(*log.lock().unwrap(), vec!["broken", "healthy"]);
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    #[test]
    fn register_and_unregister_are_symmetric() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = RouterChain::new();
        chain.register(Arc::new(ScriptedRouter::new("a", 1, &log)));
        chain.register(Arc::new(ScriptedRouter::new("b", 1, &log)));
        assert_eq!(chain.len(), 2);

        assert!(chain.unregister("a"));
        assert!(!chain.unregister("a"));
        assert_eq!(chain.router_names(), vec!["b"]);

        chain.register(Arc::new(ScriptedRouter::new("b", 7, &log)));
        assert_eq!(chain.len(), 1);
    }
}
