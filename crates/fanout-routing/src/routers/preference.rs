use std::sync::Arc;

use tracing::{debug, warn};

use fanout_types::{props, ContentItem, Route, DEFAULT_TRANSPORT};

use crate::directory::Directory;
use crate::error::RoutingResult;
use crate::router::Router;
use crate::table::{RouteTable, Rewrite};

/// Promotes internal routes to the transport a recipient prefers.
///
/// For every internal route whose recipient is a known user, the target
/// transport is the one the item requires (`fanout:transport`) or else the
/// one the user's profile prefers. When the target differs from `internal`
/// and the profile holds an address for it, the route is replaced by a route
/// to that address. When no address is found the internal route is kept and
/// a warning logged, so no recipient is ever dropped. A failed profile
/// lookup also keeps that recipient's internal route; the other recipients
/// are still promoted.
pub struct PreferenceRouter {
    directory: Arc<dyn Directory>,
}

impl PreferenceRouter {
    pub const NAME: &'static str = "preference";

    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }
}

impl Router for PreferenceRouter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        50
    }

    fn route(&self, item: &ContentItem, table: &mut RouteTable) -> RoutingResult<()> {
        let required = item
            .string(props::TRANSPORT)
            .filter(|t| *t != DEFAULT_TRANSPORT);
        let mut placed: Vec<Route> = Vec::new();

        table.rewrite(|route| {
            if !route.is_internal() {
                return Rewrite::Keep;
            }
            let Some(user) = route.recipient() else {
                return Rewrite::Keep;
            };
            let profile = match self.directory.profile(user) {
                Ok(Some(profile)) => profile,
                Ok(None) => return Rewrite::Keep,
                Err(e) => {
                    warn!(
                        path = item.path(),
                        user,
                        error = %e,
                        "profile lookup failed; keeping internal route"
                    );
                    return Rewrite::Keep;
                }
            };

            let target = required.or(profile.preferred_transport.as_deref());
            let Some(target) = target.filter(|t| *t != DEFAULT_TRANSPORT) else {
                return Rewrite::Keep;
            };

            match profile.address(target) {
                Some(address) => {
                    let promoted = Route::new(target, address);
                    debug!(path = item.path(), user, route = %promoted, "promoted route");
                    if placed.contains(&promoted) {
                        return Rewrite::Replace(Vec::new());
                    }
                    placed.push(promoted.clone());
                    Rewrite::Replace(vec![promoted])
                }
                None => {
                    warn!(
                        path = item.path(),
                        user,
                        transport = target,
                        "no delivery address for preferred transport; keeping internal route"
                    );
                    Rewrite::Keep
                }
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, Profile};

    fn directory() -> InMemoryDirectory {
        let dir = InMemoryDirectory::new();
        dir.add_user(
            "alice",
            Profile::preferring("smtp").with_address("smtp", "alice@x.org"),
        );
        dir.add_user("bob", Profile::default().with_address("smtp", "bob@x.org"));
        dir.add_user("carol", Profile::preferring("smtp"));
        dir
    }

    fn run(dir: InMemoryDirectory, item: ContentItem, routes: &[Route]) -> RoutingResult<RouteTable> {
        let router = PreferenceRouter::new(Arc::new(dir));
        let mut table: RouteTable = routes.iter().cloned().collect();
        router.route(&item, &mut table)?;
        Ok(table)
    }

    fn plain_item() -> ContentItem {
        ContentItem::at("/m/1")
    }

    #[test]
    fn promotes_user_preferring_smtp() {
        let table = run(directory(), plain_item(), &[Route::internal("alice")]).unwrap();
        assert_eq!(table.to_vec(), vec![Route::new("smtp", "alice@x.org")]);
    }

    #[test]
    fn user_without_preference_stays_internal() {
        let table = run(directory(), plain_item(), &[Route::internal("bob")]).unwrap();
        assert_eq!(table.to_vec(), vec![Route::internal("bob")]);
    }

    #[test]
    fn item_flag_forces_transport() {
        let item = plain_item().with(props::TRANSPORT, "smtp");
        let table = run(directory(), item, &[Route::internal("bob")]).unwrap();
        assert_eq!(table.to_vec(), vec![Route::new("smtp", "bob@x.org")]);
    }

    #[test]
    fn missing_address_keeps_internal_route() {
        let table = run(directory(), plain_item(), &[Route::internal("carol")]).unwrap();
        assert_eq!(table.to_vec(), vec![Route::internal("carol")]);
    }

    #[test]
    fn unknown_users_and_other_transports_untouched() {
        let routes = [Route::internal("zed"), Route::new("smtp", "alice")];
        let table = run(directory(), plain_item(), &routes).unwrap();
        assert_eq!(table.to_vec(), routes.to_vec());
    }

    #[test]
    fn lookup_failure_keeps_only_that_route() {
        let dir = directory();
        dir.add_user(
            "dave",
            Profile::preferring("smtp").with_address("smtp", "dave@x.org"),
        );
        dir.fail_lookups_for("alice");
        let routes = [Route::internal("alice"), Route::internal("dave")];
        let table = run(dir, plain_item(), &routes).unwrap();
        assert_eq!(
            table.to_vec(),
            vec![Route::internal("alice"), Route::new("smtp", "dave@x.org")]
        );
    }
}
