use tracing::debug;

use fanout_types::ContentItem;

use crate::error::RoutingResult;
use crate::router::Router;
use crate::table::RouteTable;

/// Final pass removing duplicate `(transport, recipient)` entries.
///
/// Registered at the lowest priority so it sees every other router's output.
pub struct DedupRouter;

impl Router for DedupRouter {
    fn name(&self) -> &str {
        "dedup"
    }

    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn route(&self, item: &ContentItem, table: &mut RouteTable) -> RoutingResult<()> {
        let removed = table.dedup();
        if removed > 0 {
            debug!(path = item.path(), removed, "removed duplicate routes");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use fanout_types::Route;

    use super::*;

    #[test]
    fn removes_duplicates_only() {
        let mut table: RouteTable = [
            Route::internal("a"),
            Route::new("smtp", "a"),
            Route::internal("a"),
        ]
        .into_iter()
        .collect();
        DedupRouter
            .route(&ContentItem::at("/m/1"), &mut table)
            .unwrap();
        assert_eq!(
            table.to_vec(),
            vec![Route::internal("a"), Route::new("smtp", "a")]
        );
    }
}
