use fanout_types::ContentItem;

use crate::error::RoutingResult;
use crate::table::RouteTable;

/// A pluggable rewriter in the router chain.
///
/// Routers run in descending [`Router::priority`] order; routers with equal
/// priority run in registration order. Each receives the live table as the
/// previous router left it.
///
/// A router may remove any route it understands and append replacements. It
/// must leave routes it does not understand untouched, and it is responsible
/// for not introducing duplicate `(transport, recipient)` entries.
///
/// Returning an error discards every change this router made to the table;
/// the chain logs the error and continues with the next router.
pub trait Router: Send + Sync {
    /// Name used for registration and logging. Unique within a chain.
    fn name(&self) -> &str;

    /// Higher runs earlier.
    fn priority(&self) -> i32 {
        0
    }

    /// Inspect `item` and rewrite `table`.
    fn route(&self, item: &ContentItem, table: &mut RouteTable) -> RoutingResult<()>;
}
