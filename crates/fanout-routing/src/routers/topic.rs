use std::collections::BTreeMap;

use tracing::{debug, warn};

use fanout_types::{parse_address, props, ContentItem};

use crate::error::RoutingResult;
use crate::router::Router;
use crate::table::RouteTable;

/// Adds notification routes for items carrying a topic marker.
///
/// Each marker maps to a list of raw addresses (for example a moderators'
/// mailing list for `discussion`). An item whose `fanout:topic` names a
/// configured marker gets a route for each of those addresses it does not
/// already have. Unknown markers are ignored.
#[derive(Debug, Default)]
pub struct TopicRouter {
    topics: BTreeMap<String, Vec<String>>,
}

impl TopicRouter {
    pub const NAME: &'static str = "topic";

    pub fn new(topics: BTreeMap<String, Vec<String>>) -> Self {
        Self { topics }
    }

    pub fn with_topic<I, S>(mut self, marker: impl Into<String>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics
            .insert(marker.into(), addresses.into_iter().map(Into::into).collect());
        self
    }
}

impl Router for TopicRouter {
    fn name(&self) -> &str {
        Self::NAME
    }

    // Ahead of group expansion, so group addresses it adds get expanded.
    fn priority(&self) -> i32 {
        120
    }

    fn route(&self, item: &ContentItem, table: &mut RouteTable) -> RoutingResult<()> {
        let Some(marker) = item.string(props::TOPIC) else {
            return Ok(());
        };
        let Some(addresses) = self.topics.get(marker) else {
            debug!(path = item.path(), topic = marker, "no notification addresses for topic");
            return Ok(());
        };
        for raw in addresses {
            let route = parse_address(raw);
            if !route.is_valid() {
                warn!(topic = marker, address = %raw, "skipping invalid topic address");
                continue;
            }
            if table.add_unique(route) {
                debug!(path = item.path(), topic = marker, address = %raw, "added topic route");
            }
        }
        Ok(())
    }
}
