use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use fanout_bus::DeliveryEvent;
use fanout_routing::RouteTable;
use fanout_types::ContentItem;

use crate::transport::{RouteOutcome, RouteReport, Transport};

/// Registered transports, keyed by transport type.
///
/// Registration is symmetric: [`TransportRegistry::register`] adds (or
/// replaces the transport of the same type) and
/// [`TransportRegistry::unregister`] removes by type.
#[derive(Default)]
pub struct TransportRegistry {
    transports: RwLock<Vec<Arc<dyn Transport>>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, transport: Arc<dyn Transport>) {
        let mut transports = self.transports.write().unwrap_or_else(|p| p.into_inner());
        let kind = transport.transport_type().to_string();
        match transports.iter_mut().find(|t| t.transport_type() == kind) {
            Some(slot) => {
                debug!(transport = %kind, "replacing transport");
                *slot = transport;
            }
            None => {
                debug!(transport = %kind, "registered transport");
                transports.push(transport);
            }
        }
    }

    /// Remove the transport for `kind`. Returns `true` if one was registered.
    pub fn unregister(&self, kind: &str) -> bool {
        let mut transports = self.transports.write().unwrap_or_else(|p| p.into_inner());
        let before = transports.len();
        transports.retain(|t| t.transport_type() != kind);
        transports.len() != before
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Registered transport types, in registration order.
    pub fn transport_types(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|t| t.transport_type().to_string())
            .collect()
    }

    /// Hand every transport the routes of its type.
    ///
    /// Transports run one after another on this task; each is invoked even
    /// when it has no routes. Routes no registered transport claims are
    /// reported as [`RouteOutcome::Unclaimed`].
    pub async fn dispatch(
        &self,
        table: &RouteTable,
        item: &ContentItem,
        event: &DeliveryEvent,
    ) -> Vec<RouteReport> {
        let transports = self.snapshot();
        let mut reports = Vec::with_capacity(table.len());

        for transport in &transports {
            let routes = table.routes_for(transport.transport_type());
            reports.extend(transport.deliver(&routes, item, event).await);
        }

        for route in table.iter() {
            let claimed = transports
                .iter()
                .any(|t| route.is_for(t.transport_type()));
            if !claimed {
                warn!(path = item.path(), %route, "no transport for route");
                reports.push(RouteReport::new(route.clone(), RouteOutcome::Unclaimed));
            }
        }
        reports
    }

    fn snapshot(&self) -> Vec<Arc<dyn Transport>> {
        self.transports
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
