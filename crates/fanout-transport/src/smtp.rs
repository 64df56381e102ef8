use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use fanout_bus::DeliveryEvent;
use fanout_store::{LockManager, SessionFactory, ShardedPathResolver};
use fanout_types::{props, ContentItem, Route};

use crate::placement::{Placed, Placement};
use crate::transport::{RouteOutcome, RouteReport, Transport};
use crate::DEFAULT_LOCK_TIMEOUT;

/// Queues mail notifications in an outbox.
///
/// All `smtp` routes of one item are collected into a single outbox entry
/// at `<outbox_root>/<shard(item id)>/<item id>`, whose `fanout:mailto`
/// lists the addresses. A mailer outside this crate drains the outbox.
/// Every route reports the outcome of that one entry.
pub struct SmtpTransport {
    outbox_root: String,
    resolver: ShardedPathResolver,
    placement: Placement,
}

impl SmtpTransport {
    pub const TYPE: &'static str = "smtp";

    pub fn new(
        sessions: SessionFactory,
        locks: LockManager,
        resolver: ShardedPathResolver,
        outbox_root: impl Into<String>,
    ) -> Self {
        Self {
            outbox_root: outbox_root.into(),
            resolver,
            placement: Placement::new(sessions, locks, DEFAULT_LOCK_TIMEOUT),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.placement.set_lock_timeout(timeout);
        self
    }

    /// Outbox entry path for `item_id`.
    pub fn outbox_path(&self, item_id: &str) -> String {
        self.resolver.resolve(&self.outbox_root, item_id)
    }
}

#[async_trait]
impl Transport for SmtpTransport {
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
        let mut addressed = Vec::new();
        for route in routes {
            match route.recipient() {
                Some(address) => addressed.push((route, address.to_string())),
                None => reports.push(RouteReport::failed(route.clone(), "route has no recipient")),
            }
        }
        if addressed.is_empty() {
            return reports;
        }

        let mut mail_to: Vec<String> = Vec::with_capacity(addressed.len());
        for (_, address) in &addressed {
            if !mail_to.contains(address) {
                mail_to.push(address.clone());
            }
        }

        let target = self.outbox_path(item.id());
        let recipients = mail_to.len();
        let placed = self
            .placement
            .place(item, &target, |entry| {
                entry.set(props::MESSAGE_BOX, props::BOX_OUTBOX);
                entry.set(props::MAIL_TO, mail_to);
            })
            .await;

        let outcome = match placed {
            Ok(Placed::Created) => {
                info!(event = %event.id, path = %target, recipients, "queued mail notification");
                RouteOutcome::Delivered { path: target }
            }
            Ok(Placed::Existing) => RouteOutcome::AlreadyDelivered { path: target },
            Err(e) => {
                warn!(event = %event.id, path = item.path(), error = %e, "mail queueing abandoned");
                RouteOutcome::Failed { reason: e.to_string() }
            }
        };
        reports.extend(
            addressed
                .into_iter()
                .map(|(route, _)| RouteReport::new(route.clone(), outcome.clone())),
        );
        reports
    }
}
