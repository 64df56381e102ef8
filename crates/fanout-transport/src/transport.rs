use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fanout_bus::DeliveryEvent;
use fanout_types::{ContentItem, Route};

/// Physical delivery for one transport type.
///
/// A transport only ever receives routes whose transport equals
/// [`Transport::transport_type`], and must treat an empty slice as a no-op.
/// It reports an outcome for every route it was given rather than failing
/// as a whole.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport identifier matched against `Route::transport`.
    fn transport_type(&self) -> &str;

    /// Deliver `item` along `routes`. `event` is the trigger that started
    /// this delivery, for transports that read producer metadata.
    async fn deliver(
        &self,
        routes: &[Route],
        item: &ContentItem,
        event: &DeliveryEvent,
    ) -> Vec<RouteReport>;
}

/// What happened to a single route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    /// A new copy was written at `path`.
    Delivered { path: String },
    /// A copy already existed at `path`; nothing was written.
    AlreadyDelivered { path: String },
    /// No registered transport handles this route's transport type.
    Unclaimed,
    /// Delivery along this route was abandoned.
    Failed { reason: String },
}

impl RouteOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Target path, for outcomes that have one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Delivered { path } | Self::AlreadyDelivered { path } => Some(path),
            Self::Unclaimed | Self::Failed { .. } => None,
        }
    }
}

impl fmt::Display for RouteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered { path } => write!(f, "delivered to {path}"),
            Self::AlreadyDelivered { path } => write!(f, "already at {path}"),
            Self::Unclaimed => write!(f, "no transport"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// The outcome of one route.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteReport {
    pub route: Route,
    pub outcome: RouteOutcome,
}

impl RouteReport {
    pub fn new(route: Route, outcome: RouteOutcome) -> Self {
        Self { route, outcome }
    }

    pub fn failed(route: Route, reason: impl Into<String>) -> Self {
        Self::new(route, RouteOutcome::Failed { reason: reason.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_failed_counts_as_failure() {
        assert!(RouteOutcome::Failed { reason: "x".into() }.is_failure());
        assert!(!RouteOutcome::Unclaimed.is_failure());
        assert!(!RouteOutcome::AlreadyDelivered { path: "/f".into() }.is_failure());
    }

    #[test]
    fn path_is_exposed_for_placed_outcomes() {
        let outcome = RouteOutcome::Delivered { path: "/feeds/a".into() };
        assert_eq!(outcome.path(), Some("/feeds/a"));
        assert_eq!(outcome.to_string(), "delivered to /feeds/a");
        assert_eq!(RouteOutcome::Unclaimed.path(), None);
    }
}
