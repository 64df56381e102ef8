use std::fmt;

use serde::{Deserialize, Serialize};

use fanout_bus::EventId;
use fanout_transport::{RouteOutcome, RouteReport};

/// Stage reached by one delivery event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    /// Pulled off the bus.
    Received,
    /// Item loaded and its actor present.
    Validated,
    /// Route table built.
    Routed,
    /// Transports running.
    Delivering,
    Done,
    Failed,
}

impl DeliveryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::Routed => "routed",
            Self::Delivering => "delivering",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal result of handling one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub event: EventId,
    pub item_path: Option<String>,
    pub state: DeliveryState,
    /// Last non-terminal stage reached before failing.
    pub failed_at: Option<DeliveryState>,
    pub error: Option<String>,
    pub reports: Vec<RouteReport>,
}

impl DeliveryOutcome {
    pub fn is_done(&self) -> bool {
        self.state == DeliveryState::Done
    }

    /// Paths of the copies written by this delivery.
    pub fn delivered_paths(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter_map(|r| match &r.outcome {
                RouteOutcome::Delivered { path } => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn failed_routes(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_failure()).count()
    }
}
