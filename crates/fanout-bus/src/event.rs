use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BusError, BusResult};

/// Unique, time-ordered identifier of a delivery event (UUID v7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Last 8 hex characters (random bits, unlike the leading timestamp),
    /// for logs.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[24..].to_string()
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt:{}", self.short())
    }
}

/// A delivery trigger: "deliver the item at this path on behalf of this
/// user".
///
/// The payload is a flat string property map, so producers can attach
/// feature-specific metadata that transports may read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub id: EventId,
    pub topic: String,
    pub properties: BTreeMap<String, String>,
    pub published_at: DateTime<Utc>,
}

impl DeliveryEvent {
    /// Property holding the path of the item to deliver.
    pub const ITEM_PATH: &'static str = "path";
    /// Property holding the id of the user who triggered delivery.
    pub const USER_ID: &'static str = "userid";

    /// Build a trigger for the item at `item_path`, raised by `user_id`.
    pub fn new(topic: impl Into<String>, item_path: impl Into<String>, user_id: impl Into<String>) -> Self {
        let mut properties = BTreeMap::new();
        properties.insert(Self::ITEM_PATH.to_string(), item_path.into());
        properties.insert(Self::USER_ID.to_string(), user_id.into());
        Self {
            id: EventId::new(),
            topic: topic.into(),
            properties,
            published_at: Utc::now(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn item_path(&self) -> Option<&str> {
        self.property(Self::ITEM_PATH)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.property(Self::USER_ID)
    }

    pub fn to_json(&self) -> BusResult<String> {
        serde_json::to_string(self).map_err(|e| BusError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> BusResult<Self> {
        serde_json::from_str(json).map_err(|e| BusError::Serialization(e.to_string()))
    }
}
