//! Event bus for fanout delivery.
//!
//! Producers create a content item synchronously, then publish a
//! [`DeliveryEvent`] naming it. Delivery workers consume those events
//! asynchronously. Each topic is a bounded channel with a single consumer
//! group: every event is handed to exactly one of the topic's consumers, and
//! a full channel applies backpressure to publishers.

pub mod bus;
pub mod error;
pub mod event;

pub use bus::{EventBus, TopicConsumer};
pub use error::{BusError, BusResult};
pub use event::{DeliveryEvent, EventId};

/// Default per-topic channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
