//! Asynchronous delivery for the fanout engine.
//!
//! A producer stores an item, then publishes a [`fanout_bus::DeliveryEvent`]
//! naming it. A [`DeliveryWorker`] consumes the event and walks it through
//! [`DeliveryState`]:
//!
//! ```text
//! Received -> Validated -> Routed -> Delivering -> Done
//!     \           \           \           \
//!      +-----------+-----------+-----------+-> Failed
//! ```
//!
//! Failures are terminal for the event. They are logged and reported in the
//! returned [`DeliveryOutcome`]; the event is never re-published.
//!
//! [`DeliveryService`] runs a pool of workers over one topic consumer, and
//! [`FanoutEngine`] wires every component from a [`FanoutConfig`].

pub mod config;
pub mod engine;
pub mod error;
pub mod service;
pub mod state;
pub mod worker;

pub use config::{DirectoryConfig, FanoutConfig, ShardConfig};
pub use engine::FanoutEngine;
pub use error::{DeliveryError, DeliveryResult};
pub use service::DeliveryService;
pub use state::{DeliveryOutcome, DeliveryState};
pub use worker::DeliveryWorker;
