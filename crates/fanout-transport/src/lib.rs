//! Physical delivery for fanout.
//!
//! After route building, the [`TransportRegistry`] hands each registered
//! [`Transport`] the routes carrying its transport type. Transports run one
//! after another and independently of each other; one failing route never
//! stops its siblings.
//!
//! Two transports are provided:
//!
//! - [`InternalTransport`] copies the item into each recipient's sharded
//!   feed, with a back-reference to the store-of-record path.
//! - [`SmtpTransport`] queues one outbox item per message carrying the mail
//!   addresses to notify.
//!
//! Both follow the same placement discipline: existence check on the
//! derived target path, then lock the target's parent, re-check, create
//! the parent, copy, annotate, unlock. Repeated deliveries are no-ops.

pub mod error;
pub mod internal;
mod placement;
pub mod registry;
pub mod smtp;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use internal::InternalTransport;
pub use registry::TransportRegistry;
pub use smtp::SmtpTransport;
pub use transport::{RouteOutcome, RouteReport, Transport};

/// Default bound on waiting for a feed directory lock.
pub const DEFAULT_LOCK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
