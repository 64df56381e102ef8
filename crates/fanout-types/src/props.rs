//! Well-known property names.
//!
//! Producers set the addressing properties on the store-of-record item;
//! transports set the delivery properties on feed copies.

/// Raw destination address(es), comma-separated or multi-valued.
pub const TO: &str = "fanout:to";
pub const FROM: &str = "fanout:from";
/// User on whose behalf the item is delivered. Mandatory for delivery.
pub const ACTOR: &str = "fanout:actor";

pub const SEND_STATE: &str = "fanout:sendstate";
pub const SEND_STATE_PENDING: &str = "pending";
pub const SEND_STATE_NOTIFIED: &str = "notified";

/// Back-reference from a feed copy to the store-of-record path.
pub const PREVIOUS: &str = "fanout:previous";
/// Reserved for a higher-level retry policy; never incremented here.
pub const RETRY_COUNT: &str = "fanout:retries";

pub const MESSAGE_BOX: &str = "fanout:messagebox";
pub const BOX_INBOX: &str = "inbox";
pub const BOX_OUTBOX: &str = "outbox";

pub const READ: &str = "fanout:read";
pub const RECIPIENT: &str = "fanout:recipient";
/// Mail addresses collected for the smtp transport.
pub const MAIL_TO: &str = "fanout:mailto";

/// Transport the producer requires regardless of recipient preferences.
pub const TRANSPORT: &str = "fanout:transport";
/// Marker resolved into notification addresses by the topic router.
pub const TOPIC: &str = "fanout:topic";
