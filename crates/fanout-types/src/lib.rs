//! Foundation types for the fanout delivery engine.
//!
//! Every other fanout crate depends on `fanout-types`. It carries the value
//! types that flow through routing and delivery, and nothing that performs
//! I/O.
//!
//! # Key Types
//!
//! - [`Route`] -- a `(transport, recipient)` destination, built by [`parse_address`]
//! - [`ContentItem`] -- an addressable node of the hierarchical store
//! - [`PropertyValue`] -- typed value held in a content item's property map
//! - [`props`] -- well-known property names shared by producers and transports
//! - [`path`] -- helpers for `/`-separated store paths

pub mod error;
pub mod item;
pub mod path;
pub mod props;
pub mod route;

pub use error::TypeError;
pub use item::{ContentItem, PropertyValue};
pub use route::{parse_address, Route, DEFAULT_TRANSPORT};
