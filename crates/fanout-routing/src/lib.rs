//! Route building for fanout delivery.
//!
//! A delivery attempt starts by turning an item's raw `to` addresses into a
//! [`RouteTable`], then passing that table through every registered
//! [`Router`], highest priority first. Routers rewrite the table: they may
//! remove routes they understand and append replacements, and must leave
//! every other route untouched.
//!
//! Route building is synchronous and single-threaded per attempt. A
//! [`RouteTable`] is never shared across threads.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use fanout_routing::{DedupRouter, RouterChain};
//! use fanout_types::{props, ContentItem, Route};
//!
//! let chain = RouterChain::new();
//! chain.register(Arc::new(DedupRouter));
//!
//! let item = ContentItem::at("/messages/m1").with(props::TO, "alice, alice, smtp:b@c.org");
//! let table = chain.build_routes(&item).unwrap();
//! assert_eq!(table.len(), 2);
//! assert!(table.contains(&Route::internal("alice")));
//! ```

pub mod chain;
pub mod directory;
pub mod error;
pub mod router;
pub mod routers;
pub mod table;

pub use chain::RouterChain;
pub use directory::{Directory, InMemoryDirectory, Profile};
pub use error::{DirectoryError, RoutingError, RoutingResult};
pub use router::Router;
pub use routers::{DedupRouter, GroupExpansionRouter, PreferenceRouter, TopicRouter};
pub use table::{RouteTable, Rewrite};
