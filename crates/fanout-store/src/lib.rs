//! Hierarchical content storage for fanout delivery.
//!
//! The store itself is an external collaborator: this crate defines the
//! narrow [`ContentStore`] contract the engine consumes, an in-memory
//! backend, and the pieces delivery needs on top of it.
//!
//! # Components
//!
//! - [`ContentStore`] -- path-addressed item storage with parent/child navigation
//! - [`InMemoryContentStore`] -- `BTreeMap`-backed store for tests and embedding
//! - [`ShardedPathResolver`] -- bounded fan-out paths derived from opaque ids
//! - [`LockManager`] -- named, timeout-bounded locks keyed by store path
//! - [`SessionFactory`] / [`AdminSession`] -- scoped privileged store access
//!
//! # Rules
//!
//! 1. Every mutating step on a shared target path runs under a [`LockGuard`]
//!    for that path.
//! 2. Locks and admin sessions are released by `Drop`, on every exit path.
//! 3. Shard paths are pure functions of the id, so existence checks can
//!    short-circuit repeated deliveries.

pub mod error;
pub mod lock;
pub mod memory;
pub mod session;
pub mod shard;
pub mod traits;

pub use error::{LockError, StoreError, StoreResult};
pub use lock::{LockGuard, LockManager};
pub use memory::InMemoryContentStore;
pub use session::{AdminSession, SessionFactory};
pub use shard::ShardedPathResolver;
pub use traits::ContentStore;
