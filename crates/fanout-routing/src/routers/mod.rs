//! Built-in routers.

pub mod dedup;
pub mod group;
pub mod preference;
pub mod topic;

pub use dedup::DedupRouter;
pub use group::GroupExpansionRouter;
pub use preference::PreferenceRouter;
pub use topic::TopicRouter;
