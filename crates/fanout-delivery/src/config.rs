use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use fanout_routing::{InMemoryDirectory, Profile};
use fanout_store::ShardedPathResolver;
use fanout_types::path;

use crate::error::{DeliveryError, DeliveryResult};

/// Engine configuration, usually read from a TOML file.
///
/// Every field has a default, so an empty file is a valid configuration.
///
/// ```toml
/// store_root = "/feeds"
/// workers = 8
///
/// [shard]
/// depth = 2
/// width = 3
///
/// [topics]
/// discussion = ["smtp:moderators@example.org"]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanoutConfig {
    /// Root under which recipients' feeds are sharded.
    pub store_root: String,
    /// Root under which outgoing mail is queued.
    pub outbox_root: String,
    pub shard: ShardConfig,
    pub lock_timeout_ms: u64,
    /// Number of concurrent delivery workers.
    pub workers: usize,
    /// Per-topic event buffer.
    pub channel_capacity: usize,
    /// Topic delivery events are published on.
    pub topic: String,
    /// Topic marker -> notification addresses.
    pub topics: BTreeMap<String, Vec<String>>,
    /// Users and groups seeding an in-memory directory.
    pub directory: DirectoryConfig,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            store_root: "/feeds".into(),
            outbox_root: "/outbox".into(),
            shard: ShardConfig::default(),
            lock_timeout_ms: 5_000,
            workers: 4,
            channel_capacity: fanout_bus::DEFAULT_CHANNEL_CAPACITY,
            topic: "fanout/message/deliver".into(),
            topics: BTreeMap::new(),
            directory: DirectoryConfig::default(),
        }
    }
}

impl FanoutConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(file: impl AsRef<Path>) -> DeliveryResult<Self> {
        let text = std::fs::read_to_string(file.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> DeliveryResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| DeliveryError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DeliveryResult<()> {
        for (name, root) in [("store_root", &self.store_root), ("outbox_root", &self.outbox_root)] {
            path::validate(root).map_err(|e| DeliveryError::Config(format!("{name}: {e}")))?;
        }
        self.shard.resolver()?;
        if self.workers == 0 {
            return Err(DeliveryError::Config("workers must be at least 1".into()));
        }
        if self.channel_capacity == 0 {
            return Err(DeliveryError::Config("channel_capacity must be at least 1".into()));
        }
        if self.topic.trim().is_empty() {
            return Err(DeliveryError::Config("topic must not be empty".into()));
        }
        Ok(())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Shape of the shard path: `depth` segments of `width` hex characters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardConfig {
    pub depth: usize,
    pub width: usize,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            depth: ShardedPathResolver::DEFAULT_DEPTH,
            width: ShardedPathResolver::DEFAULT_WIDTH,
        }
    }
}

impl ShardConfig {
    pub fn resolver(&self) -> DeliveryResult<ShardedPathResolver> {
        ShardedPathResolver::new(self.depth, self.width).map_err(|e| DeliveryError::Config(e.to_string()))
    }
}

/// Static directory contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub users: BTreeMap<String, Profile>,
    pub groups: BTreeMap<String, Vec<String>>,
}

impl DirectoryConfig {
    pub fn to_directory(&self) -> InMemoryDirectory {
        let directory = InMemoryDirectory::new();
        for (user, profile) in &self.users {
            directory.add_user(user.clone(), profile.clone());
        }
        for (group, members) in &self.groups {
            directory.add_group(group.clone(), members.iter().cloned());
        }
        directory
    }
}
