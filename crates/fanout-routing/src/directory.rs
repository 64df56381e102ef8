//! User and group lookups consulted by routers.
//!
//! The directory is an external collaborator (user profiles and group
//! membership live elsewhere); routers only see the [`Directory`] trait.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;

/// Delivery preferences of one user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Transport the user prefers over `internal`, if any.
    #[serde(default)]
    pub preferred_transport: Option<String>,
    /// Delivery address per transport type (e.g. `smtp` -> mail address).
    #[serde(default)]
    pub addresses: BTreeMap<String, String>,
}

impl Profile {
    pub fn preferring(transport: impl Into<String>) -> Self {
        Self {
            preferred_transport: Some(transport.into()),
            addresses: BTreeMap::new(),
        }
    }

    pub fn with_address(mut self, transport: impl Into<String>, address: impl Into<String>) -> Self {
        self.addresses.insert(transport.into(), address.into());
        self
    }

    pub fn address(&self, transport: &str) -> Option<&str> {
        self.addresses.get(transport).map(String::as_str)
    }
}

/// Read access to users and groups.
///
/// `Ok(None)` means "not known here"; `Err` means the directory could not
/// answer.
pub trait Directory: Send + Sync {
    fn profile(&self, user: &str) -> Result<Option<Profile>, DirectoryError>;

    /// Direct members of a group; members may themselves be groups.
    fn group_members(&self, group: &str) -> Result<Option<Vec<String>>, DirectoryError>;
}

/// Map-backed directory for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    profiles: RwLock<HashMap<String, Profile>>,
    groups: RwLock<HashMap<String, Vec<String>>>,
    failing: RwLock<HashSet<String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: impl Into<String>, profile: Profile) {
        if let Ok(mut profiles) = self.profiles.write() {
            profiles.insert(user.into(), profile);
        }
    }

    pub fn add_group<I, S>(&self, group: impl Into<String>, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut groups) = self.groups.write() {
            groups.insert(group.into(), members.into_iter().map(Into::into).collect());
        }
    }

    /// Make every lookup of `name` (user or group) fail.
    pub fn fail_lookups_for(&self, name: impl Into<String>) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(name.into());
        }
    }

    fn check(&self, name: &str) -> Result<(), DirectoryError> {
        let failing = self
            .failing
            .read()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        if failing.contains(name) {
            return Err(DirectoryError::Unavailable(format!("lookup of {name} failed")));
        }
        Ok(())
    }
}

impl Directory for InMemoryDirectory {
    fn profile(&self, user: &str) -> Result<Option<Profile>, DirectoryError> {
        self.check(user)?;
        let profiles = self
            .profiles
            .read()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        Ok(profiles.get(user).cloned())
    }

    fn group_members(&self, group: &str) -> Result<Option<Vec<String>>, DirectoryError> {
        self.check(group)?;
        let groups = self
            .groups
            .read()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        Ok(groups.get(group).cloned())
    }
}
