use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use fanout_types::{path, ContentItem, PropertyValue};

use crate::error::{StoreError, StoreResult};
use crate::traits::ContentStore;

/// In-memory, `BTreeMap`-based content store.
///
/// Intended for tests and embedding. Nodes are kept in path order behind a
/// `RwLock`, which makes child listing a range scan. Items are cloned on
/// read and write.
///
/// Writes under a path registered with [`InMemoryContentStore::fail_writes_under`]
/// return [`StoreError::Unavailable`], which lets tests exercise backend
/// failures.
pub struct InMemoryContentStore {
    nodes: RwLock<BTreeMap<String, ContentItem>>,
    failing: RwLock<Vec<String>>,
    nodes_created: AtomicUsize,
}

impl InMemoryContentStore {
    /// Create a store holding only the root node.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), ContentItem::new("/", ""));
        Self {
            nodes: RwLock::new(nodes),
            failing: RwLock::new(Vec::new()),
            nodes_created: AtomicUsize::new(0),
        }
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.read().map(|n| n.len()).unwrap_or(0)
    }

    /// Returns `true` if only the root exists.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Total number of nodes created by [`ContentStore::create_node`].
    pub fn nodes_created(&self) -> usize {
        self.nodes_created.load(Ordering::SeqCst)
    }

    /// Make every subsequent write at or below `prefix` fail.
    pub fn fail_writes_under(&self, prefix: impl Into<String>) {
        if let Ok(mut failing) = self.failing.write() {
            failing.push(prefix.into());
        }
    }

    /// Every node path at or below `prefix`, sorted.
    pub fn paths_under(&self, prefix: &str) -> Vec<String> {
        let Ok(nodes) = self.nodes.read() else {
            return Vec::new();
        };
        nodes
            .keys()
            .filter(|p| is_at_or_below(p, prefix))
            .cloned()
            .collect()
    }

    fn check_writable(&self, target: &str) -> StoreResult<()> {
        let failing = self
            .failing
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        if failing.iter().any(|prefix| is_at_or_below(target, prefix)) {
            return Err(StoreError::Unavailable {
                path: target.to_string(),
                reason: "writes disabled".into(),
            });
        }
        Ok(())
    }

    fn require_parent(nodes: &BTreeMap<String, ContentItem>, target: &str) -> StoreResult<()> {
        match path::parent(target) {
            Some(parent) if !nodes.contains_key(parent) => {
                Err(StoreError::NotFound(parent.to_string()))
            }
            _ => Ok(()),
        }
    }
}

fn is_at_or_below(candidate: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    candidate == prefix
        || prefix.is_empty()
        || candidate
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for InMemoryContentStore {
    fn get(&self, target: &str) -> StoreResult<Option<ContentItem>> {
        let nodes = self
            .nodes
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(nodes.get(target).cloned())
    }

    fn exists(&self, target: &str) -> StoreResult<bool> {
        let nodes = self
            .nodes
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(nodes.contains_key(target))
    }

    fn put(&self, item: &ContentItem) -> StoreResult<()> {
        path::validate(item.path())?;
        self.check_writable(item.path())?;
        let mut nodes = self
            .nodes
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Self::require_parent(&nodes, item.path())?;
        nodes.insert(item.path().to_string(), item.clone());
        Ok(())
    }

    fn create_node(&self, target: &str) -> StoreResult<bool> {
        path::validate(target)?;
        self.check_writable(target)?;
        let mut nodes = self
            .nodes
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        if nodes.contains_key(target) {
            return Ok(false);
        }
        for ancestor in path::ancestors(target) {
            if !nodes.contains_key(ancestor) {
                nodes.insert(ancestor.to_string(), ContentItem::at(ancestor));
                self.nodes_created.fetch_add(1, Ordering::SeqCst);
            }
        }
        nodes.insert(target.to_string(), ContentItem::at(target));
        self.nodes_created.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn set_property(&self, target: &str, name: &str, value: PropertyValue) -> StoreResult<()> {
        self.check_writable(target)?;
        let mut nodes = self
            .nodes
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        let item = nodes
            .get_mut(target)
            .ok_or_else(|| StoreError::NotFound(target.to_string()))?;
        item.set(name, value);
        Ok(())
    }

    fn children(&self, target: &str) -> StoreResult<Vec<String>> {
        let nodes = self
            .nodes
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        if !nodes.contains_key(target) {
            return Err(StoreError::NotFound(target.to_string()));
        }
        let prefix = if target == "/" {
            "/".to_string()
        } else {
            format!("{target}/")
        };
        Ok(nodes
            .range(prefix.clone()..)
            .take_while(|(p, _)| p.starts_with(&prefix))
            .filter(|(p, _)| p.len() > prefix.len() && !p[prefix.len()..].contains('/'))
            .map(|(p, _)| p.clone())
            .collect())
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContentStore")
            .field("node_count", &self.len())
            .field("nodes_created", &self.nodes_created())
            .finish()
    }
}
