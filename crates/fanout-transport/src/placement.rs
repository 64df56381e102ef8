use std::time::Duration;

use tracing::debug;

use fanout_store::{AdminSession, LockManager, SessionFactory};
use fanout_types::{path, props, ContentItem};

use crate::error::{TransportError, TransportResult};

/// Result of placing a copy at a target path.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Placed {
    Created,
    Existing,
}

/// Idempotent, lock-guarded copy of an item to a derived target path.
///
/// The sequence is: existence check, create missing shard directories,
/// lock the target's parent, re-check, create the parent, write the
/// annotated copy, unlock. Every directory is created under a lock keyed by
/// its own path, so placements racing for a shared shard directory create
/// it exactly once and the loser of a race on the same target sees the
/// winner's copy. At most one lock is held at a time.
#[derive(Clone)]
pub(crate) struct Placement {
    sessions: SessionFactory,
    locks: LockManager,
    lock_timeout: Duration,
}

impl Placement {
    pub(crate) fn new(sessions: SessionFactory, locks: LockManager, lock_timeout: Duration) -> Self {
        Self {
            sessions,
            locks,
            lock_timeout,
        }
    }

    pub(crate) fn set_lock_timeout(&mut self, lock_timeout: Duration) {
        self.lock_timeout = lock_timeout;
    }

    /// Copy `source` to `target`, letting `annotate` add delivery
    /// properties before the single write.
    pub(crate) async fn place<F>(
        &self,
        source: &ContentItem,
        target: &str,
        annotate: F,
    ) -> TransportResult<Placed>
    where
        F: FnOnce(&mut ContentItem) + Send,
    {
        let store = self.sessions.admin();
        if store.exists(target)? {
            return Ok(Placed::Existing);
        }

        let parent = path::parent(target).ok_or_else(|| TransportError::NoParent(target.to_string()))?;
        self.create_ancestors(&store, parent).await?;
        let _lock = self.locks.acquire(parent, self.lock_timeout).await?;

        if store.exists(target)? {
            return Ok(Placed::Existing);
        }
        if store.create_node(parent)? {
            debug!(path = parent, "created feed directory");
        }

        let mut copy = source.relocate(target, path::name(target));
        copy.remove(props::SEND_STATE);
        copy.remove(props::RETRY_COUNT);
        copy.set(props::PREVIOUS, source.path());
        annotate(&mut copy);
        store.put(&copy)?;
        Ok(Placed::Created)
    }

    /// Create the missing ancestors of `dir`, root first, each under its own
    /// lock.
    async fn create_ancestors(&self, store: &AdminSession, dir: &str) -> TransportResult<()> {
        for ancestor in path::ancestors(dir) {
            if store.exists(ancestor)? {
                continue;
            }
            let _lock = self.locks.acquire(ancestor, self.lock_timeout).await?;
            if store.create_node(ancestor)? {
                debug!(path = ancestor, "created shard directory");
            }
        }
        Ok(())
    }
}

/// Reject recipients that cannot be used as a single path segment.
pub(crate) fn check_segment(recipient: &str) -> TransportResult<()> {
    let reason = if recipient.is_empty() {
        "empty"
    } else if recipient.contains('/') {
        "contains '/'"
    } else if recipient == "." || recipient == ".." {
        "relative segment"
    } else {
        return Ok(());
    };
    Err(TransportError::InvalidRecipient {
        recipient: recipient.to_string(),
        reason: reason.to_string(),
    })
}
