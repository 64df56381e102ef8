use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::error::LockError;

/// Shared lock table: held lock names mapped to the token of their holder.
struct LockTable {
    held: Mutex<HashMap<String, u64>>,
    next_token: AtomicU64,
    released: Notify,
}

impl LockTable {
    fn held(&self) -> Result<MutexGuard<'_, HashMap<String, u64>>, LockError> {
        self.held.lock().map_err(|_| LockError::Poisoned)
    }

    /// Release `name` if it is still held by `token`.
    ///
    /// Runs from `Drop`, so a poisoned table is recovered rather than
    /// reported: a lock must never stay held because another holder panicked.
    fn release(&self, name: &str, token: u64) {
        let mut held = match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if held.get(name) == Some(&token) {
            held.remove(name);
            drop(held);
            debug!(lock = name, "lock released");
            self.released.notify_waiters();
        }
    }
}

/// Named, timeout-bounded mutual exclusion for writers sharing store paths.
///
/// Locks are keyed by an arbitrary name, normally the store path being
/// mutated. Acquisition returns a [`LockGuard`] that releases the lock when
/// dropped, so every exit path (success, `?` propagation, panic unwinding)
/// gives the lock back.
///
/// The manager is cheap to clone; clones share one lock table.
#[derive(Clone)]
pub struct LockManager {
    table: Arc<LockTable>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table: Arc::new(LockTable {
                held: Mutex::new(HashMap::new()),
                next_token: AtomicU64::new(1),
                released: Notify::new(),
            }),
        }
    }

    /// Take the lock if it is free, without waiting.
    pub fn try_acquire(&self, name: &str) -> Result<Option<LockGuard>, LockError> {
        let mut held = self.table.held()?;
        if held.contains_key(name) {
            return Ok(None);
        }
        let token = self.table.next_token.fetch_add(1, Ordering::Relaxed);
        held.insert(name.to_string(), token);
        Ok(Some(LockGuard {
            name: name.to_string(),
            token,
            table: Arc::clone(&self.table),
        }))
    }

    /// Wait up to `timeout` for the named lock.
    pub async fn acquire(&self, name: &str, timeout: Duration) -> Result<LockGuard, LockError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register for the release notification before checking, so a
            // release between the check and the wait is not missed.
            let notified = self.table.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(guard) = self.try_acquire(name)? {
                debug!(lock = name, "lock acquired");
                return Ok(guard);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                warn!(lock = name, timeout_ms = timeout.as_millis() as u64, "lock acquire timed out");
                return Err(LockError::Timeout {
                    name: name.to_string(),
                    waited: timeout,
                });
            }
        }
    }

    /// Release a lock explicitly. Equivalent to dropping the guard.
    pub fn release(&self, lock: LockGuard) {
        drop(lock);
    }

    /// Release every held lock, returning how many were released.
    ///
    /// Used at the end of a batch delivery run. Guards still alive after
    /// this call become inert: dropping them does not release a lock taken
    /// by a later holder.
    pub fn clear_all(&self) -> usize {
        let cleared = {
            let mut held = match self.table.held.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let n = held.len();
            held.clear();
            n
        };
        if cleared > 0 {
            debug!(count = cleared, "cleared all locks");
        }
        self.table.released.notify_waiters();
        cleared
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.table
            .held()
            .map(|held| held.contains_key(name))
            .unwrap_or(false)
    }

    /// Number of locks currently held.
    pub fn held_count(&self) -> usize {
        self.table.held().map(|held| held.len()).unwrap_or(0)
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("held", &self.held_count())
            .finish()
    }
}

/// A held named lock. Released on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    name: String,
    token: u64,
    table: Arc<LockTable>,
}

impl LockGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.table.release(&self.name, self.token);
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("name", &self.name).finish()
    }
}
