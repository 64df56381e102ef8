use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::traits::ContentStore;

/// Hands out privileged store sessions for cross-user delivery.
///
/// Delivery writes into other users' feeds, which the producing user cannot
/// do. Every such write goes through an [`AdminSession`] obtained here. The
/// session is a scoped resource: it is closed when dropped, so early returns
/// and errors cannot leak it. [`SessionFactory::open_sessions`] exposes the
/// number of live sessions for leak checks.
#[derive(Clone)]
pub struct SessionFactory {
    store: Arc<dyn ContentStore>,
    open: Arc<AtomicUsize>,
}

impl SessionFactory {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            store,
            open: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Open a privileged session. Closed when the returned guard drops.
    pub fn admin(&self) -> AdminSession {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(open, "admin session opened");
        AdminSession {
            store: Arc::clone(&self.store),
            open: Arc::clone(&self.open),
        }
    }

    /// Number of admin sessions not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

/// A privileged view of the store, closed on drop.
pub struct AdminSession {
    store: Arc<dyn ContentStore>,
    open: Arc<AtomicUsize>,
}

impl Deref for AdminSession {
    type Target = dyn ContentStore;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

impl Drop for AdminSession {
    fn drop(&mut self) {
        let open = self.open.fetch_sub(1, Ordering::SeqCst) - 1;
        trace!(open, "admin session closed");
    }
}
