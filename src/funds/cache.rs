//! Process-wide holder of the current fund directory snapshot.
//!
//! Snapshots are published through a `watch` channel: readers clone the current
//! `Arc` under a short read guard and never wait on a refresh, which happens
//! entirely outside the channel. The store starts empty and becomes ready after
//! the first successful refresh.

use super::DirectorySnapshot;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Shared snapshot store. Clone-cheap (all `Arc`-wrapped internals).
#[derive(Clone)]
pub struct FundCache {
    rx: watch::Receiver<Option<Arc<DirectorySnapshot>>>,
    tx: Arc<watch::Sender<Option<Arc<DirectorySnapshot>>>>,
}

impl Default for FundCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FundCache {
    /// Create an empty (not yet ready) cache.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(None);
        Self {
            rx,
            tx: Arc::new(tx),
        }
    }

    /// Current snapshot, or `None` before the first successful refresh.
    pub fn get(&self) -> Option<Arc<DirectorySnapshot>> {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Install a new snapshot.
    ///
    /// Snapshots captured before the one currently held are rejected so that
    /// installs form a total order by `captured_at`. Returns whether the
    /// snapshot was installed.
    pub fn put(&self, snapshot: DirectorySnapshot) -> bool {
        let incoming = Arc::new(snapshot);
        let installed = self.tx.send_if_modified(|current| {
            if let Some(existing) = current
                && existing.captured_at() > incoming.captured_at()
            {
                return false;
            }
            *current = Some(Arc::clone(&incoming));
            true
        });

        if installed {
            debug!(
                funds = incoming.len(),
                captured_at = %incoming.captured_at(),
                "fund cache snapshot installed"
            );
        } else {
            warn!(
                captured_at = %incoming.captured_at(),
                "rejected fund snapshot older than the current one"
            );
        }
        installed
    }
}
