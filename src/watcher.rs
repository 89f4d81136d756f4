//! Structure Watcher
//!
//! Fallback cleanup for hosts that can't call [`Lookup::unbind`] at the
//! right moment. The host forwards structural page changes into a channel;
//! a background task unbinds removed anchors and scans inserted markup.
//!
//! ```text
//! host mutation observer ──► mpsc::Sender<StructureChange> ──► task
//!                                                              ├── Removed  → elements_removed
//!                                                              └── Inserted → rescan
//! ```

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::binder::Lookup;
use crate::markup::ElementDescriptor;
use crate::page::ElementId;

/// Channel depth; senders wait when the task falls behind
const CHANNEL_CAPACITY: usize = 100;

/// Structural change reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureChange {
    /// Elements left the page
    Removed(Vec<ElementId>),
    /// New markup appeared
    Inserted(Vec<ElementDescriptor>),
}

/// Background task applying [`StructureChange`]s to a [`Lookup`]
pub struct StructureWatcher {
    tx: mpsc::Sender<StructureChange>,
    handle: JoinHandle<()>,
}

impl StructureWatcher {
    /// Spawn the task on the runtime the engine was built on
    pub fn spawn(lookup: Lookup) -> Self {
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
        let runtime = lookup.runtime().clone();
        let handle = runtime.spawn(async move {
            while let Some(change) = rx.recv().await {
                match change {
                    StructureChange::Removed(elements) => {
                        let removed = lookup.elements_removed(&elements);
                        debug!(removed, "Removed elements cleaned up");
                    }
                    StructureChange::Inserted(elements) => {
                        let report = lookup.rescan(&elements);
                        debug!(bound = report.bound.len(), "Inserted markup scanned");
                    }
                }
            }
        });
        Self { tx, handle }
    }

    pub fn sender(&self) -> mpsc::Sender<StructureChange> {
        self.tx.clone()
    }

    /// Queue a change; `false` once the task has stopped
    pub async fn notify(&self, change: StructureChange) -> bool {
        self.tx.send(change).await.is_ok()
    }

    /// Close the channel and wait for queued changes to be applied
    ///
    /// Clones from [`sender`](Self::sender) keep the task alive until dropped.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.handle.await;
    }
}
