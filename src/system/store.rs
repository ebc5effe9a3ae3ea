//! Latest published snapshots, shared between the collector and readers.
//!
//! The collector swaps in a fresh `Arc<Snapshots>` per pass; readers clone
//! the `Arc` and never hold a lock while rendering.

use std::sync::Arc;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use tokio::sync::watch;

use super::process::ProcessRecord;
use super::snapshot::{CpuSnapshot, MemSnapshot, NetSnapshot, Snapshots};

#[derive(Debug)]
pub struct SnapshotStore {
    tx: watch::Sender<Arc<Snapshots>>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(Snapshots::default()));
        SnapshotStore { tx }
    }

    /// Replace the published snapshots and wake every reader.
    pub fn publish(&self, snapshots: Snapshots) -> u64 {
        let version = snapshots.version;
        self.tx.send_replace(Arc::new(snapshots));
        version
    }

    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            rx: self.tx.subscribe(),
        }
    }

    pub fn version(&self) -> u64 {
        self.tx.borrow().version
    }
}

/// Read-only handle on the store. Getters return deep copies.
#[derive(Clone, Debug)]
pub struct SnapshotReader {
    rx: watch::Receiver<Arc<Snapshots>>,
}

impl SnapshotReader {
    pub fn latest(&self) -> Arc<Snapshots> {
        Arc::clone(&self.rx.borrow())
    }

    pub fn version(&self) -> u64 {
        self.rx.borrow().version
    }

    pub fn cpu(&self) -> CpuSnapshot {
        self.rx.borrow().cpu.clone()
    }

    pub fn memory(&self) -> MemSnapshot {
        self.rx.borrow().mem.clone()
    }

    pub fn network(&self) -> NetSnapshot {
        self.rx.borrow().net.clone()
    }

    pub fn processes(&self) -> Vec<ProcessRecord> {
        self.rx.borrow().processes.clone()
    }

    /// Whether a version newer than the last one seen by this handle exists.
    pub fn has_changed(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait for the next publication and mark it seen.
    pub async fn changed(&mut self) -> Result<Arc<Snapshots>> {
        self.rx
            .changed()
            .await
            .wrap_err("snapshot store was dropped")?;
        Ok(Arc::clone(&self.rx.borrow_and_update()))
    }
}
