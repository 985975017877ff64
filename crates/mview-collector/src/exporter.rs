//! Export seam: where published snapshots leave the process.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::CollectorError;
use crate::snapshot::Snapshot;

/// Receives every snapshot the scrape loop publishes.
#[async_trait]
pub trait SnapshotExporter: Send + Sync {
    async fn export(&self, snapshot: Arc<Snapshot>) -> Result<(), CollectorError>;
}

/// Logs a one-line summary per snapshot.
pub struct LogExporter;

#[async_trait]
impl SnapshotExporter for LogExporter {
    async fn export(&self, snapshot: Arc<Snapshot>) -> Result<(), CollectorError> {
        tracing::info!(
            scrape = snapshot.scrape_count,
            workloads = snapshot.workloads.len(),
            samples = snapshot.num_samples(),
            duration_ms = snapshot.scrape_duration.as_millis() as u64,
            "snapshot"
        );
        Ok(())
    }
}

/// Buffers every snapshot; the assertion surface for integration tests.
#[derive(Default)]
pub struct InMemoryExporter {
    exported: Mutex<Vec<Arc<Snapshot>>>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exported(&self) -> Vec<Arc<Snapshot>> {
        self.exported.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.exported.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotExporter for InMemoryExporter {
    async fn export(&self, snapshot: Arc<Snapshot>) -> Result<(), CollectorError> {
        self.exported.lock().push(snapshot);
        Ok(())
    }
}
