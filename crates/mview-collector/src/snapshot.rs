//! Decoded scrape results and their atomic publication.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mview_codec::MetricKind;
use mview_types::WorkloadId;

/// One decoded metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
}

/// A fully decoded scrape: every workload's samples, plus scrape
/// statistics. Immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub scrape_count: u64,
    pub taken_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub scrape_duration: Duration,
    pub workloads: BTreeMap<WorkloadId, Vec<MetricSample>>,
}

impl Snapshot {
    pub fn num_samples(&self) -> usize {
        self.workloads.values().map(Vec::len).sum()
    }
}

mod duration_millis {
    use super::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Publication point between the scrape worker and export pullers.
///
/// The worker builds a complete snapshot and swaps it in; readers only
/// ever observe a fully formed one, or `None` before the first successful
/// scrape.
#[derive(Default)]
pub struct SnapshotStore {
    current: ArcSwapOption<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: Arc<Snapshot>) {
        self.current.store(Some(snapshot));
    }

    /// The last published snapshot, if any.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.current.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(count: u64) -> Snapshot {
        let mut workloads = BTreeMap::new();
        workloads.insert(
            WorkloadId::new("web"),
            vec![MetricSample {
                name: "reqs".to_string(),
                kind: MetricKind::Counter,
                value: 12.0,
            }],
        );
        Snapshot {
            scrape_count: count,
            taken_at: Utc::now(),
            scrape_duration: Duration::from_millis(3),
            workloads,
        }
    }

    #[test]
    fn test_store_empty_before_first_publish() {
        let store = SnapshotStore::new();
        assert!(store.latest().is_none());
    }

    #[test]
    fn test_publish_replaces_whole_snapshot() {
        let store = SnapshotStore::new();
        store.publish(Arc::new(snapshot(1)));
        store.publish(Arc::new(snapshot(2)));

        let latest = store.latest().unwrap();
        assert_eq!(latest.scrape_count, 2);
        assert_eq!(latest.num_samples(), 1);
    }

    #[test]
    fn test_old_reference_survives_publication() {
        let store = SnapshotStore::new();
        store.publish(Arc::new(snapshot(1)));
        let held = store.latest().unwrap();
        store.publish(Arc::new(snapshot(2)));
        assert_eq!(held.scrape_count, 1);
    }

    #[test]
    fn test_snapshot_serde() {
        let snap = snapshot(7);
        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scrape_count, 7);
        assert_eq!(back.scrape_duration, Duration::from_millis(3));
        assert_eq!(back.workloads.len(), 1);
    }
}
