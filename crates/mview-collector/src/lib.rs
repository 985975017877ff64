//! Remote metric collection: page grouping, read planning, the scrape
//! loop, and snapshot publication.
//!
//! A collector owns one connected queue pair and a read plan derived from
//! the producer's page geometry. Every tick it reads the assigned pool
//! ranges, decodes them back into typed records using the control info,
//! runs per-workload classifiers, and atomically publishes a snapshot for
//! exporters to pull.

pub mod classifier;
pub mod collector;
pub mod config;
pub mod error;
pub mod exporter;
pub mod grouping;
pub mod plan;
pub mod snapshot;

pub use classifier::{Classifier, ClassifierModel, ClassifierRegistry};
pub use collector::{Collector, CollectorHandle};
pub use config::{CollectorConfig, TransportErrorPolicy};
pub use error::CollectorError;
pub use exporter::{InMemoryExporter, LogExporter, SnapshotExporter};
pub use grouping::{channel_pages, contiguous_groups, distribute_groups, PageGroup};
pub use plan::{build_plan, ChannelPlan, ReadTarget};
pub use snapshot::{MetricSample, Snapshot, SnapshotStore};
