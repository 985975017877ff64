//! The scrape loop: read, decode, classify, publish.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use mview_codec::decode_page;
use mview_rdma::OneSidedReader;
use mview_types::{QpNum, WorkloadId};

use crate::classifier::ClassifierRegistry;
use crate::config::{CollectorConfig, TransportErrorPolicy};
use crate::error::CollectorError;
use crate::exporter::SnapshotExporter;
use crate::plan::ChannelPlan;
use crate::snapshot::{MetricSample, Snapshot, SnapshotStore};

/// One collector worker: owns a connected queue pair and the read plan
/// for its channel. Several collectors may run in parallel over disjoint
/// plans; they share nothing but the transport.
pub struct Collector {
    reader: OneSidedReader,
    qp: QpNum,
    plan: ChannelPlan,
    classifiers: Arc<ClassifierRegistry>,
    store: Arc<SnapshotStore>,
    exporter: Arc<dyn SnapshotExporter>,
    config: CollectorConfig,
    scrapes: AtomicU64,
    failed_scrapes: AtomicU64,
}

impl Collector {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: OneSidedReader,
        qp: QpNum,
        plan: ChannelPlan,
        classifiers: Arc<ClassifierRegistry>,
        store: Arc<SnapshotStore>,
        exporter: Arc<dyn SnapshotExporter>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            reader,
            qp,
            plan,
            classifiers,
            store,
            exporter,
            config,
            scrapes: AtomicU64::new(0),
            failed_scrapes: AtomicU64::new(0),
        }
    }

    /// `(successful, failed)` tick counts so far.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.scrapes.load(Ordering::Relaxed),
            self.failed_scrapes.load(Ordering::Relaxed),
        )
    }

    /// One scrape: read every target, decode against the plan's control
    /// info, classify, publish, export. Nothing is published on error.
    pub async fn tick(&self) -> Result<(), CollectorError> {
        let started = Instant::now();
        let descriptors = self.plan.descriptors();
        let results = self.reader.execute(self.qp, &descriptors).await?;

        let mut workloads: BTreeMap<WorkloadId, Vec<MetricSample>> = BTreeMap::new();
        for (target, bytes) in self.plan.targets.iter().zip(&results) {
            let mut cursor = 0usize;
            for page in &target.pages {
                let end = cursor + page.page_size_bytes;
                if end > bytes.len() {
                    return Err(CollectorError::GeometryMismatch(format!(
                        "read of {} returned {} bytes, control info expects at least {end}",
                        target.descriptor.name,
                        bytes.len()
                    )));
                }
                let records = decode_page(&bytes[cursor..end], page.occupancy)?;
                let samples = workloads.entry(page.workload_id.clone()).or_default();
                samples.extend(records.into_iter().map(|r| MetricSample {
                    name: r.name,
                    kind: r.kind,
                    value: r.value,
                }));
                cursor = end;
            }
        }

        for (workload, samples) in &workloads {
            let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
            self.classifiers.classify(workload, &values);
        }

        let scrape_count = self.scrapes.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = Arc::new(Snapshot {
            scrape_count,
            taken_at: chrono::Utc::now(),
            scrape_duration: started.elapsed(),
            workloads,
        });
        self.store.publish(snapshot.clone());
        self.exporter.export(snapshot).await?;
        Ok(())
    }

    /// Run the scrape loop on its own task until stopped.
    pub fn spawn(self) -> CollectorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let stop_timeout = self.config.stop_timeout();
        let channel = self.plan.channel;

        let join = tokio::spawn(async move {
            tracing::info!(
                channel = %channel,
                targets = self.plan.targets.len(),
                pages = self.plan.num_pages(),
                "collector started"
            );
            loop {
                if *stop_rx.borrow() {
                    break;
                }
                let pause = match self.tick().await {
                    Ok(()) => self.config.scrape_interval(),
                    Err(e) => {
                        self.failed_scrapes.fetch_add(1, Ordering::Relaxed);
                        match self.config.on_transport_error {
                            TransportErrorPolicy::Backoff => {
                                tracing::error!(channel = %channel, error = %e, "scrape failed, backing off");
                                self.config.backoff()
                            }
                            TransportErrorPolicy::Terminate => {
                                tracing::error!(channel = %channel, error = %e, "scrape failed, terminating");
                                break;
                            }
                        }
                    }
                };
                if wait_or_stop(&mut stop_rx, pause).await {
                    break;
                }
            }

            let (scrapes, failed) = self.stats();
            tracing::info!(channel = %channel, scrapes, failed, "collector stopped");
        });

        CollectorHandle {
            stop: stop_tx,
            join,
            stop_timeout,
        }
    }
}

async fn wait_or_stop(stop: &mut watch::Receiver<bool>, pause: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(pause) => false,
        _ = stop.changed() => true,
    }
}

/// Controls a spawned collector worker.
pub struct CollectorHandle {
    stop: watch::Sender<bool>,
    join: JoinHandle<()>,
    stop_timeout: Duration,
}

impl CollectorHandle {
    /// Signal the worker and wait for it to finish its current tick. The
    /// worker is aborted if it does not stop within the configured
    /// timeout.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if tokio::time::timeout(self.stop_timeout, self.join)
            .await
            .is_err()
        {
            tracing::warn!("collector did not stop in time, aborting");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ThresholdClassifier;
    use crate::exporter::InMemoryExporter;
    use crate::grouping::{contiguous_groups, distribute_groups};
    use crate::plan::build_plan;
    use mview_codec::MetricKind;
    use mview_proto::{MetricLocation, MetricRegistration};
    use mview_rdma::{LoopbackTransport, MemoryRegionRegistry, RdmaConfig, Transport};
    use mview_shm::{MetricRegistry, SharedPool};

    const PAGE: usize = 4096;

    struct Rig {
        registry: MetricRegistry,
        locations: Vec<MetricLocation>,
        transport: Arc<LoopbackTransport>,
        classifiers: Arc<ClassifierRegistry>,
        exporter: Arc<InMemoryExporter>,
        store: Arc<SnapshotStore>,
        collector: Collector,
    }

    fn register(registry: &MetricRegistry, workload: &str, name: &str, value: f64) -> MetricLocation {
        registry
            .register(&MetricRegistration {
                workload_id: workload.into(),
                name: name.to_string(),
                kind: MetricKind::Gauge,
                value,
            })
            .unwrap()
    }

    fn rig(config: CollectorConfig) -> Rig {
        let pool = SharedPool::new("rig", 4 * PAGE, PAGE).unwrap();
        let registry = MetricRegistry::new(pool.clone());
        let locations = vec![
            register(&registry, "web", "inflight", 3.0),
            register(&registry, "web", "queue_depth", 7.0),
            register(&registry, "db", "connections", 11.0),
        ];

        let transport = Arc::new(LoopbackTransport::new());
        let mr_size = 2 * PAGE;
        let regions =
            MemoryRegionRegistry::new(transport.clone(), pool, mr_size).unwrap();
        let descriptors = regions.register_all().unwrap();

        let groups = contiguous_groups(&registry.geometry(), PAGE, config.max_group_size_bytes);
        let channels = distribute_groups(groups, config.num_channels);
        let plans = build_plan(&descriptors, mr_size, PAGE, &channels).unwrap();
        assert_eq!(plans.len(), 1);

        let qp = transport.create_queue_pair().unwrap();
        let reader = OneSidedReader::new(
            transport.clone(),
            RdmaConfig {
                poll_interval_ms: 1,
                read_timeout_ms: 20,
                ..RdmaConfig::default()
            },
        );

        let classifiers = Arc::new(ClassifierRegistry::default());
        let exporter = Arc::new(InMemoryExporter::new());
        let store = Arc::new(SnapshotStore::new());
        let collector = Collector::new(
            reader,
            qp,
            plans.into_iter().next().unwrap(),
            classifiers.clone(),
            store.clone(),
            exporter.clone(),
            config,
        );
        Rig {
            registry,
            locations,
            transport,
            classifiers,
            exporter,
            store,
            collector,
        }
    }

    #[tokio::test]
    async fn test_tick_decodes_all_workloads() {
        let r = rig(CollectorConfig::default());
        r.collector.tick().await.unwrap();

        let snapshot = r.store.latest().unwrap();
        assert_eq!(snapshot.scrape_count, 1);
        assert_eq!(snapshot.workloads.len(), 2);

        let web = &snapshot.workloads[&WorkloadId::new("web")];
        assert_eq!(web.len(), 2);
        assert_eq!(web[0].name, "inflight");
        assert_eq!(web[0].value, 3.0);
        assert_eq!(web[1].value, 7.0);
        let db = &snapshot.workloads[&WorkloadId::new("db")];
        assert_eq!(db[0].value, 11.0);

        assert_eq!(r.exporter.len(), 1);
    }

    #[tokio::test]
    async fn test_tick_sees_in_place_updates() {
        let r = rig(CollectorConfig::default());
        r.collector.tick().await.unwrap();

        r.registry.handle(&r.locations[0]).set(42.0).unwrap();
        r.collector.tick().await.unwrap();

        let snapshot = r.store.latest().unwrap();
        assert_eq!(snapshot.scrape_count, 2);
        let web = &snapshot.workloads[&WorkloadId::new("web")];
        assert_eq!(web[0].name, "inflight");
        assert_eq!(web[0].value, 42.0);
        assert_eq!(web[1].value, 7.0);
    }

    #[tokio::test]
    async fn test_failed_tick_publishes_nothing() {
        let r = rig(CollectorConfig::default());
        r.collector.tick().await.unwrap();
        let before = r.store.latest().unwrap();

        r.transport.fail_next_read();
        assert!(r.collector.tick().await.is_err());

        let after = r.store.latest().unwrap();
        assert_eq!(after.scrape_count, before.scrape_count);
        assert_eq!(r.exporter.len(), 1);
        assert_eq!(r.collector.stats(), (1, 0));
    }

    #[tokio::test]
    async fn test_classifier_receives_value_vectors() {
        let r = rig(CollectorConfig::default());
        let threshold = Arc::new(ThresholdClassifier::new(5.0));
        r.classifiers.register("web".into(), threshold.clone());

        r.collector.tick().await.unwrap();
        // web carries values 3.0 and 7.0; one is over the threshold.
        assert_eq!(threshold.anomalies(), 1);
    }

    #[tokio::test]
    async fn test_spawn_scrapes_until_stopped() {
        let config = CollectorConfig {
            scrape_interval_ms: 1,
            ..CollectorConfig::default()
        };
        let r = rig(config);
        let exporter = r.exporter.clone();
        let handle = r.collector.spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;

        assert!(exporter.len() >= 2);
        let seen = exporter.exported();
        assert!(seen.windows(2).all(|w| w[0].scrape_count < w[1].scrape_count));
    }

    #[tokio::test]
    async fn test_backoff_policy_keeps_loop_alive() {
        let config = CollectorConfig {
            scrape_interval_ms: 1,
            backoff_ms: 1,
            ..CollectorConfig::default()
        };
        let r = rig(config);
        r.transport.fail_next_read();
        let store = r.store.clone();
        let handle = r.collector.spawn();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        handle.stop().await;

        // The failed first tick was ridden out; later ticks published.
        assert!(store.latest().is_some());
    }

    #[tokio::test]
    async fn test_terminate_policy_stops_loop() {
        let config = CollectorConfig {
            scrape_interval_ms: 1,
            on_transport_error: TransportErrorPolicy::Terminate,
            ..CollectorConfig::default()
        };
        let r = rig(config);
        r.transport.hold_completions(true);
        let store = r.store.clone();
        let handle = r.collector.spawn();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished());
        assert!(store.latest().is_none());
        handle.stop().await;
    }
}
