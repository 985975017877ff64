use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use mview_codec::MetricKind;
use mview_collector::{
    build_plan, contiguous_groups, distribute_groups, ClassifierRegistry, Collector,
    CollectorConfig, LogExporter, SnapshotStore,
};
use mview_proto::MetricRegistration;
use mview_rdma::{
    LoopbackTransport, MemoryRegionRegistry, OneSidedReader, QueuePairPool, RdmaConfig, Transport,
};
use mview_shm::{MetricRegistry, SharedPool};

/// End-to-end loopback demo: a producer registers metrics into a shared
/// pool and updates them in place while a collector scrapes the pool over
/// the loopback transport and logs snapshots.
#[derive(Parser, Debug)]
#[command(name = "mview-example", version, about)]
struct Args {
    /// Pool size in pages
    #[arg(long, default_value_t = 8)]
    pool_pages: usize,

    /// Page size in bytes
    #[arg(long, default_value_t = 4096)]
    page_size: usize,

    /// Memory region size in pages
    #[arg(long, default_value_t = 2)]
    mr_pages: usize,

    /// Scrape interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    scrape_interval_ms: u64,
}

/// Block until the process is asked to exit.
async fn shutdown_requested() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("ctrl-c, shutting down");
        }
        _ = term.recv() => {
            tracing::info!("sigterm, shutting down");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = mview_logging::init_logging(&mview_logging::LogConfig::default())?;

    tracing::info!(
        pool_pages = args.pool_pages,
        page_size = args.page_size,
        mr_pages = args.mr_pages,
        "Starting mview loopback example"
    );

    // Producer side: pool, registrations, in-place handles.
    let pool = SharedPool::new(
        "example",
        args.pool_pages * args.page_size,
        args.page_size,
    )?;
    let registry = MetricRegistry::new(pool.clone());

    let mut handles = Vec::new();
    for (workload, name, kind) in [
        ("frontend", "requests_total", MetricKind::Counter),
        ("frontend", "inflight", MetricKind::Gauge),
        ("checkout", "orders_total", MetricKind::Counter),
        ("checkout", "queue_depth", MetricKind::Gauge),
    ] {
        let location = registry.register(&MetricRegistration {
            workload_id: workload.into(),
            name: name.to_string(),
            kind,
            value: 0.0,
        })?;
        tracing::info!(workload, name, offset = location.value_byte_offset, "registered metric");
        handles.push(registry.handle(&location));
    }

    // Collector side: regions, queue pair, plan.
    let transport = Arc::new(LoopbackTransport::new());
    let mr_size = args.mr_pages * args.page_size;
    let regions = MemoryRegionRegistry::new(transport.clone(), pool, mr_size)?;
    let descriptors = regions.register_all()?;

    let rdma_config = RdmaConfig::default();
    let qp_pool = QueuePairPool::new(transport.clone(), &rdma_config)?;
    let peer = transport.create_queue_pair()?;
    let connected = qp_pool.connect(
        0,
        &mview_proto::QueuePairDescriptor {
            qp_num: peer,
            gid: transport.local_gid(),
        },
    )?;
    anyhow::ensure!(connected, "queue pair handshake failed");

    let collector_config = CollectorConfig {
        scrape_interval_ms: args.scrape_interval_ms,
        ..CollectorConfig::default()
    };
    let groups = contiguous_groups(
        &registry.geometry(),
        args.page_size,
        collector_config.max_group_size_bytes,
    );
    let channels = distribute_groups(groups, collector_config.num_channels);
    let plans = build_plan(&descriptors, mr_size, args.page_size, &channels)?;
    let plan = plans
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no pages to scrape"))?;

    let store = Arc::new(SnapshotStore::new());
    let collector = Collector::new(
        OneSidedReader::new(transport.clone(), rdma_config),
        qp_pool.connected(0)?,
        plan,
        Arc::new(ClassifierRegistry::default()),
        store.clone(),
        Arc::new(LogExporter),
        collector_config,
    );
    let collector = collector.spawn();

    // Keep the producer busy so snapshots change between scrapes.
    let producer = tokio::spawn(async move {
        let mut ticks = 0f64;
        loop {
            ticks += 1.0;
            for (i, handle) in handles.iter().enumerate() {
                if handle.set(ticks * (i + 1) as f64).is_err() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    });

    shutdown_requested().await?;

    producer.abort();
    collector.stop().await;
    regions.unregister_all()?;
    if let Some(snapshot) = store.latest() {
        tracing::info!(
            scrapes = snapshot.scrape_count,
            workloads = snapshot.workloads.len(),
            "final snapshot"
        );
    }
    tracing::info!("mview example shutting down");

    Ok(())
}
