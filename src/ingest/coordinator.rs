//! Ingestion coordinator: spawns the configured worker count, waits for all
//! of them, sums their counters and publishes one run summary.
//!
//! Workers share nothing mutable; each owns its broker consumer and storage
//! connection, and results come back through the join handles. A stuck
//! worker stalls the run on purpose: this is a bounded batch job, not a
//! long-lived service.

use crate::config::IngestConfig;
use crate::features::{FeatureBuilder, ZtfFeatureBuilder};
use crate::ingest::worker::{run_worker, WorkerCounters};
use crate::spatial::{GridIndex, SpatialIndex, TILE_DEPTH};
use crate::status::{nid_now, StatusPublisher};
use crate::store::CatalogStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run a full ingestion batch. Returns the process exit code: 0 when at
/// least one message was seen, 1 on zero throughput. Only a setup-level
/// failure (the status store itself unreachable) is an error.
pub async fn run_ingest(config: IngestConfig) -> Result<i32, Box<dyn std::error::Error>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_shutdown_listener(shutdown.clone());

    let index: Arc<dyn SpatialIndex> = Arc::new(GridIndex::new(TILE_DEPTH));
    let builder: Arc<dyn FeatureBuilder> = Arc::new(ZtfFeatureBuilder);

    log::info!("🚀 Starting ingest run");
    log::info!("   ├─ broker: {}", config.broker.host);
    log::info!("   ├─ topic: {}", config.broker.topic);
    log::info!("   ├─ group: {}", config.broker.group);
    log::info!("   ├─ max alerts per worker: {}", config.max_alerts);
    log::info!("   └─ workers: {}", config.workers);

    let mut handles = Vec::with_capacity(config.workers);
    for worker_id in 0..config.workers {
        handles.push(tokio::spawn(run_worker(
            worker_id,
            config.clone(),
            index.clone(),
            builder.clone(),
            shutdown.clone(),
        )));
    }

    let mut total = WorkerCounters::default();
    for (worker_id, handle) in handles.into_iter().enumerate() {
        match handle.await {
            Ok(counters) => total.merge(counters),
            Err(e) => log::error!("worker {} panicked: {}", worker_id, e),
        }
    }

    log::info!(
        "✅ Ingest finished: {} in, {} out, {} solar system",
        total.seen,
        total.persisted,
        total.ss_seen
    );

    // Status store unreachable is fatal to the whole run
    let store = CatalogStore::open(&config.db_path)?;
    let status = StatusPublisher::new(&store);
    status.add(
        &[
            ("today_filter", total.seen as i64),
            ("today_filter_out", total.persisted as i64),
            ("today_filter_ss", total.ss_seen as i64),
        ],
        nid_now(),
    )?;

    Ok(if total.seen > 0 { 0 } else { 1 })
}

/// Install the termination listener. SIGTERM or ctrl-c sets the shared flag;
/// workers observe it at their next loop boundary.
fn spawn_shutdown_listener(flag: Arc<AtomicBool>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        log::warn!("⚠️  Termination signal caught, requesting worker shutdown");
        flag.store(true, Ordering::Relaxed);
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate()).expect("cannot install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
