//! One ingestion worker: owns one broker consumer and one storage
//! connection, consumes a bounded batch, applies the alert filter and writes
//! the results.
//!
//! Shutdown is cooperative: the flag is checked only at loop boundaries, so
//! at most one in-flight message completes after the signal and no message is
//! ever half-processed.

use crate::alerts::Alert;
use crate::broker::{AlertSource, KafkaAlertSource};
use crate::config::IngestConfig;
use crate::features::FeatureBuilder;
use crate::filter::filter_alert;
use crate::spatial::SpatialIndex;
use crate::store::CatalogStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Progress is logged and the storage connection cycled every this many
/// messages.
pub const PROGRESS_BATCH: u64 = 1000;

#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerCounters {
    pub seen: u64,
    pub persisted: u64,
    pub ss_seen: u64,
}

impl WorkerCounters {
    pub fn merge(&mut self, other: WorkerCounters) {
        self.seen += other.seen;
        self.persisted += other.persisted;
        self.ss_seen += other.ss_seen;
    }
}

/// Open this worker's exclusive connections and run the consume loop. Either
/// connection failing is fatal to this worker only: it logs, returns zero
/// counters and is not respawned within the run.
pub async fn run_worker(
    worker_id: usize,
    config: IngestConfig,
    index: Arc<dyn SpatialIndex>,
    builder: Arc<dyn FeatureBuilder>,
    shutdown: Arc<AtomicBool>,
) -> WorkerCounters {
    let mut store = match CatalogStore::open(&config.db_path) {
        Ok(s) => s,
        Err(e) => {
            log::error!("worker {}: cannot open catalog store: {}", worker_id, e);
            return WorkerCounters::default();
        }
    };

    let mut source = match KafkaAlertSource::connect(&config.broker) {
        Ok(s) => s,
        Err(e) => {
            log::error!("worker {}: {}", worker_id, e);
            return WorkerCounters::default();
        }
    };

    let counters = consume(
        worker_id,
        &mut source,
        &mut store,
        index.as_ref(),
        builder.as_ref(),
        config.max_alerts,
        &shutdown,
    )
    .await;

    source.close().await;
    counters
}

/// The consume loop, separated from connection setup so tests can drive it
/// with an in-memory source.
pub async fn consume(
    worker_id: usize,
    source: &mut dyn AlertSource,
    store: &mut CatalogStore,
    index: &dyn SpatialIndex,
    builder: &dyn FeatureBuilder,
    max_alerts: u64,
    shutdown: &AtomicBool,
) -> WorkerCounters {
    let mut counters = WorkerCounters::default();
    let started = Instant::now();

    while counters.seen < max_alerts {
        if shutdown.load(Ordering::Relaxed) {
            log::info!("worker {}: shutdown requested, stopping cleanly", worker_id);
            break;
        }

        let payload = match source.poll(POLL_TIMEOUT).await {
            // Nothing pending within the timeout: caught up, end of run
            Ok(None) => {
                log::info!("worker {}: stream exhausted, ending run", worker_id);
                break;
            }
            Err(e) => {
                log::debug!("worker {}: message dropped: {}", worker_id, e);
                continue;
            }
            Ok(Some(p)) => p,
        };

        let alert: Alert = match serde_json::from_slice(&payload) {
            Ok(a) => a,
            Err(e) => {
                log::warn!("worker {}: undecodable alert skipped: {}", worker_id, e);
                continue;
            }
        };

        counters.seen += 1;
        let outcome = filter_alert(&alert, builder);

        if outcome.is_solar_system {
            counters.ss_seen += 1;
        }

        if let Some(row) = &outcome.row {
            // Solar-system detections are counted but kept out of the object
            // table to avoid flooding the catalog
            if !outcome.is_solar_system {
                let tile = index.tile_id(row.ra, row.dec);
                match store.upsert_object(row, tile) {
                    Ok(()) => counters.persisted += 1,
                    Err(e) => {
                        log::error!(
                            "worker {}: object insert failed for {}: {}",
                            worker_id,
                            row.object_id,
                            e
                        );
                    }
                }
            }
        }

        for ann in &outcome.annotations {
            if let Err(e) = store.replace_annotation(ann) {
                log::error!(
                    "worker {}: annotation insert failed for {}: {}",
                    worker_id,
                    ann.object_id,
                    e
                );
            }
        }

        if counters.seen % PROGRESS_BATCH == 0 {
            log::info!(
                "worker {}: seen {} persisted {} ss {} elapsed {:.1}s",
                worker_id,
                counters.seen,
                counters.persisted,
                counters.ss_seen,
                started.elapsed().as_secs_f64()
            );
            if let Err(e) = store.cycle() {
                log::error!("worker {}: storage connection cycle failed: {}", worker_id, e);
                break;
            }
        }
    }

    counters
}
