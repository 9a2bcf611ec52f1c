//! Registry poller: fetches an incremental window or the full snapshot,
//! diffs it against the local mirror and triggers the crossmatch engine for
//! every genuinely new entry.
//!
//! Each entry commits independently; a crash mid-run leaves the mirror and
//! hit tables consistent up to the last entry and an incremental re-run is
//! safe afterwards.

use crate::config::FetchWindow;
use crate::registry::crossmatch::crossmatch;
use crate::registry::fetch::RegistryFetcher;
use crate::registry::types::sanitize_entry;
use crate::spatial::SpatialIndex;
use crate::store::CatalogStore;

#[derive(Debug, Default, Clone, Copy)]
pub struct PollReport {
    pub added: u64,
    pub changed: u64,
    pub hits: u64,
}

pub async fn poll_registry(
    store: &CatalogStore,
    fetcher: &dyn RegistryFetcher,
    index: &dyn SpatialIndex,
    window: &FetchWindow,
    radius_arcsec: f64,
) -> Result<PollReport, Box<dyn std::error::Error>> {
    let doing_all = matches!(window, FetchWindow::All);

    if doing_all {
        log::warn!("⚠️  Full rebuild: clearing mirror, regions and hits");
        store.clear_watch_state()?;
        store.truncate_mirror()?;
    }

    let rows = fetcher.fetch(window).await?;

    let mut report = PollReport::default();
    for raw in &rows {
        let entry = match sanitize_entry(raw, index) {
            Some(e) => e,
            None => continue,
        };

        // No point looking the row up when the mirror was just truncated
        let existing = if doing_all {
            None
        } else {
            store.mirror_prefix(&entry.name)?
        };

        match existing {
            Some(prefix) if prefix != entry.name_prefix => {
                // Reclassified upstream: replace the mirror row, but the
                // region's matches are immutable so no second crossmatch
                if let Err(e) = store.replace_mirror_entry(&entry) {
                    log::error!("mirror update failed for {}: {}", entry.name, e);
                    continue;
                }
                log::info!("object {} has been updated", entry.name);
                report.changed += 1;
            }
            Some(_) => {}
            None => {
                if let Err(e) = store.replace_mirror_entry(&entry) {
                    log::error!("mirror insert failed for {}: {}", entry.name, e);
                    continue;
                }
                match crossmatch(store, index, &entry.name, entry.ra, entry.decl, radius_arcsec) {
                    Ok(n) => report.hits += n as u64,
                    Err(e) => log::error!("crossmatch failed for {}: {}", entry.name, e),
                }
                report.added += 1;

                if doing_all {
                    if report.added % 1000 == 0 {
                        log::info!("{} rows mirrored", report.added);
                    }
                } else {
                    log::info!("object {} has been added", entry.name);
                }
            }
        }
    }

    log::info!(
        "total rows added = {}, modified = {}",
        report.added,
        report.changed
    );
    Ok(report)
}
