//! Crossmatch engine: registers a monitored region for one registry entry
//! and records every catalog object within the radius.
//!
//! The caller guarantees idempotency by invoking this only for genuinely new
//! entries; a region's matches are a snapshot, never refreshed.

use crate::spatial::SpatialIndex;
use crate::store::CatalogStore;

/// Planar small-angle separation in degrees. Fine at arcsecond scales away
/// from the poles.
pub fn angular_separation(ra1: f64, de1: f64, ra2: f64, de2: f64) -> f64 {
    let dra = (ra1 - ra2) * de1.to_radians().cos();
    let dde = de1 - de2;
    (dra * dra + dde * dde).sqrt()
}

/// Create one region around (ra, decl) and write a hit for every catalog
/// object whose true separation is within `radius_arcsec`. The tile query is
/// a coarse pre-filter and intentionally looser than the radius. Returns the
/// number of hits written; a single failed hit is logged and skipped.
pub fn crossmatch(
    store: &CatalogStore,
    index: &dyn SpatialIndex,
    name: &str,
    ra: f64,
    decl: f64,
    radius_arcsec: f64,
) -> rusqlite::Result<usize> {
    let region_id = store.insert_region(name, ra, decl)?;

    let tiles = index.circle_tiles(ra, decl, radius_arcsec);
    let candidates = store.objects_in_tiles(&tiles)?;

    let mut hits = 0;
    for obj in &candidates {
        let arcsec = 3600.0 * angular_separation(ra, decl, obj.ramean, obj.decmean);
        if arcsec > radius_arcsec {
            continue;
        }
        match store.insert_hit(region_id, &obj.object_id, arcsec, name) {
            Ok(()) => hits += 1,
            Err(e) => {
                log::warn!("hit insert failed for {} / {}: {}", name, obj.object_id, e);
            }
        }
    }

    log::debug!(
        "crossmatch {}: {} candidates, {} hits within {}\"",
        name,
        candidates.len(),
        hits,
        radius_arcsec
    );
    Ok(hits)
}
