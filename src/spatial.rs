//! Coarse spatial index over the sky.
//!
//! The index is consumed as an oracle: point mode assigns a tile identifier
//! to a position, range mode returns every tile that could intersect a small
//! circle. Range mode may over-cover (false positives are filtered by the
//! true separation computed downstream) but never under-covers at the grid's
//! resolution.

pub const TILE_DEPTH: u32 = 16;

pub trait SpatialIndex: Send + Sync {
    /// Point mode: the tile containing (ra, dec).
    fn tile_id(&self, ra: f64, dec: f64) -> i64;

    /// Range mode: every tile intersecting the circle of `radius_arcsec`
    /// around (ra, dec).
    fn circle_tiles(&self, ra: f64, dec: f64, radius_arcsec: f64) -> Vec<i64>;
}

/// Flat equal-angle grid. Cell side is `90 / 2^depth` degrees, so depth 16
/// gives cells of roughly 5 arcsec.
pub struct GridIndex {
    cell_deg: f64,
    nx: i64,
    ny: i64,
}

impl GridIndex {
    pub fn new(depth: u32) -> Self {
        let cell_deg = 90.0 / (1u64 << depth) as f64;
        Self {
            cell_deg,
            nx: (360.0 / cell_deg).round() as i64,
            ny: (180.0 / cell_deg).round() as i64,
        }
    }

    fn ix(&self, ra: f64) -> i64 {
        ((ra.rem_euclid(360.0) / self.cell_deg).floor() as i64).rem_euclid(self.nx)
    }

    fn iy(&self, dec: f64) -> i64 {
        (((dec + 90.0) / self.cell_deg).floor() as i64).clamp(0, self.ny - 1)
    }
}

impl SpatialIndex for GridIndex {
    fn tile_id(&self, ra: f64, dec: f64) -> i64 {
        self.iy(dec) * self.nx + self.ix(ra)
    }

    fn circle_tiles(&self, ra: f64, dec: f64, radius_arcsec: f64) -> Vec<i64> {
        let r_deg = radius_arcsec / 3600.0;
        // RA cells shrink towards the poles, so the RA half-width has to grow
        let cos_dec = dec.to_radians().cos().abs().max(1e-6);
        let dra = r_deg / cos_dec;

        let iy0 = self.iy(dec - r_deg);
        let iy1 = self.iy(dec + r_deg);
        let ix_center = self.ix(ra);
        let ra_steps = (dra / self.cell_deg).ceil() as i64;

        let mut tiles = Vec::new();
        for iy in iy0..=iy1 {
            for k in -ra_steps..=ra_steps {
                tiles.push(iy * self.nx + (ix_center + k).rem_euclid(self.nx));
            }
        }
        tiles.sort_unstable();
        tiles.dedup();
        tiles
    }
}
