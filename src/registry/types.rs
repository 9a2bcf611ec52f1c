//! Registry entry types and the field-level sanitization applied before a
//! row reaches the mirror.

use crate::spatial::SpatialIndex;
use serde::Deserialize;

/// One row of the upstream snapshot, as fetched. Everything arrives as text;
/// numerics may be empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRegistryEntry {
    pub name: String,
    #[serde(default)]
    pub name_prefix: String,
    pub ra: String,
    pub declination: String,
    #[serde(default)]
    pub discoverymag: String,
    #[serde(default)]
    pub filter: String,
    #[serde(default, rename = "type")]
    pub obj_type: String,
    #[serde(default)]
    pub redshift: String,
    #[serde(default)]
    pub internal_names: String,
    #[serde(default)]
    pub discoverydate: String,
    #[serde(default)]
    pub lastmodified: String,
    #[serde(default)]
    pub reporting_group: String,
    #[serde(default)]
    pub reporters: String,
    #[serde(default)]
    pub source_group: String,
}

/// A sanitized entry ready for the mirror. The tile is recomputed from the
/// position, never trusted from upstream.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub name: String,
    pub name_prefix: String,
    pub ra: f64,
    pub decl: f64,
    pub disc_mag: Option<f64>,
    pub disc_filter: String,
    pub obj_type: String,
    pub redshift: Option<f64>,
    pub internal_names: String,
    pub disc_date: String,
    pub lastmodified: String,
    pub sender: String,
    pub reporters: String,
    pub source_group: String,
    pub tile: i64,
}

/// Sanitize one fetched row. Returns `None` (with a diagnostic) when the
/// position is unusable; a bad upstream row never aborts the poll.
pub fn sanitize_entry(raw: &RawRegistryEntry, index: &dyn SpatialIndex) -> Option<RegistryEntry> {
    let ra = match raw.ra.trim().parse::<f64>() {
        Ok(v) => v,
        Err(_) => {
            log::warn!("registry entry {} has unusable ra '{}', skipped", raw.name, raw.ra);
            return None;
        }
    };
    let decl = match raw.declination.trim().parse::<f64>() {
        Ok(v) if v.abs() <= 90.0 => v,
        _ => {
            log::warn!(
                "registry entry {} has unusable declination '{}', skipped",
                raw.name,
                raw.declination
            );
            return None;
        }
    };

    Some(RegistryEntry {
        name: raw.name.trim().to_string(),
        name_prefix: raw.name_prefix.trim().to_string(),
        ra,
        decl,
        disc_mag: parse_numeric(&raw.discoverymag),
        disc_filter: clip(&asciify(&raw.filter), 16),
        obj_type: clip(&asciify(&raw.obj_type), 16),
        redshift: parse_numeric(&raw.redshift),
        internal_names: clip(&asciify(&raw.internal_names), 75),
        disc_date: raw.discoverydate.trim().to_string(),
        lastmodified: raw.lastmodified.trim().to_string(),
        sender: clip(&asciify(&raw.reporting_group), 12),
        reporters: clip(&asciify(&raw.reporters), 75),
        source_group: asciify(&raw.source_group).chars().take(16).collect(),
        tile: index.tile_id(ra, decl),
    })
}

impl RegistryEntry {
    #[cfg(test)]
    pub fn for_tests(name: &str, prefix: &str, ra: f64, decl: f64, tile: i64) -> Self {
        Self {
            name: name.to_string(),
            name_prefix: prefix.to_string(),
            ra,
            decl,
            disc_mag: None,
            disc_filter: String::new(),
            obj_type: String::new(),
            redshift: None,
            internal_names: String::new(),
            disc_date: String::new(),
            lastmodified: String::new(),
            sender: String::new(),
            reporters: String::new(),
            source_group: String::new(),
            tile,
        }
    }
}

/// Empty upstream numerics become NULL, never the empty string, so they can
/// not corrupt downstream aggregates.
fn parse_numeric(s: &str) -> Option<f64> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    t.parse::<f64>().ok()
}

/// Replace non-ASCII characters and strip quotes from free text.
fn asciify(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '\'' && *c != '"')
        .map(|c| if c.is_ascii() { c } else { '?' })
        .collect()
}

/// Truncate oversized free text, marking the cut with an ellipsis.
fn clip(s: &str, max: usize) -> String {
    if s.len() > max {
        format!("{}...", &s[..max])
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{GridIndex, TILE_DEPTH};

    fn raw(name: &str, ra: &str, decl: &str) -> RawRegistryEntry {
        RawRegistryEntry {
            name: name.to_string(),
            name_prefix: "AT".to_string(),
            ra: ra.to_string(),
            declination: decl.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_tile_recomputed_from_position() {
        let index = GridIndex::new(TILE_DEPTH);
        let entry = sanitize_entry(&raw("AT2024xyz", "10.5", "-20.3"), &index).unwrap();
        assert_eq!(entry.tile, index.tile_id(10.5, -20.3));
    }

    #[test]
    fn test_unusable_position_is_skipped() {
        let index = GridIndex::new(TILE_DEPTH);
        assert!(sanitize_entry(&raw("AT2024bad", "", "-20.3"), &index).is_none());
        assert!(sanitize_entry(&raw("AT2024bad", "10.5", "95.0"), &index).is_none());
    }

    #[test]
    fn test_empty_numeric_becomes_null() {
        let index = GridIndex::new(TILE_DEPTH);
        let mut r = raw("AT2024num", "1.0", "2.0");
        r.discoverymag = "".to_string();
        r.redshift = "0.123".to_string();
        let entry = sanitize_entry(&r, &index).unwrap();
        assert_eq!(entry.disc_mag, None);
        assert_eq!(entry.redshift, Some(0.123));
    }

    #[test]
    fn test_free_text_truncation_and_ascii() {
        let index = GridIndex::new(TILE_DEPTH);
        let mut r = raw("AT2024txt", "1.0", "2.0");
        r.internal_names = "x".repeat(120);
        r.reporters = "Müller, O'Brien".to_string();
        r.reporting_group = "A very long reporting group name".to_string();
        let entry = sanitize_entry(&r, &index).unwrap();

        assert_eq!(entry.internal_names.len(), 78); // 75 + "..."
        assert!(entry.internal_names.ends_with("..."));
        assert_eq!(entry.reporters, "M?ller, OBrien");
        assert_eq!(entry.sender, "A very long ...");
    }
}
