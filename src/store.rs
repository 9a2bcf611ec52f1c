//! Catalog store: the single SQLite seam for ingested objects, sherlock
//! annotations, the registry mirror and the crossmatch state.
//!
//! Writes are idempotent (upsert or full replace) so duplicate processing
//! under at-least-once delivery is harmless. The store remembers its path so
//! a worker can cycle the connection mid-run.

use crate::alerts::AnnotationRecord;
use crate::features::ObjectRow;
use crate::filter::SHERLOCK_ATTRIBUTES;
use crate::registry::types::RegistryEntry;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Fixed identifier for the registry's monitored-region set. Single-registry
/// design; a second registry would need its own identifier.
pub const REGISTRY_SOURCE: &str = "registry";

const SCHEMA_FILES: &[(&str, &str)] = &[
    ("00_objects.sql", include_str!("../sql/00_objects.sql")),
    (
        "01_sherlock_classifications.sql",
        include_str!("../sql/01_sherlock_classifications.sql"),
    ),
    ("02_registry_mirror.sql", include_str!("../sql/02_registry_mirror.sql")),
    ("03_watch_regions.sql", include_str!("../sql/03_watch_regions.sql")),
    ("04_watch_hits.sql", include_str!("../sql/04_watch_hits.sql")),
    ("05_run_status.sql", include_str!("../sql/05_run_status.sql")),
];

/// Run the embedded schema migrations. All statements carry IF NOT EXISTS,
/// so this is idempotent and safe on every open.
pub fn run_schema_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    for (name, sql) in SCHEMA_FILES {
        log::debug!("   ├─ applying {}", name);
        conn.execute_batch(sql)?;
    }
    Ok(())
}

/// One row of the local catalog as seen by the crossmatch engine. Read-only
/// there: crossmatch never creates or mutates catalog objects.
#[derive(Debug, Clone)]
pub struct CatalogObject {
    pub object_id: String,
    pub ramean: f64,
    pub decmean: f64,
}

pub struct CatalogStore {
    path: PathBuf,
    conn: Connection,
}

impl CatalogStore {
    pub fn open(path: impl AsRef<Path>) -> rusqlite::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        run_schema_migrations(&conn)?;
        Ok(Self { path, conn })
    }

    /// Close and reopen the connection. Bounds connection lifetime and forces
    /// outstanding writes to flush; called by workers every progress batch.
    pub fn cycle(&mut self) -> rusqlite::Result<()> {
        let fresh = Connection::open(&self.path)?;
        let old = std::mem::replace(&mut self.conn, fresh);
        if let Err((_, e)) = old.close() {
            log::warn!("stale storage connection did not close cleanly: {}", e);
        }
        Ok(())
    }

    // ---- object catalog ----

    pub fn upsert_object(&self, row: &ObjectRow, tile: i64) -> rusqlite::Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO objects (objectId, ramean, decmean, jdmax, maglatest, tile16, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(objectId) DO UPDATE SET
                ramean = excluded.ramean,
                decmean = excluded.decmean,
                jdmax = excluded.jdmax,
                maglatest = excluded.maglatest,
                tile16 = excluded.tile16,
                updated_at = excluded.updated_at
            "#,
            params![
                row.object_id,
                row.ra,
                row.dec,
                row.jd,
                row.magpsf,
                tile,
                chrono::Utc::now().timestamp(),
            ],
        )?;
        Ok(())
    }

    pub fn count_objects(&self) -> rusqlite::Result<i64> {
        self.conn.query_row("SELECT COUNT(*) FROM objects", [], |r| r.get(0))
    }

    pub fn objects_in_tiles(&self, tiles: &[i64]) -> rusqlite::Result<Vec<CatalogObject>> {
        if tiles.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; tiles.len()].join(",");
        let sql = format!(
            "SELECT objectId, ramean, decmean FROM objects WHERE tile16 IN ({})",
            placeholders
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(tiles.iter()), |row| {
            Ok(CatalogObject {
                object_id: row.get(0)?,
                ramean: row.get(1)?,
                decmean: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    // ---- sherlock annotations ----

    /// Full-replace write: one current row per object, keyed by the object
    /// identifier. Attributes outside the whitelist are dropped, missing
    /// whitelist attributes become NULL.
    pub fn replace_annotation(&self, ann: &AnnotationRecord) -> rusqlite::Result<()> {
        self.conn.execute(
            "DELETE FROM sherlock_classifications WHERE objectId = ?1",
            params![ann.object_id],
        )?;

        let columns = SHERLOCK_ATTRIBUTES.join(", ");
        let placeholders = vec!["?"; SHERLOCK_ATTRIBUTES.len()].join(", ");
        let sql = format!(
            "INSERT INTO sherlock_classifications ({}) VALUES ({})",
            columns, placeholders
        );
        let values: Vec<SqlValue> = SHERLOCK_ATTRIBUTES
            .iter()
            .map(|attr| attr_to_sql(ann.attrs.get(*attr)))
            .collect();
        self.conn.execute(&sql, params_from_iter(values))?;
        Ok(())
    }

    pub fn count_annotations(&self, object_id: &str) -> rusqlite::Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM sherlock_classifications WHERE objectId = ?1",
            params![object_id],
            |r| r.get(0),
        )
    }

    // ---- registry mirror ----

    /// The stored classification prefix for a mirrored entry, if present.
    pub fn mirror_prefix(&self, name: &str) -> rusqlite::Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT name_prefix FROM registry_mirror WHERE name = ?1",
                params![name],
                |r| r.get(0),
            )
            .optional()
    }

    /// Full delete+insert, never a partial update.
    pub fn replace_mirror_entry(&self, e: &RegistryEntry) -> rusqlite::Result<()> {
        self.conn
            .execute("DELETE FROM registry_mirror WHERE name = ?1", params![e.name])?;
        self.conn.execute(
            r#"
            INSERT INTO registry_mirror (
                name, name_prefix, ra, decl, disc_mag, disc_filter, obj_type,
                redshift, internal_names, disc_date, lastmodified, sender,
                reporters, source_group, tile16
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
            params![
                e.name,
                e.name_prefix,
                e.ra,
                e.decl,
                e.disc_mag,
                e.disc_filter,
                e.obj_type,
                e.redshift,
                e.internal_names,
                e.disc_date,
                e.lastmodified,
                e.sender,
                e.reporters,
                e.source_group,
                e.tile,
            ],
        )?;
        Ok(())
    }

    pub fn truncate_mirror(&self) -> rusqlite::Result<()> {
        self.conn.execute("DELETE FROM registry_mirror", [])?;
        Ok(())
    }

    pub fn count_mirror(&self) -> rusqlite::Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM registry_mirror", [], |r| r.get(0))
    }

    // ---- watch regions and hits ----

    pub fn insert_region(&self, name: &str, ra: f64, decl: f64) -> rusqlite::Result<i64> {
        self.conn.execute(
            "INSERT INTO watch_regions (source, name, ra, decl, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![REGISTRY_SOURCE, name, ra, decl, chrono::Utc::now().timestamp()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_hit(
        &self,
        region_id: i64,
        object_id: &str,
        arcsec: f64,
        name: &str,
    ) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO watch_hits (source, region_id, objectId, arcsec, name)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![REGISTRY_SOURCE, region_id, object_id, arcsec, name],
        )?;
        Ok(())
    }

    /// Destructive: drops every region and hit owned by the registry source.
    /// Only the operator-invoked full rebuild calls this.
    pub fn clear_watch_state(&self) -> rusqlite::Result<()> {
        self.conn.execute(
            "DELETE FROM watch_hits WHERE source = ?1",
            params![REGISTRY_SOURCE],
        )?;
        self.conn.execute(
            "DELETE FROM watch_regions WHERE source = ?1",
            params![REGISTRY_SOURCE],
        )?;
        Ok(())
    }

    pub fn count_regions(&self) -> rusqlite::Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM watch_regions WHERE source = ?1",
            params![REGISTRY_SOURCE],
            |r| r.get(0),
        )
    }

    pub fn count_hits(&self) -> rusqlite::Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM watch_hits WHERE source = ?1",
            params![REGISTRY_SOURCE],
            |r| r.get(0),
        )
    }

    pub fn count_hits_for(&self, name: &str) -> rusqlite::Result<i64> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM watch_hits WHERE source = ?1 AND name = ?2",
            params![REGISTRY_SOURCE, name],
            |r| r.get(0),
        )
    }

    pub fn max_hit_arcsec(&self, name: &str) -> rusqlite::Result<Option<f64>> {
        self.conn.query_row(
            "SELECT MAX(arcsec) FROM watch_hits WHERE source = ?1 AND name = ?2",
            params![REGISTRY_SOURCE, name],
            |r| r.get(0),
        )
    }

    // ---- run status counters ----

    /// Accumulate named counters for the given nid.
    pub fn add_run_counters(&self, counters: &[(&str, i64)], nid: i64) -> rusqlite::Result<()> {
        for (name, value) in counters {
            self.conn.execute(
                "INSERT INTO run_status (nid, name, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(nid, name) DO UPDATE SET value = value + excluded.value",
                params![nid, name, value],
            )?;
        }
        Ok(())
    }

    /// Overwrite one named counter for the given nid.
    pub fn set_run_counter(&self, name: &str, value: i64, nid: i64) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO run_status (nid, name, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(nid, name) DO UPDATE SET value = excluded.value",
            params![nid, name, value],
        )?;
        Ok(())
    }

    pub fn run_counter(&self, name: &str, nid: i64) -> rusqlite::Result<Option<i64>> {
        self.conn
            .query_row(
                "SELECT value FROM run_status WHERE nid = ?1 AND name = ?2",
                params![nid, name],
                |r| r.get(0),
            )
            .optional()
    }
}

fn attr_to_sql(value: Option<&serde_json::Value>) -> SqlValue {
    use serde_json::Value;
    match value {
        None | Some(Value::Null) => SqlValue::Null,
        Some(Value::Number(n)) if n.is_i64() => SqlValue::Integer(n.as_i64().unwrap_or(0)),
        Some(Value::Number(n)) => SqlValue::Real(n.as_f64().unwrap_or(0.0)),
        Some(Value::String(s)) => SqlValue::Text(s.clone()),
        Some(Value::Bool(b)) => SqlValue::Integer(*b as i64),
        // Nested structures are stored as their JSON text
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AnnotationRecord;
    use crate::filter::ANNOTATOR_CLASS;
    use tempfile::NamedTempFile;

    fn open_test_store() -> (NamedTempFile, CatalogStore) {
        let temp = NamedTempFile::new().unwrap();
        let store = CatalogStore::open(temp.path()).unwrap();
        (temp, store)
    }

    fn make_row(object_id: &str, ra: f64, dec: f64) -> ObjectRow {
        ObjectRow {
            object_id: object_id.to_string(),
            ra,
            dec,
            jd: Some(2460000.5),
            magpsf: Some(18.0),
        }
    }

    fn make_annotation(object_id: &str, classification: &str) -> AnnotationRecord {
        let mut attrs = serde_json::Map::new();
        attrs.insert("objectId".into(), serde_json::json!(object_id));
        attrs.insert("classification".into(), serde_json::json!(classification));
        attrs.insert("separationArcsec".into(), serde_json::json!(0.4));
        attrs.insert("not_in_whitelist".into(), serde_json::json!("dropped"));
        AnnotationRecord {
            object_id: object_id.to_string(),
            class: ANNOTATOR_CLASS.to_string(),
            attrs,
        }
    }

    #[test]
    fn test_upsert_object_is_idempotent() {
        let (_temp, store) = open_test_store();
        let row = make_row("ZTF25dup", 10.0, -5.0);

        store.upsert_object(&row, 100).unwrap();
        store.upsert_object(&row, 100).unwrap();

        assert_eq!(store.count_objects().unwrap(), 1);
    }

    #[test]
    fn test_replace_annotation_is_idempotent() {
        let (_temp, store) = open_test_store();
        let ann = make_annotation("ZTF25ann", "SN");

        store.replace_annotation(&ann).unwrap();
        store.replace_annotation(&ann).unwrap();

        assert_eq!(store.count_annotations("ZTF25ann").unwrap(), 1);
    }

    #[test]
    fn test_annotation_replace_overwrites() {
        let (_temp, store) = open_test_store();
        store.replace_annotation(&make_annotation("ZTF25re", "Q")).unwrap();
        store.replace_annotation(&make_annotation("ZTF25re", "SN")).unwrap();

        let (count, class): (i64, String) = store
            .conn
            .query_row(
                "SELECT COUNT(*), classification FROM sherlock_classifications WHERE objectId = ?1",
                params!["ZTF25re"],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(class, "SN");
    }

    #[test]
    fn test_mirror_replace_and_lookup() {
        let (_temp, store) = open_test_store();
        let mut entry = RegistryEntry::for_tests("AT2024xyz", "AT", 10.5, -20.3, 7);

        store.replace_mirror_entry(&entry).unwrap();
        assert_eq!(store.mirror_prefix("AT2024xyz").unwrap().as_deref(), Some("AT"));
        assert_eq!(store.mirror_prefix("AT2099zzz").unwrap(), None);

        entry.name_prefix = "SN".to_string();
        store.replace_mirror_entry(&entry).unwrap();
        assert_eq!(store.count_mirror().unwrap(), 1);
        assert_eq!(store.mirror_prefix("AT2024xyz").unwrap().as_deref(), Some("SN"));
    }

    #[test]
    fn test_clear_watch_state() {
        let (_temp, store) = open_test_store();
        let region = store.insert_region("AT2024xyz", 10.5, -20.3).unwrap();
        store.insert_hit(region, "ZTF25hit", 1.2, "AT2024xyz").unwrap();

        assert_eq!(store.count_regions().unwrap(), 1);
        assert_eq!(store.count_hits().unwrap(), 1);

        store.clear_watch_state().unwrap();
        assert_eq!(store.count_regions().unwrap(), 0);
        assert_eq!(store.count_hits().unwrap(), 0);
    }

    #[test]
    fn test_objects_in_tiles() {
        let (_temp, store) = open_test_store();
        store.upsert_object(&make_row("ZTF25a", 1.0, 1.0), 10).unwrap();
        store.upsert_object(&make_row("ZTF25b", 2.0, 2.0), 11).unwrap();
        store.upsert_object(&make_row("ZTF25c", 3.0, 3.0), 99).unwrap();

        let found = store.objects_in_tiles(&[10, 11]).unwrap();
        assert_eq!(found.len(), 2);

        assert!(store.objects_in_tiles(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_status_add_accumulates_and_set_overwrites() {
        let (_temp, store) = open_test_store();
        store.add_run_counters(&[("today_filter", 10)], 3000).unwrap();
        store.add_run_counters(&[("today_filter", 5)], 3000).unwrap();
        assert_eq!(store.run_counter("today_filter", 3000).unwrap(), Some(15));

        store.set_run_counter("countRegistry", 42, 3000).unwrap();
        store.set_run_counter("countRegistry", 40, 3000).unwrap();
        assert_eq!(store.run_counter("countRegistry", 3000).unwrap(), Some(40));
    }

    #[test]
    fn test_cycle_keeps_data() {
        let (_temp, mut store) = open_test_store();
        store.upsert_object(&make_row("ZTF25cyc", 5.0, 5.0), 7).unwrap();
        store.cycle().unwrap();
        assert_eq!(store.count_objects().unwrap(), 1);
    }
}
