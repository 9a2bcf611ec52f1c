//! Alert filter: maps one raw alert to zero-or-one persistable row plus
//! zero-or-more annotation records. Pure over its collaborators; all
//! persistence happens in the caller.

use crate::alerts::{Alert, AnnotationRecord};
use crate::features::{FeatureBuilder, ObjectRow};

/// The annotator class whose blocks we ingest.
pub const ANNOTATOR_CLASS: &str = "sherlock";

/// Enumerated attribute whitelist for sherlock annotation rows. Unknown
/// fields are dropped, missing fields are written as NULL.
pub const SHERLOCK_ATTRIBUTES: &[&str] = &[
    "classification",
    "objectId",
    "association_type",
    "catalogue_table_name",
    "catalogue_object_id",
    "catalogue_object_type",
    "raDeg",
    "decDeg",
    "separationArcsec",
    "northSeparationArcsec",
    "eastSeparationArcsec",
    "physical_separation_kpc",
    "direct_distance",
    "distance",
    "z",
    "photoZ",
    "photoZErr",
    "Mag",
    "MagFilter",
    "MagErr",
    "classificationReliability",
    "major_axis_arcsec",
    "annotator",
    "additional_output",
    "description",
    "summary",
];

#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub row: Option<ObjectRow>,
    pub annotations: Vec<AnnotationRecord>,
    pub is_solar_system: bool,
}

/// Apply the filter to one decoded alert.
///
/// - No detection identifier: nothing is produced.
/// - The feature builder may decline the row; the alert then produces no
///   annotations either.
/// - A solar-system flagged row is still returned; the caller counts it
///   separately and keeps it off the main persist path.
pub fn filter_alert(alert: &Alert, builder: &dyn FeatureBuilder) -> FilterOutcome {
    if !alert.has_candid() {
        return FilterOutcome::default();
    }

    let built = match builder.build(alert) {
        Some(b) => b,
        None => return FilterOutcome::default(),
    };

    let mut annotations = Vec::new();
    if let Some(blocks) = alert.annotations.get(ANNOTATOR_CLASS) {
        for block in blocks {
            let mut attrs = block.clone();
            // The upstream cross-reference id is transient; the stable key is
            // the object identifier we stamp on instead.
            attrs.remove("transient_object_id");
            attrs.insert(
                "objectId".to_string(),
                serde_json::Value::String(alert.object_id.clone()),
            );
            annotations.push(AnnotationRecord {
                object_id: alert.object_id.clone(),
                class: ANNOTATOR_CLASS.to_string(),
                attrs,
            });
        }
    }

    FilterOutcome {
        row: Some(built.row),
        annotations,
        is_solar_system: built.is_solar_system,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ZtfFeatureBuilder;

    fn alert_from(json: serde_json::Value) -> Alert {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_no_candid_produces_nothing() {
        let alert = alert_from(serde_json::json!({
            "objectId": "ZTF25nocand",
            "candidate": {"candid": null, "ra": 10.0, "dec": 20.0},
            "annotations": {
                "sherlock": [{"classification": "SN"}]
            }
        }));

        let outcome = filter_alert(&alert, &ZtfFeatureBuilder);
        assert!(outcome.row.is_none());
        assert!(outcome.annotations.is_empty());
        assert!(!outcome.is_solar_system);
    }

    #[test]
    fn test_zero_candid_produces_nothing() {
        let alert = alert_from(serde_json::json!({
            "objectId": "ZTF25zerocand",
            "candidate": {"candid": 0, "ra": 10.0, "dec": 20.0}
        }));

        let outcome = filter_alert(&alert, &ZtfFeatureBuilder);
        assert!(outcome.row.is_none());
    }

    #[test]
    fn test_declined_row_skips_annotations() {
        let alert = alert_from(serde_json::json!({
            "objectId": "ZTF25baddec",
            "candidate": {"candid": 5, "ra": 10.0, "dec": 99.0},
            "annotations": {
                "sherlock": [{"classification": "SN"}]
            }
        }));

        let outcome = filter_alert(&alert, &ZtfFeatureBuilder);
        assert!(outcome.row.is_none());
        assert!(outcome.annotations.is_empty());
    }

    #[test]
    fn test_solar_system_flag_passes_through() {
        let alert = alert_from(serde_json::json!({
            "objectId": "ZTF25sso",
            "candidate": {"candid": 5, "ra": 10.0, "dec": 20.0, "ssdistnr": 1.5}
        }));

        let outcome = filter_alert(&alert, &ZtfFeatureBuilder);
        assert!(outcome.is_solar_system);
        assert!(outcome.row.is_some());
    }

    #[test]
    fn test_annotation_is_stamped_and_stripped() {
        let alert = alert_from(serde_json::json!({
            "objectId": "ZTF25ann",
            "candidate": {"candid": 5, "ra": 10.0, "dec": 20.0},
            "annotations": {
                "sherlock": [
                    {"classification": "SN", "transient_object_id": 42},
                    {"classification": "NT", "z": 0.1}
                ],
                "other_annotator": [{"foo": "bar"}]
            }
        }));

        let outcome = filter_alert(&alert, &ZtfFeatureBuilder);
        assert_eq!(outcome.annotations.len(), 2);
        for ann in &outcome.annotations {
            assert_eq!(ann.class, ANNOTATOR_CLASS);
            assert_eq!(ann.attrs["objectId"], "ZTF25ann");
            assert!(!ann.attrs.contains_key("transient_object_id"));
        }
    }
}
