//! Alert records as delivered on the broker topic.
//!
//! An alert is decoded once per delivery and never mutated afterwards; it is
//! dropped after filtering except for the rows it produces.

use serde::Deserialize;
use std::collections::HashMap;

pub type AnnotationBlock = serde_json::Map<String, serde_json::Value>;

/// One observation event from the alert stream.
#[derive(Debug, Clone, Deserialize)]
pub struct Alert {
    #[serde(rename = "objectId")]
    pub object_id: String,
    pub candidate: Candidate,
    /// Annotation blocks keyed by annotator class, e.g. "sherlock".
    #[serde(default)]
    pub annotations: HashMap<String, Vec<AnnotationBlock>>,
}

/// The detection block of an alert. `candid` absent or zero means the event
/// carries no persistable detection.
#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub candid: Option<i64>,
    pub ra: f64,
    pub dec: f64,
    pub jd: Option<f64>,
    pub magpsf: Option<f64>,
    /// Distance to the nearest known solar-system object, arcsec. Upstream
    /// writes a negative sentinel when there is none.
    pub ssdistnr: Option<f64>,
}

impl Alert {
    /// True when the alert carries a usable detection identifier.
    pub fn has_candid(&self) -> bool {
        matches!(self.candidate.candid, Some(c) if c != 0)
    }
}

/// One full-replace annotation row derived from an alert's annotation block.
#[derive(Debug, Clone)]
pub struct AnnotationRecord {
    pub object_id: String,
    pub class: String,
    pub attrs: AnnotationBlock,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_minimal_alert() {
        let raw = r#"{
            "objectId": "ZTF25abcdefg",
            "candidate": {"candid": 1234567890, "ra": 150.1, "dec": -12.5}
        }"#;

        let alert: Alert = serde_json::from_str(raw).unwrap();
        assert_eq!(alert.object_id, "ZTF25abcdefg");
        assert!(alert.has_candid());
        assert!(alert.annotations.is_empty());
    }

    #[test]
    fn test_missing_candid_is_not_persistable() {
        let raw = r#"{
            "objectId": "ZTF25nocand",
            "candidate": {"candid": null, "ra": 10.0, "dec": 20.0}
        }"#;

        let alert: Alert = serde_json::from_str(raw).unwrap();
        assert!(!alert.has_candid());
    }

    #[test]
    fn test_decode_annotation_blocks() {
        let raw = r#"{
            "objectId": "ZTF25ann",
            "candidate": {"candid": 99, "ra": 1.0, "dec": 2.0},
            "annotations": {
                "sherlock": [{"classification": "SN", "transient_object_id": 7}]
            }
        }"#;

        let alert: Alert = serde_json::from_str(raw).unwrap();
        let blocks = &alert.annotations["sherlock"];
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0]["classification"], "SN");
    }
}
