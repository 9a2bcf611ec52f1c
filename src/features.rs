//! Feature builder collaborator: turns one alert into the object row that
//! gets persisted, or declines it.

use crate::alerts::Alert;

/// Row written to the `objects` table.
#[derive(Debug, Clone)]
pub struct ObjectRow {
    pub object_id: String,
    pub ra: f64,
    pub dec: f64,
    pub jd: Option<f64>,
    pub magpsf: Option<f64>,
}

/// Builder output: the row plus the solar-system flag that routes it away
/// from the main persist path.
#[derive(Debug, Clone)]
pub struct BuiltObject {
    pub row: ObjectRow,
    pub is_solar_system: bool,
}

/// Maps an alert to zero-or-one persistable row. Returning `None` means the
/// alert is filtered out; it still counts as seen.
pub trait FeatureBuilder: Send + Sync {
    fn build(&self, alert: &Alert) -> Option<BuiltObject>;
}

/// Nearest-known-solar-system-object distances below this are treated as a
/// solar-system detection.
const SS_MATCH_ARCSEC: f64 = 10.0;

/// Default builder for ZTF-shaped candidates.
pub struct ZtfFeatureBuilder;

impl FeatureBuilder for ZtfFeatureBuilder {
    fn build(&self, alert: &Alert) -> Option<BuiltObject> {
        let cand = &alert.candidate;

        if !cand.ra.is_finite() || !cand.dec.is_finite() || cand.dec.abs() > 90.0 {
            log::warn!(
                "bad position ({}, {}) for {}, alert skipped",
                cand.ra,
                cand.dec,
                alert.object_id
            );
            return None;
        }

        let is_solar_system = matches!(
            cand.ssdistnr,
            Some(d) if (0.0..SS_MATCH_ARCSEC).contains(&d)
        );

        Some(BuiltObject {
            row: ObjectRow {
                object_id: alert.object_id.clone(),
                ra: cand.ra,
                dec: cand.dec,
                jd: cand.jd,
                magpsf: cand.magpsf,
            },
            is_solar_system,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_alert(ra: f64, dec: f64, ssdistnr: Option<f64>) -> Alert {
        serde_json::from_value(serde_json::json!({
            "objectId": "ZTF25test",
            "candidate": {
                "candid": 1, "ra": ra, "dec": dec,
                "jd": 2460000.5, "magpsf": 18.2, "ssdistnr": ssdistnr
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_builds_row_from_candidate() {
        let built = ZtfFeatureBuilder.build(&make_alert(150.0, -30.0, None)).unwrap();
        assert_eq!(built.row.object_id, "ZTF25test");
        assert_eq!(built.row.ra, 150.0);
        assert!(!built.is_solar_system);
    }

    #[test]
    fn test_solar_system_flag_from_ssdistnr() {
        let near = ZtfFeatureBuilder.build(&make_alert(1.0, 1.0, Some(2.5))).unwrap();
        assert!(near.is_solar_system);

        // Negative sentinel means no nearby solar-system object
        let none = ZtfFeatureBuilder.build(&make_alert(1.0, 1.0, Some(-999.0))).unwrap();
        assert!(!none.is_solar_system);
    }

    #[test]
    fn test_declines_bad_position() {
        assert!(ZtfFeatureBuilder.build(&make_alert(f64::NAN, 0.0, None)).is_none());
        assert!(ZtfFeatureBuilder.build(&make_alert(10.0, 95.0, None)).is_none());
    }
}
