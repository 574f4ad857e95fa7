//! Validation of raw export records.
//!
//! The validator is total: malformed records come back as `None` and are
//! counted by the caller, they never abort the surrounding job.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;

const TRACK_URI_PREFIX: &str = "spotify:track:";

/// One normalized listening record extracted from an export file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedRecord {
    pub track_name: String,
    pub external_track_id: String,
    pub played_at: DateTime<Utc>,
    pub ms_played: i64,
}

/// Validate a single raw record. Required fields: `master_metadata_track_name`,
/// `spotify_track_uri`, `ts` and `ms_played`; any missing or malformed field
/// rejects the whole record.
pub fn validate_record(record: &JsonValue) -> Option<ValidatedRecord> {
    let obj = record.as_object()?;

    let track_name = safe_strip(obj.get("master_metadata_track_name"))?;
    let track_uri = safe_strip(obj.get("spotify_track_uri"))?;
    let ts = safe_strip(obj.get("ts"))?;
    let ms_played = validate_ms_played(obj.get("ms_played")?)?;
    let played_at = validate_played_at(&ts)?;
    let external_track_id = extract_track_id(&track_uri)?;

    Some(ValidatedRecord {
        track_name,
        external_track_id,
        played_at,
        ms_played,
    })
}

/// String field extraction: non-string or empty-after-trim values are absent.
fn safe_strip(value: Option<&JsonValue>) -> Option<String> {
    let trimmed = value?.as_str()?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `ms_played` must be a non-negative integer; numeric strings are accepted.
fn validate_ms_played(value: &JsonValue) -> Option<i64> {
    let ms = match value {
        JsonValue::Number(n) => n.as_i64()?,
        JsonValue::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    if ms < 0 {
        None
    } else {
        Some(ms)
    }
}

/// Export timestamps are RFC 3339; naive `YYYY-MM-DDTHH:MM:SS` values are
/// treated as UTC.
fn validate_played_at(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// The track uri must have the `spotify:track:<id>` shape; the trailing
/// segment is the canonical external id.
fn extract_track_id(uri: &str) -> Option<String> {
    if !uri.starts_with(TRACK_URI_PREFIX) {
        return None;
    }
    let id = uri.rsplit(':').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_record() -> JsonValue {
        json!({
            "ts": "2024-07-25T12:11:10Z",
            "ms_played": 5181,
            "master_metadata_track_name": "Help Urself",
            "spotify_track_uri": "spotify:track:abc123",
            "platform": "ios",
            "shuffle": false
        })
    }

    #[test]
    fn test_valid_record() {
        let record = validate_record(&valid_record()).unwrap();
        assert_eq!(record.track_name, "Help Urself");
        assert_eq!(record.external_track_id, "abc123");
        assert_eq!(record.ms_played, 5181);
        assert_eq!(
            record.played_at,
            DateTime::parse_from_rfc3339("2024-07-25T12:11:10Z").unwrap()
        );
    }

    #[test]
    fn test_fields_are_trimmed() {
        let mut record = valid_record();
        record["master_metadata_track_name"] = json!("  Help Urself  ");
        let validated = validate_record(&record).unwrap();
        assert_eq!(validated.track_name, "Help Urself");
    }

    #[test]
    fn test_missing_required_fields_reject() {
        for field in [
            "ts",
            "ms_played",
            "master_metadata_track_name",
            "spotify_track_uri",
        ] {
            let mut record = valid_record();
            record.as_object_mut().unwrap().remove(field);
            assert!(validate_record(&record).is_none(), "missing {}", field);
        }
    }

    #[test]
    fn test_blank_and_non_string_fields_reject() {
        let mut record = valid_record();
        record["master_metadata_track_name"] = json!("   ");
        assert!(validate_record(&record).is_none());

        let mut record = valid_record();
        record["spotify_track_uri"] = json!(42);
        assert!(validate_record(&record).is_none());
    }

    #[test]
    fn test_negative_ms_played_rejects() {
        let mut record = valid_record();
        record["ms_played"] = json!(-5);
        assert!(validate_record(&record).is_none());
    }

    #[test]
    fn test_zero_ms_played_is_valid() {
        let mut record = valid_record();
        record["ms_played"] = json!(0);
        assert_eq!(validate_record(&record).unwrap().ms_played, 0);
    }

    #[test]
    fn test_ms_played_accepts_numeric_strings_only() {
        let mut record = valid_record();
        record["ms_played"] = json!("5181");
        assert_eq!(validate_record(&record).unwrap().ms_played, 5181);

        let mut record = valid_record();
        record["ms_played"] = json!("soon");
        assert!(validate_record(&record).is_none());

        let mut record = valid_record();
        record["ms_played"] = json!(51.81);
        assert!(validate_record(&record).is_none());
    }

    #[test]
    fn test_bad_timestamp_rejects() {
        let mut record = valid_record();
        record["ts"] = json!("yesterday at noon");
        assert!(validate_record(&record).is_none());
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let mut record = valid_record();
        record["ts"] = json!("2024-07-25T12:11:10");
        let validated = validate_record(&record).unwrap();
        assert_eq!(
            validated.played_at,
            DateTime::parse_from_rfc3339("2024-07-25T12:11:10Z").unwrap()
        );
    }

    #[test]
    fn test_wrong_uri_shape_rejects() {
        for uri in [
            "spotify:episode:abc123",
            "track:abc123",
            "spotify:track:",
            "abc123",
        ] {
            let mut record = valid_record();
            record["spotify_track_uri"] = json!(uri);
            assert!(validate_record(&record).is_none(), "uri {}", uri);
        }
    }

    #[test]
    fn test_non_object_record_rejects() {
        assert!(validate_record(&json!("a string")).is_none());
        assert!(validate_record(&json!([1, 2, 3])).is_none());
        assert!(validate_record(&json!(null)).is_none());
    }
}
