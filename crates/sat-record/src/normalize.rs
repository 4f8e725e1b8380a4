//! Record normalizer
//!
//! Turns an arbitrary JSON value into a canonical [`IndicatorRecord`].
//! Normalization never fails: malformed fields degrade to empty or
//! defaulted values.

use crate::category::Category;
use crate::record::IndicatorRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Date-time prefix accepted for `createdAt`
///
/// A validation policy, not a parser: `2024-13-45T99:00:00` passes.
static ISO_DATETIME_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").expect("static regex")
});

/// Format a UTC instant the way browsers emit `Date.toISOString()`
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Check whether a string carries an ISO-8601 date-time prefix
#[inline]
#[must_use]
pub fn is_iso_datetime(s: &str) -> bool {
    ISO_DATETIME_PREFIX.is_match(s)
}

/// Normalize an incoming value using the current time as fallback
#[must_use]
pub fn normalize(input: &Value) -> IndicatorRecord {
    normalize_at(input, Utc::now())
}

/// Normalize an incoming value with an explicit fallback timestamp
#[must_use]
pub fn normalize_at(input: &Value, now: DateTime<Utc>) -> IndicatorRecord {
    let empty = Map::new();
    let object = input.as_object().unwrap_or(&empty);

    let created_at = object
        .get("createdAt")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| is_iso_datetime(s))
        .map_or_else(|| format_timestamp(now), str::to_string);

    let mut record = IndicatorRecord::empty(created_at);
    for category in Category::ALL {
        *record.items_mut(category) = string_list(object.get(category.key()));
    }

    record.id = optional_string(object.get("id"));
    record.evidence = optional_string(object.get("evidence"));
    record.session_id = optional_string(object.get("sessionId"));
    record.app_version = optional_string(object.get("appVersion"));
    record
}

/// Coerce a field into a list of non-empty trimmed strings
///
/// Arrays map element-wise, scalars wrap into a single element, absent or
/// null yields an empty list.
#[must_use]
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(values)) => values.iter().filter_map(trimmed_text).collect(),
        Some(scalar) => trimmed_text(scalar).into_iter().collect(),
    }
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    value.and_then(trimmed_text)
}

/// Trimmed textual form of a JSON value, `None` when empty
fn trimmed_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Nested structures keep their compact JSON text
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn keeps_valid_created_at() {
        let record = normalize_at(&json!({"createdAt": " 2024-03-01T10:00:00Z "}), fixed_now());
        assert_eq!(record.created_at, "2024-03-01T10:00:00Z");
    }

    #[test]
    fn accepts_calendar_nonsense_with_iso_shape() {
        let record = normalize_at(&json!({"createdAt": "2024-13-45T99:99:99"}), fixed_now());
        assert_eq!(record.created_at, "2024-13-45T99:99:99");
    }

    #[test]
    fn replaces_malformed_created_at() {
        for bad in [json!("yesterday"), json!(1_700_000_000), json!("2024-03-01"), json!(null)] {
            let record = normalize_at(&json!({ "createdAt": bad }), fixed_now());
            assert_eq!(record.created_at, "2025-01-02T03:04:05.000Z");
        }
    }

    #[test]
    fn category_arrays_are_trimmed_and_filtered() {
        let record = normalize_at(
            &json!({"what": ["  breach ", "", "   ", null, 42, true]}),
            fixed_now(),
        );
        assert_eq!(record.what, vec!["breach", "42", "true"]);
    }

    #[test]
    fn scalar_category_wraps() {
        let record = normalize_at(&json!({"who": " insider ", "how": ""}), fixed_now());
        assert_eq!(record.who, vec!["insider"]);
        assert!(record.how.is_empty());
    }

    #[test]
    fn nested_values_keep_json_text() {
        let record = normalize_at(&json!({"why": [{"a": 1}, [1, 2]]}), fixed_now());
        assert_eq!(record.why, vec![r#"{"a":1}"#, "[1,2]"]);
    }

    #[test]
    fn optional_fields_only_when_non_empty() {
        let record = normalize_at(
            &json!({"id": "  ", "evidence": " memo ", "sessionId": 7, "appVersion": null}),
            fixed_now(),
        );
        assert_eq!(record.id, None);
        assert_eq!(record.evidence.as_deref(), Some("memo"));
        assert_eq!(record.session_id.as_deref(), Some("7"));
        assert_eq!(record.app_version, None);

        let line = serde_json::to_string(&record).unwrap();
        assert!(!line.contains("\"id\""));
        assert!(!line.contains("appVersion"));
    }

    #[test]
    fn non_object_input_degrades_to_empty_record() {
        let record = normalize_at(&json!(["what", "who"]), fixed_now());
        assert_eq!(record, IndicatorRecord::empty("2025-01-02T03:04:05.000Z"));
    }

    #[test]
    fn unknown_keys_are_dropped() {
        let record = normalize_at(&json!({"extra": "x", "what": "y"}), fixed_now());
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("extra").is_none());
    }
}
