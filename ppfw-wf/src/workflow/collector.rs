//! Step Data Collector - shallow shape checks on a stage submission
//!
//! Field capture is unreliable, so this layer only rejects input that is
//! structurally impossible: non-numeric measurements, non-string
//! observations, URLs that are not URLs, coordinates off the globe.
//! `data` must be an object but its keys are not inspected here; domain
//! rules belong to the compliance scorer.
//!
//! Problems in the payload fields are collected together and reported as
//! one itemized list. Problems in the envelope (`stepNumber`, override flags,
//! `expected_version`) make the request malformed.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::models::{FieldIssue, Geolocation};

/// Largest horizontal accuracy (meters) accepted as a real GPS fix
pub const MAX_PLAUSIBLE_ACCURACY_M: f64 = 10_000.0;

/// Ordering/validation bypass flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceFlags {
    pub force_validation: bool,
    pub supervisor_override: bool,
}

impl AdvanceFlags {
    pub fn any(self) -> bool {
        self.force_validation || self.supervisor_override
    }
}

/// Control fields of an advance request
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Raw step number; range is checked by the state machine
    pub step_number: i64,
    pub flags: AdvanceFlags,
    pub expected_version: Option<i64>,
}

/// Evidence fields of an advance request, shape-checked
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepPayload {
    pub collected_data: Map<String, Value>,
    pub measurements: BTreeMap<String, f64>,
    pub observations: Vec<String>,
    pub photo_urls: Vec<String>,
    pub geolocation: Option<Geolocation>,
    pub notes: Option<String>,
}

/// Parse the request body into a JSON object
pub fn parse_body(bytes: &[u8]) -> Result<Map<String, Value>, String> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| format!("Body is not valid JSON: {}", e))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err("Body must be a JSON object".to_string()),
    }
}

/// Extract the envelope fields, rejecting malformed control input
pub fn parse_envelope(body: &Map<String, Value>) -> Result<Envelope, String> {
    let step_value = body
        .get("stepNumber")
        .or_else(|| body.get("step_number"))
        .ok_or_else(|| "stepNumber is required".to_string())?;
    let step_number = step_value
        .as_i64()
        .ok_or_else(|| format!("stepNumber must be an integer, got {}", step_value))?;

    let flags = AdvanceFlags {
        force_validation: optional_bool(body, "force_validation")?,
        supervisor_override: optional_bool(body, "supervisor_override")?,
    };

    let expected_version = match body.get("expected_version") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            v.as_i64()
                .ok_or_else(|| "expected_version must be an integer".to_string())?,
        ),
    };

    Ok(Envelope {
        step_number,
        flags,
        expected_version,
    })
}

fn optional_bool(body: &Map<String, Value>, key: &str) -> Result<bool, String> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(format!("{} must be a boolean", key)),
    }
}

/// Shape-check the evidence fields
///
/// `now` stamps a geolocation fix that arrives without its own timestamp.
pub fn collect_payload(
    body: &Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<StepPayload, Vec<FieldIssue>> {
    let mut issues = Vec::new();
    let mut payload = StepPayload::default();

    match body.get("data") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => payload.collected_data = map.clone(),
        Some(_) => issues.push(FieldIssue::new("data", "must be an object")),
    }

    match body.get("measurements") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (key, value) in map {
                match value.as_f64().filter(|v| v.is_finite()) {
                    Some(v) if !key.trim().is_empty() => {
                        payload.measurements.insert(key.clone(), v);
                    }
                    Some(_) => issues.push(FieldIssue::new(
                        "measurements",
                        "measurement names must not be empty",
                    )),
                    None => issues.push(FieldIssue::new(
                        format!("measurements.{}", key),
                        "must be a finite number",
                    )),
                }
            }
        }
        Some(_) => issues.push(FieldIssue::new("measurements", "must be an object")),
    }

    payload.observations = string_list(body, "observations", &mut issues, |_| true, "must be a string");
    payload.photo_urls = string_list(
        body,
        "photo_urls",
        &mut issues,
        is_url_shaped,
        "must be an http(s) URL or an absolute storage path",
    );

    match body.get("notes") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) => payload.notes = Some(s.clone()),
        Some(_) => issues.push(FieldIssue::new("notes", "must be a string")),
    }

    match body.get("current_location") {
        None | Some(Value::Null) => {}
        Some(Value::Object(loc)) => payload.geolocation = geolocation(loc, now, &mut issues),
        Some(_) => issues.push(FieldIssue::new("current_location", "must be an object")),
    }

    if issues.is_empty() {
        Ok(payload)
    } else {
        Err(issues)
    }
}

fn string_list(
    body: &Map<String, Value>,
    field: &str,
    issues: &mut Vec<FieldIssue>,
    accept: impl Fn(&str) -> bool,
    reject_message: &str,
) -> Vec<String> {
    let mut out = Vec::new();
    match body.get(field) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            for (i, item) in items.iter().enumerate() {
                match item.as_str() {
                    Some(s) if accept(s) => out.push(s.to_string()),
                    _ => issues.push(FieldIssue::new(format!("{}[{}]", field, i), reject_message)),
                }
            }
        }
        Some(_) => issues.push(FieldIssue::new(field, "must be a list")),
    }
    out
}

fn geolocation(
    loc: &Map<String, Value>,
    now: DateTime<Utc>,
    issues: &mut Vec<FieldIssue>,
) -> Option<Geolocation> {
    let before = issues.len();

    let latitude = coordinate(loc, "latitude", 90.0, issues);
    let longitude = coordinate(loc, "longitude", 180.0, issues);

    let accuracy = match loc.get("accuracy") {
        None | Some(Value::Null) => None,
        Some(v) => match v.as_f64() {
            Some(a) if a.is_finite() && (0.0..=MAX_PLAUSIBLE_ACCURACY_M).contains(&a) => Some(a),
            _ => {
                issues.push(FieldIssue::new(
                    "current_location.accuracy",
                    format!("must be between 0 and {} meters", MAX_PLAUSIBLE_ACCURACY_M),
                ));
                None
            }
        },
    };

    let timestamp = match loc.get("timestamp") {
        None | Some(Value::Null) => Some(now),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Some(_) => None,
    };
    if timestamp.is_none() {
        issues.push(FieldIssue::new(
            "current_location.timestamp",
            "must be an RFC 3339 string or epoch milliseconds",
        ));
    }

    if issues.len() > before {
        return None;
    }

    Some(Geolocation {
        latitude: latitude?,
        longitude: longitude?,
        accuracy,
        timestamp: timestamp?,
    })
}

fn coordinate(
    loc: &Map<String, Value>,
    key: &str,
    bound: f64,
    issues: &mut Vec<FieldIssue>,
) -> Option<f64> {
    match loc.get(key).and_then(Value::as_f64) {
        Some(v) if v.is_finite() && (-bound..=bound).contains(&v) => Some(v),
        Some(_) => {
            issues.push(FieldIssue::new(
                format!("current_location.{}", key),
                format!("must be within [-{}, {}]", bound, bound),
            ));
            None
        }
        None => {
            issues.push(FieldIssue::new(
                format!("current_location.{}", key),
                "is required and must be a number",
            ));
            None
        }
    }
}

/// `http://…`, `https://…` with a non-empty remainder, or `/absolute/path`
pub fn is_url_shaped(s: &str) -> bool {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        return false;
    }
    if let Some(rest) = s.strip_prefix("https://").or_else(|| s.strip_prefix("http://")) {
        return !rest.is_empty() && !rest.starts_with('/');
    }
    s.starts_with('/') && s.len() > 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap()
    }

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_parse_body_rejects_non_object() {
        assert!(parse_body(b"[1,2]").is_err());
        assert!(parse_body(b"{not json").is_err());
        assert!(parse_body(br#"{"stepNumber": 1}"#).is_ok());
    }

    #[test]
    fn test_envelope_requires_integer_step() {
        assert!(parse_envelope(&obj(json!({}))).is_err());
        assert!(parse_envelope(&obj(json!({"stepNumber": "2"}))).is_err());
        assert!(parse_envelope(&obj(json!({"stepNumber": 2.5}))).is_err());

        let envelope = parse_envelope(&obj(json!({"stepNumber": 9}))).unwrap();
        assert_eq!(envelope.step_number, 9);
        assert!(!envelope.flags.any());
    }

    #[test]
    fn test_envelope_flags_must_be_boolean() {
        assert!(parse_envelope(&obj(json!({"stepNumber": 1, "force_validation": "yes"}))).is_err());

        let envelope = parse_envelope(&obj(json!({
            "stepNumber": 1,
            "supervisor_override": true,
            "expected_version": 4
        })))
        .unwrap();
        assert!(envelope.flags.supervisor_override);
        assert!(envelope.flags.any());
        assert_eq!(envelope.expected_version, Some(4));
    }

    #[test]
    fn test_full_payload_collected() {
        let body = obj(json!({
            "stepNumber": 1,
            "data": {"paint_condition": "good", "nested": {"a": 1}},
            "measurements": {"paint_thickness_um": 110, "temperature_c": 21.5},
            "observations": ["scratch on rear bumper"],
            "photo_urls": ["https://cdn.example.com/a.jpg", "/photos/x/y.jpg"],
            "notes": "customer present",
            "current_location": {"latitude": 45.5, "longitude": -73.6, "accuracy": 12.0}
        }));

        let payload = collect_payload(&body, now()).unwrap();

        assert_eq!(payload.collected_data["paint_condition"], "good");
        assert_eq!(payload.measurements["paint_thickness_um"], 110.0);
        assert_eq!(payload.observations.len(), 1);
        assert_eq!(payload.photo_urls.len(), 2);
        let geo = payload.geolocation.unwrap();
        assert_eq!(geo.timestamp, now());
        assert_eq!(geo.accuracy, Some(12.0));
    }

    #[test]
    fn test_all_shape_issues_reported_together() {
        let body = obj(json!({
            "data": [1, 2],
            "measurements": {"thickness": "thick"},
            "observations": ["ok", 3],
            "photo_urls": ["not a url"],
            "current_location": {"latitude": 91.0, "longitude": 200.0, "accuracy": -1}
        }));

        let issues = collect_payload(&body, now()).unwrap_err();
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();

        assert_eq!(
            fields,
            vec![
                "data",
                "measurements.thickness",
                "observations[1]",
                "photo_urls[0]",
                "current_location.latitude",
                "current_location.longitude",
                "current_location.accuracy",
            ]
        );
    }

    #[test]
    fn test_coordinate_bounds_inclusive() {
        let body = obj(json!({
            "current_location": {"latitude": -90.0, "longitude": 180.0}
        }));
        assert!(collect_payload(&body, now()).is_ok());
    }

    #[test]
    fn test_geolocation_epoch_millis_timestamp() {
        let body = obj(json!({
            "current_location": {"latitude": 1.0, "longitude": 2.0, "timestamp": 1_700_000_000_000i64}
        }));
        let geo = collect_payload(&body, now()).unwrap().geolocation.unwrap();
        assert_eq!(geo.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_missing_coordinate_reported() {
        let body = obj(json!({"current_location": {"latitude": 1.0}}));
        let issues = collect_payload(&body, now()).unwrap_err();
        assert_eq!(issues[0].field, "current_location.longitude");
    }

    #[test]
    fn test_url_shapes() {
        assert!(is_url_shaped("https://example.com/x.jpg"));
        assert!(is_url_shaped("http://10.0.0.1:8080/p"));
        assert!(is_url_shaped("/photos/abc.jpg"));
        assert!(!is_url_shaped("https://"));
        assert!(!is_url_shaped("https:///path"));
        assert!(!is_url_shaped("/"));
        assert!(!is_url_shaped("ftp://example.com/x"));
        assert!(!is_url_shaped("photo.jpg"));
        assert!(!is_url_shaped("https://exa mple.com"));
    }

    #[test]
    fn test_null_fields_treated_as_absent() {
        let body = obj(json!({
            "data": null, "measurements": null, "observations": null,
            "photo_urls": null, "notes": null, "current_location": null
        }));
        assert_eq!(collect_payload(&body, now()).unwrap(), StepPayload::default());
    }
}
