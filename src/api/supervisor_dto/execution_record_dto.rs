use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::utils::id::RequestId;

/// One entry of a supervisor's `request-history`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExecutionRecordDto {
    pub request_id: RequestId,

    #[serde(default)]
    pub deployment_id: String,

    #[serde(default)]
    pub module_name: String,

    #[serde(default)]
    pub function_name: String,

    #[serde(default)]
    pub success: bool,

    /// Either an ISO-8601 string (with or without offset) or epoch milliseconds.
    #[serde(default)]
    pub work_queued_at: serde_json::Value,

    #[serde(default)]
    pub result: serde_json::Value,

    #[serde(flatten)]
    pub extra_fields: HashMap<String, serde_json::Value>,
}

impl ExecutionRecordDto {
    /// Parsed queue time. `None` when the field is missing or unreadable.
    pub fn queued_at(&self) -> Option<DateTime<Utc>> {
        match &self.work_queued_at {
            serde_json::Value::String(raw) => parse_timestamp(raw),
            serde_json::Value::Number(number) => number.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            _ => None,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_offset.with_timezone(&Utc));
    }

    // Supervisors write naive local timestamps; they are compared as if they were UTC.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_with(queued: serde_json::Value) -> ExecutionRecordDto {
        serde_json::from_value(json!({ "request_id": "r1", "work_queued_at": queued })).unwrap()
    }

    #[test]
    fn parses_supported_timestamp_shapes() {
        let rfc = record_with(json!("2024-05-01T10:00:00+00:00")).queued_at().unwrap();
        let naive = record_with(json!("2024-05-01T10:00:00.250000")).queued_at().unwrap();
        let spaced = record_with(json!("2024-05-01 10:00:01")).queued_at().unwrap();
        let millis = record_with(json!(1714557602000i64)).queued_at().unwrap();

        assert!(rfc < naive);
        assert!(naive < spaced);
        assert!(spaced < millis);
    }

    #[test]
    fn unreadable_timestamp_is_none() {
        assert_eq!(record_with(json!("yesterday")).queued_at(), None);
        assert_eq!(record_with(json!(null)).queued_at(), None);
    }
}
