//! Inbound reading types and validation.
//!
//! Readings arrive as raw JSON with a flat shape:
//!
//! ```json
//! {"key": "sensor-1", "timestamp": "2024-05-01T12:00:00Z", "temperature": 50.0}
//! ```
//!
//! Any member other than `key` and `timestamp` with a numeric value is
//! kept as a telemetry field. A reading whose timestamp does not parse is
//! never admitted to a window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One validated, timestamped sensor reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reading {
    /// Sensor identifier
    pub key: String,
    /// Absolute instant the reading was taken
    pub timestamp: DateTime<Utc>,
    /// Named numeric telemetry values
    pub fields: BTreeMap<String, f64>,
}

impl Reading {
    /// Parse and validate a raw reading payload.
    ///
    /// Non-numeric extra members are ignored; they carry no samples.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ReadingError> {
        let obj = value.as_object().ok_or(ReadingError::NotAnObject)?;

        let key = obj
            .get("key")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or(ReadingError::MissingKey)?
            .to_string();

        let raw_timestamp = obj
            .get("timestamp")
            .and_then(|v| v.as_str())
            .ok_or(ReadingError::MissingTimestamp)?;

        let timestamp = DateTime::parse_from_rfc3339(raw_timestamp)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| ReadingError::InvalidTimestamp(raw_timestamp.to_string()))?;

        let fields = obj
            .iter()
            .filter(|(name, _)| name.as_str() != "key" && name.as_str() != "timestamp")
            .filter_map(|(name, v)| v.as_f64().map(|n| (name.clone(), n)))
            .collect();

        Ok(Self {
            key,
            timestamp,
            fields,
        })
    }
}

/// A raw inbound payload, either as bytes in hand or as already-parsed JSON.
///
/// Both cases materialize through [`InboundPayload::into_value`]; callers
/// never branch on where the payload came from.
#[derive(Debug, Clone)]
pub enum InboundPayload {
    /// Raw bytes from a transport (HTTP body, message bus frame)
    Bytes(Vec<u8>),
    /// A JSON value already materialized by the caller
    Value(serde_json::Value),
}

impl InboundPayload {
    /// Materialize the payload into a JSON value.
    pub fn into_value(self) -> Result<serde_json::Value, ReadingError> {
        match self {
            InboundPayload::Bytes(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ReadingError::InvalidJson(e.to_string())),
            InboundPayload::Value(value) => Ok(value),
        }
    }
}

/// Validation failures for inbound readings. All recoverable: the reading
/// is dropped and engine state is untouched.
#[derive(Debug)]
pub enum ReadingError {
    InvalidJson(String),
    NotAnObject,
    MissingKey,
    MissingTimestamp,
    InvalidTimestamp(String),
}

impl std::fmt::Display for ReadingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadingError::InvalidJson(e) => write!(f, "payload is not valid JSON: {e}"),
            ReadingError::NotAnObject => write!(f, "payload is not a JSON object"),
            ReadingError::MissingKey => write!(f, "payload has no string 'key' member"),
            ReadingError::MissingTimestamp => write!(f, "payload has no string 'timestamp' member"),
            ReadingError::InvalidTimestamp(raw) => write!(f, "unparseable timestamp '{raw}'"),
        }
    }
}

impl std::error::Error for ReadingError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_valid_reading() {
        let value = json!({
            "key": "sensor-1",
            "timestamp": "2024-05-01T12:00:00Z",
            "temperature": 50.0,
            "pressure": 101.3
        });

        let reading = Reading::from_json(&value).unwrap();
        assert_eq!(reading.key, "sensor-1");
        assert_eq!(reading.fields.len(), 2);
        assert_eq!(reading.fields["temperature"], 50.0);
        assert_eq!(reading.fields["pressure"], 101.3);
    }

    #[test]
    fn test_rejects_unparseable_timestamp() {
        let value = json!({"key": "a", "timestamp": "not-a-date", "temperature": 1.0});
        assert!(matches!(
            Reading::from_json(&value),
            Err(ReadingError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_rejects_missing_key() {
        let value = json!({"timestamp": "2024-05-01T12:00:00Z"});
        assert!(matches!(
            Reading::from_json(&value),
            Err(ReadingError::MissingKey)
        ));

        let value = json!({"key": "", "timestamp": "2024-05-01T12:00:00Z"});
        assert!(matches!(
            Reading::from_json(&value),
            Err(ReadingError::MissingKey)
        ));
    }

    #[test]
    fn test_rejects_numeric_timestamp() {
        // Timestamps must be parseable strings, not epoch numbers.
        let value = json!({"key": "a", "timestamp": 1714564800});
        assert!(matches!(
            Reading::from_json(&value),
            Err(ReadingError::MissingTimestamp)
        ));
    }

    #[test]
    fn test_non_numeric_fields_ignored() {
        let value = json!({
            "key": "a",
            "timestamp": "2024-05-01T12:00:00Z",
            "temperature": 21.5,
            "status": "nominal"
        });

        let reading = Reading::from_json(&value).unwrap();
        assert_eq!(reading.fields.len(), 1);
        assert!(reading.fields.contains_key("temperature"));
    }

    #[test]
    fn test_reading_with_no_fields_is_valid() {
        let value = json!({"key": "a", "timestamp": "2024-05-01T12:00:00Z"});
        let reading = Reading::from_json(&value).unwrap();
        assert!(reading.fields.is_empty());
    }

    #[test]
    fn test_timezone_offsets_normalized_to_utc() {
        let value = json!({"key": "a", "timestamp": "2024-05-01T14:00:00+02:00"});
        let reading = Reading::from_json(&value).unwrap();
        assert_eq!(
            reading.timestamp,
            "2024-05-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
    }

    #[test]
    fn test_payload_bytes_materialize() {
        let payload = InboundPayload::Bytes(br#"{"key":"a"}"#.to_vec());
        let value = payload.into_value().unwrap();
        assert_eq!(value["key"], "a");

        let payload = InboundPayload::Bytes(b"not json".to_vec());
        assert!(matches!(
            payload.into_value(),
            Err(ReadingError::InvalidJson(_))
        ));
    }
}
