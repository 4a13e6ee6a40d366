//! Payload codec for workflow and activity records.
//!
//! Records serialize with camelCase field names (the wire convention of every
//! Harvest contract type). Decoding first tries the value as-is; if typed
//! decoding fails, map keys are normalized from snake_case to camelCase and
//! decoding is retried, so older snake_case payloads remain readable. Data
//! values are never rewritten, only keys that fail the first decode.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Error produced by encode/decode.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode payload: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode payload: {0}")]
    Decode(serde_json::Error),
}

/// Encode a record to its wire value.
pub fn to_value<T: Serialize>(value: &T) -> Result<Value, CodecError> {
    serde_json::to_value(value).map_err(CodecError::Encode)
}

/// Decode a record from a wire value, accepting snake_case keys.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, CodecError> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(decoded) => Ok(decoded),
        Err(first_err) => match serde_json::from_value::<T>(normalize_keys(value)) {
            Ok(decoded) => Ok(decoded),
            Err(_) => Err(CodecError::Decode(first_err)),
        },
    }
}

/// Recursively convert snake_case object keys to camelCase.
fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (camelize(&k), normalize_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_keys).collect()),
        other => other,
    }
}

fn camelize(key: &str) -> String {
    if !key.contains('_') {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for ch in key.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Record {
        entry_id: String,
        batch_size: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_cursor: Option<String>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "camelCase")]
    enum Tagged {
        #[serde(rename_all = "camelCase")]
        Fetch { entry_id: String },
        Noop,
    }

    #[test]
    fn encode_emits_camel_case() {
        let value = to_value(&Record {
            entry_id: "e1".to_string(),
            batch_size: 10,
            end_cursor: None,
        })
        .unwrap();
        assert_eq!(value["entryId"], "e1");
        assert_eq!(value["batchSize"], 10);
        assert!(value.get("endCursor").is_none());
    }

    #[test]
    fn round_trip() {
        let record = Record {
            entry_id: "e1".to_string(),
            batch_size: 3,
            end_cursor: Some("c".to_string()),
        };
        let back: Record = from_value(to_value(&record).unwrap()).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn decode_accepts_snake_case_keys() {
        let value = serde_json::json!({
            "entry_id": "e1",
            "batch_size": 5,
        });
        let record: Record = from_value(value).unwrap();
        assert_eq!(record.entry_id, "e1");
        assert_eq!(record.batch_size, 5);
    }

    #[test]
    fn decode_handles_nested_snake_case() {
        let value = serde_json::json!({
            "kind": "fetch",
            "entry_id": "e9",
        });
        let tagged: Tagged = from_value(value).unwrap();
        assert_eq!(
            tagged,
            Tagged::Fetch {
                entry_id: "e9".to_string()
            }
        );
    }

    #[test]
    fn tagged_unit_variants_round_trip() {
        let back: Tagged = from_value(to_value(&Tagged::Noop).unwrap()).unwrap();
        assert_eq!(back, Tagged::Noop);
    }

    #[test]
    fn camel_payload_is_untouched() {
        // Values containing underscores must never be rewritten.
        let value = serde_json::json!({
            "entryId": "entry_with_underscores",
            "batchSize": 1,
        });
        let record: Record = from_value(value).unwrap();
        assert_eq!(record.entry_id, "entry_with_underscores");
    }

    #[test]
    fn camelize_key_shapes() {
        assert_eq!(camelize("entry_id"), "entryId");
        assert_eq!(camelize("already"), "already");
        assert_eq!(camelize("a_b_c"), "aBC");
    }
}
