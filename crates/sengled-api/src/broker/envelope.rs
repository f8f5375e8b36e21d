// Broker payload envelope
//
// Pushes and commands share one shape: a JSON array (sometimes a bare
// object) of `{dn, type, value, time}` entries, one per attribute.
// Values arrive as strings or numbers and are always sent as strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::cloud::models::value_text;
use crate::endpoints::COMMAND_EPOCH_OFFSET;

/// Why an inbound payload could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not a JSON envelope: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("entry {index} is missing `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("entry {index} has a non-scalar value for `{attribute}`")]
    BadValue { index: usize, attribute: String },
}

/// One decoded `{dn, type, value, time}` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEntry {
    pub device_id: String,
    pub attribute: String,
    pub value: String,
    pub time: Option<i64>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    dn: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    time: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPush {
    Many(Vec<RawEntry>),
    One(RawEntry),
}

/// Decode a broker payload. A single malformed entry rejects the
/// whole message.
pub fn decode_push(payload: &[u8]) -> Result<Vec<PushEntry>, DecodeError> {
    let entries = match serde_json::from_slice::<RawPush>(payload)? {
        RawPush::Many(entries) => entries,
        RawPush::One(entry) => vec![entry],
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let device_id = raw
                .dn
                .filter(|d| !d.is_empty())
                .ok_or(DecodeError::MissingField { index, field: "dn" })?;
            let attribute = raw
                .kind
                .filter(|k| !k.is_empty())
                .ok_or(DecodeError::MissingField {
                    index,
                    field: "type",
                })?;
            let value = value_text(&raw.value).ok_or_else(|| DecodeError::BadValue {
                index,
                attribute: attribute.clone(),
            })?;
            let time = raw.time.as_ref().and_then(|t| match t {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            });
            Ok(PushEntry {
                device_id,
                attribute,
                value,
                time,
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct CommandEntry<'a> {
    dn: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
    time: String,
}

/// Command timestamp as the vendor app stamps it.
pub fn command_time(now: DateTime<Utc>) -> i64 {
    now.timestamp() - COMMAND_EPOCH_OFFSET
}

/// Encode one command envelope: an array with one entry per
/// `(attribute, value)` pair, all sharing `time`. The vendor app sends
/// `time` as a string, so this does too.
pub fn encode_command(
    device_id: &str,
    attributes: &[(String, String)],
    time: i64,
) -> Result<Vec<u8>, serde_json::Error> {
    let time = time.to_string();
    let entries: Vec<CommandEntry<'_>> = attributes
        .iter()
        .map(|(name, value)| CommandEntry {
            dn: device_id,
            kind: name,
            value,
            time: time.clone(),
        })
        .collect();
    serde_json::to_vec(&entries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_single_object() {
        let entries = decode_push(br#"{"dn":"dev1","type":"brightness","value":80}"#).unwrap();
        assert_eq!(
            entries,
            vec![PushEntry {
                device_id: "dev1".into(),
                attribute: "brightness".into(),
                value: "80".into(),
                time: None,
            }]
        );
    }

    #[test]
    fn decodes_array_with_string_values_and_time() {
        let payload = br#"[
            {"dn":"dev1","type":"switch","value":"1","time":183000000},
            {"dn":"dev1","type":"color","value":"255:0:0","time":"183000000"}
        ]"#;
        let entries = decode_push(payload).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].value, "1");
        assert_eq!(entries[1].value, "255:0:0");
        assert_eq!(entries[1].time, Some(183_000_000));
    }

    #[test]
    fn missing_dn_is_rejected() {
        let err = decode_push(br#"[{"type":"switch","value":"1"}]"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingField { field: "dn", .. }
        ));
    }

    #[test]
    fn missing_type_is_rejected() {
        let err = decode_push(br#"{"dn":"dev1","value":"1"}"#).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingField { field: "type", .. }
        ));
    }

    #[test]
    fn non_json_is_rejected() {
        assert!(matches!(
            decode_push(b"not json at all"),
            Err(DecodeError::NotJson(_))
        ));
    }

    #[test]
    fn object_value_is_rejected() {
        assert!(matches!(
            decode_push(br#"{"dn":"dev1","type":"switch","value":{"a":1}}"#),
            Err(DecodeError::BadValue { .. })
        ));
    }

    #[test]
    fn command_envelope_shape() {
        let bytes = encode_command(
            "dev1",
            &[("switch".into(), "0".into()), ("brightness".into(), "40".into())],
            42,
        )
        .unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                {"dn":"dev1","type":"switch","value":"0","time":"42"},
                {"dn":"dev1","type":"brightness","value":"40","time":"42"}
            ])
        );
    }

    #[test]
    fn command_time_uses_vendor_offset() {
        let now = Utc.timestamp_opt(1_577_858_400 + 90, 0).unwrap();
        assert_eq!(command_time(now), 90);
    }
}
