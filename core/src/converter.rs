//! Pluggable JSON conversion applied around request and response payloads.
//!
//! Converters operate on `serde_json::Value` so a proxy can hold one behind a
//! trait object while staying generic over its payload types.

use serde_json::Value;

pub trait JsonConverter: Send + Sync {
    /// Rewrites a serialized request payload before it is sent.
    fn to_wire(&self, value: Value) -> Result<Value, serde_json::Error> {
        Ok(value)
    }

    /// Rewrites a received payload before it is deserialized.
    fn from_wire(&self, value: Value) -> Result<Value, serde_json::Error>;
}

/// Passes payloads through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityConverter;

impl JsonConverter for IdentityConverter {
    fn from_wire(&self, value: Value) -> Result<Value, serde_json::Error> {
        Ok(value)
    }
}

/// Unwraps `{ "items": [...] }` collection envelopes into the bare array.
///
/// Payloads that are already arrays are passed through.
#[derive(Debug, Default, Clone, Copy)]
pub struct ItemsEnvelopeConverter;

impl JsonConverter for ItemsEnvelopeConverter {
    fn from_wire(&self, value: Value) -> Result<Value, serde_json::Error> {
        match value {
            Value::Object(mut map) => match map.remove("items") {
                Some(items @ Value::Array(_)) => Ok(items),
                Some(other) => Err(serde::de::Error::custom(format!(
                    "collection envelope items must be an array, got {other}"
                ))),
                None => Ok(Value::Array(Vec::new())),
            },
            items @ Value::Array(_) => Ok(items),
            other => Err(serde::de::Error::custom(format!(
                "expected a collection envelope, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn envelope_is_unwrapped() {
        let value = json!({"totalCount": 2, "items": [{"id": "a"}, {"id": "b"}]});
        let out = ItemsEnvelopeConverter.from_wire(value).unwrap();
        assert_eq!(out, json!([{"id": "a"}, {"id": "b"}]));
    }

    #[test]
    fn missing_items_is_empty() {
        let out = ItemsEnvelopeConverter.from_wire(json!({"totalCount": 0})).unwrap();
        assert_eq!(out, json!([]));
    }

    #[test]
    fn scalars_are_rejected() {
        assert!(ItemsEnvelopeConverter.from_wire(json!("nope")).is_err());
        assert!(ItemsEnvelopeConverter.from_wire(json!({"items": 3})).is_err());
    }
}
