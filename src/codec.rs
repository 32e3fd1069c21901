//! Text encoding for values stored in the remote tier.
//!
//! Encoding never fails and decoding degrades to an opaque string, so a value
//! written by another client in a foreign format still reads back.

use crate::error::CacheError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Encode a value to its JSON text form.
pub fn encode(value: &Value) -> String {
    match serde_json::to_string(value) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Failed to encode value, storing display form: {:?}", e);
            value.to_string()
        }
    }
}

/// Decode JSON text, returning the raw text as a string value if it does not parse.
pub fn decode(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

pub fn to_value<T: Serialize>(value: &T) -> Result<Value, CacheError> {
    serde_json::to_value(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, CacheError> {
    serde_json::from_value(value).map_err(|e| CacheError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_decode_object() {
        let value = json!({"a": 1, "b": [true, null]});
        let text = encode(&value);
        assert_eq!(decode(&text), value);
    }

    #[test]
    fn test_decode_invalid_json_passes_through() {
        assert_eq!(decode("not json {"), Value::String("not json {".to_string()));
        assert_eq!(decode(""), Value::String(String::new()));
    }

    #[test]
    fn test_string_values_keep_quotes_on_the_wire() {
        let text = encode(&json!("x"));
        assert_eq!(text, "\"x\"");
        assert_eq!(decode(&text), json!("x"));
    }

    #[test]
    fn test_typed_helpers() {
        #[derive(Serialize, serde::Deserialize, Debug, PartialEq)]
        struct User {
            id: u32,
            name: String,
        }

        let user = User {
            id: 7,
            name: "ada".to_string(),
        };
        let value = to_value(&user).unwrap();
        let back: User = from_value(value).unwrap();
        assert_eq!(back, user);

        let err = from_value::<User>(json!("nope")).unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
