//! Key Values - Hashable identity and foreign key values
//!
//! Rows carry their attributes as JSON, which is not hashable. Relation
//! matching groups rows by key, so key columns are normalized into
//! [`KeyValue`] before they are compared.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A value usable as an identity or foreign key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    /// Integer key (auto-increment ids and the columns pointing at them)
    Integer(i64),
    /// Text key (uuids, natural keys)
    Text(String),
}

impl KeyValue {
    /// Normalize a JSON attribute into a key.
    ///
    /// `null`, booleans, arrays and objects are never keys. Floats only
    /// qualify when they carry an integral value.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(KeyValue::Integer(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| KeyValue::Integer(f as i64))
                }
            }
            Value::String(s) => Some(KeyValue::Text(s.clone())),
            _ => None,
        }
    }

    /// Convert back to a JSON value for query parameters
    pub fn to_json(&self) -> Value {
        match self {
            KeyValue::Integer(i) => Value::from(*i),
            KeyValue::Text(s) => Value::String(s.clone()),
        }
    }

    /// Extract as i64 if this is an integer key
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KeyValue::Integer(i) => Some(*i),
            KeyValue::Text(_) => None,
        }
    }

    /// Extract as str if this is a text key
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyValue::Integer(_) => None,
            KeyValue::Text(s) => Some(s),
        }
    }
}

impl std::fmt::Display for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyValue::Integer(i) => write!(f, "{}", i),
            KeyValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Integer(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Integer(value as i64)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Text(value)
    }
}

impl From<Uuid> for KeyValue {
    fn from(value: Uuid) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl From<KeyValue> for Value {
    fn from(key: KeyValue) -> Self {
        key.to_json()
    }
}

impl From<&KeyValue> for Value {
    fn from(key: &KeyValue) -> Self {
        key.to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        assert_eq!(KeyValue::from_json(&json!(7)), Some(KeyValue::Integer(7)));
        assert_eq!(KeyValue::from_json(&json!(7.0)), Some(KeyValue::Integer(7)));
        assert_eq!(KeyValue::from_json(&json!("abc")), Some(KeyValue::Text("abc".into())));
        assert_eq!(KeyValue::from_json(&json!(7.5)), None);
        assert_eq!(KeyValue::from_json(&Value::Null), None);
        assert_eq!(KeyValue::from_json(&json!(true)), None);
        assert_eq!(KeyValue::from_json(&json!([1])), None);
    }

    #[test]
    fn test_integer_and_text_keys_are_distinct() {
        assert_ne!(KeyValue::from(1), KeyValue::from("1"));
    }

    #[test]
    fn test_uuid_key() {
        let id = Uuid::new_v4();
        let key = KeyValue::from(id);
        assert_eq!(key.as_str(), Some(id.to_string().as_str()));
        assert_eq!(key.to_json(), json!(id.to_string()));
    }
}
