use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// A persisted row, keyed by column name.
pub type Record = Map<String, Value>;

/// Equality filter: every key must match the row's value exactly.
pub type Filter = Map<String, Value>;

/// Identifier of a primary record. Stores assign either numeric or string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl RecordId {
    /// Read an identifier out of a JSON scalar. Floats, booleans and
    /// structured values are not identifiers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(RecordId::Number),
            Value::String(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Number(n) => Value::from(*n),
            RecordId::Text(s) => Value::String(s.clone()),
        }
    }

    /// An empty string id is treated the same as "no id assigned".
    pub fn is_empty(&self) -> bool {
        matches!(self, RecordId::Text(s) if s.is_empty())
    }

    /// Single-field filter `{ "id": <self> }`.
    pub fn as_filter(&self) -> Filter {
        let mut filter = Filter::new();
        filter.insert("id".to_string(), self.to_value());
        filter
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Number(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        RecordId::Text(value)
    }
}

impl From<RecordId> for Value {
    fn from(id: RecordId) -> Self {
        id.to_value()
    }
}

pub fn generate_id() -> RecordId {
    RecordId::Text(Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_id_from_value() {
        assert_eq!(RecordId::from_value(&json!(10)), Some(RecordId::Number(10)));
        assert_eq!(
            RecordId::from_value(&json!("abc")),
            Some(RecordId::Text("abc".to_string()))
        );
        assert_eq!(RecordId::from_value(&json!(1.5)), None);
        assert_eq!(RecordId::from_value(&json!({"id": 1})), None);
    }

    #[test]
    fn test_record_id_untagged_serde() {
        let id: RecordId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(id, RecordId::Number(42));
        assert_eq!(serde_json::to_value(RecordId::from("x")).unwrap(), json!("x"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(generate_id(), generate_id());
        assert!(!generate_id().is_empty());
    }
}
