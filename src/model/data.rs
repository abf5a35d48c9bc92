use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::model::{Record, RecordId};

/// One desired association for a relationship.
///
/// Either the bare secondary id (`"stuff-one"`, `90`) or an object carrying
/// the id plus extra columns stored on the association row
/// (`{ "id": 90, "title": "First" }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipEntry {
    Object(Record),
    Id(Value),
}

impl RelationshipEntry {
    /// Split into the secondary id and the remaining extra fields.
    /// An object entry without `id` yields `null` as its secondary id.
    pub fn into_parts(self) -> (Value, Record) {
        match self {
            RelationshipEntry::Id(id) => (id, Record::new()),
            RelationshipEntry::Object(mut fields) => {
                let id = fields.shift_remove("id").unwrap_or(Value::Null);
                (id, fields)
            }
        }
    }
}

impl From<Value> for RelationshipEntry {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => RelationshipEntry::Object(fields),
            other => RelationshipEntry::Id(other),
        }
    }
}

/// Validated payload of a single save request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataToSave {
    /// Present only when updating an existing primary record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub main: Record,
    pub relationships: BTreeMap<String, Vec<RelationshipEntry>>,
}

impl DataToSave {
    pub fn is_new_record(&self) -> bool {
        self.id.is_none()
    }

    pub fn has_relationships(&self) -> bool {
        !self.relationships.is_empty()
    }
}
