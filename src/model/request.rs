use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::model::RecordId;
use crate::store::Session;

/// An incoming save request, already split from its transport.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Name of the primary entity to save
    pub entity: String,
    /// Identifier of the record to update; absent when creating
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Key/value pairs taken from the parent path segments
    #[serde(default)]
    pub parents: Map<String, Value>,
    /// Request body
    #[serde(default)]
    pub data: Value,
    #[serde(skip)]
    pub session: Option<Arc<dyn Session>>,
}

impl SaveRequest {
    pub fn new(entity: impl Into<String>, data: Value) -> Self {
        Self {
            entity: entity.into(),
            data,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_parent(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parents.insert(key.into(), value.into());
        self
    }

    pub fn with_session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }
}

impl std::fmt::Debug for SaveRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveRequest")
            .field("entity", &self.entity)
            .field("id", &self.id)
            .field("parents", &self.parents)
            .field("data", &self.data)
            .field("session", &self.session.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveBody {
    pub id: RecordId,
}

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<SaveBody>,
}

impl SaveResponse {
    pub const OK: u16 = 200;
    pub const NO_CONTENT: u16 = 204;

    pub fn saved(id: RecordId) -> Self {
        Self {
            status: Self::OK,
            body: Some(SaveBody { id }),
        }
    }

    /// Nothing was written and there is no identifier to report.
    pub fn no_content() -> Self {
        Self {
            status: Self::NO_CONTENT,
            body: None,
        }
    }

    pub fn id(&self) -> Option<&RecordId> {
        self.body.as_ref().map(|body| &body.id)
    }
}
