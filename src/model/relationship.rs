use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::store::ModelStore;

/// Relationship settings as they appear in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipConfig {
    /// Name of the association collection, resolved through the model resolver
    pub collection: String,
    pub main_identifier_field: String,
    pub secondary_identifier_field: String,
    /// Remove associations that are no longer desired (existing records only)
    #[serde(default)]
    pub should_clean: bool,
}

/// Relationship settings with the association store already resolved.
#[derive(Clone)]
pub struct RelationshipParameters {
    pub collection: String,
    pub store: Arc<dyn ModelStore>,
    pub main_identifier_field: String,
    pub secondary_identifier_field: String,
    pub should_clean: bool,
}

impl RelationshipParameters {
    pub fn new(
        collection: impl Into<String>,
        store: Arc<dyn ModelStore>,
        main_identifier_field: impl Into<String>,
        secondary_identifier_field: impl Into<String>,
        should_clean: bool,
    ) -> Self {
        Self {
            collection: collection.into(),
            store,
            main_identifier_field: main_identifier_field.into(),
            secondary_identifier_field: secondary_identifier_field.into(),
            should_clean,
        }
    }
}

impl fmt::Debug for RelationshipParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipParameters")
            .field("collection", &self.collection)
            .field("main_identifier_field", &self.main_identifier_field)
            .field("secondary_identifier_field", &self.secondary_identifier_field)
            .field("should_clean", &self.should_clean)
            .finish()
    }
}
