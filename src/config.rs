use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{EntitySchema, RelationshipConfig};
use crate::store::{MemoryStore, ModelRegistry};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Save endpoints keyed by entity name
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointConfig>,
    /// Storage settings per collection name
    #[serde(default)]
    pub collections: HashMap<String, CollectionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub schema: EntitySchema,
    #[serde(default)]
    pub relationships: HashMap<String, RelationshipConfig>,
    #[serde(default)]
    pub distinct_validation_code: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Each entry is one unique index over the listed fields
    #[serde(default)]
    pub unique_indexes: Vec<Vec<String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with_file("apisave")
    }

    /// Same as [`AppConfig::load`] with an explicit config file name (any
    /// extension the `config` crate understands; the file is optional).
    pub fn load_with_file(file_name: &str) -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name(file_name).required(false));

        // Add environment variables with prefix "APISAVE"
        config = config.add_source(
            config::Environment::with_prefix("APISAVE")
                .separator("__")
                .prefix_separator("_"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Every collection the configured endpoints need: the entities
    /// themselves plus their relationship collections.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .endpoints
            .iter()
            .flat_map(|(entity, endpoint)| {
                std::iter::once(entity.clone()).chain(
                    endpoint
                        .relationships
                        .values()
                        .map(|relationship| relationship.collection.clone()),
                )
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Build an in-memory registry holding one collection per name the
    /// configuration refers to.
    pub fn build_registry(&self) -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        for name in self.collection_names() {
            let mut store = MemoryStore::new(name.clone());
            if let Some(collection) = self.collections.get(&name) {
                for index in &collection.unique_indexes {
                    let fields: Vec<&str> = index.iter().map(|f| f.as_str()).collect();
                    store = store.with_unique_index(&fields);
                }
            }
            registry.register(name, Arc::new(store));
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> AppConfig {
        serde_json::from_value(json!({
            "endpoints": {
                "product": {
                    "schema": {
                        "main": {"type": "object", "fields": {"name": {"type": "string"}}},
                        "relationships": {
                            "type": "object",
                            "fields": {"categories": {"type": "list", "items": {"type": "number"}, "optional": true}}
                        }
                    },
                    "relationships": {
                        "categories": {
                            "collection": "product_category",
                            "main_identifier_field": "product",
                            "secondary_identifier_field": "category",
                            "should_clean": true
                        }
                    }
                }
            },
            "collections": {
                "product": {"unique_indexes": [["name"]]}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn test_endpoint_config_shape() {
        let config = sample();
        let product = &config.endpoints["product"];

        assert!(!product.distinct_validation_code);
        assert!(product.relationships["categories"].should_clean);
        assert_eq!(
            config.collection_names(),
            vec!["product".to_string(), "product_category".to_string()]
        );
    }

    #[test]
    fn test_build_registry_registers_every_collection() {
        let registry = sample().build_registry();

        assert!(registry.contains("product"));
        assert!(registry.contains("product_category"));
        assert_eq!(registry.names().count(), 2);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = AppConfig::load_with_file("does-not-exist").unwrap();
        assert!(config.endpoints.is_empty());
    }
}
