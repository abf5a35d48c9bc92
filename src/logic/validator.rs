use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::SaveError;
use crate::model::{DataToSave, EntitySchema, RecordId, RelationshipEntry, SchemaViolation};
use crate::store::{scoped, ModelResolver, ModelStore, Session};

/// Turns a raw request into a [`DataToSave`] and resolves its storage handle.
pub struct SaveValidator;

impl SaveValidator {
    /// Validate the id, primary fields and relationship lists of a request.
    ///
    /// Parent path pairs are merged over the body first, so they are
    /// validated (and stored) like any other field. Schema failures become
    /// `InvalidRequestData`, or `Validation` when `distinct_validation_code`
    /// is set.
    pub fn validate_data(
        payload: &Value,
        parents: &Map<String, Value>,
        raw_id: Option<&Value>,
        schema: &EntitySchema,
        distinct_validation_code: bool,
    ) -> Result<DataToSave, SaveError> {
        let to_error = |violation: SchemaViolation| {
            let path = violation.path_string();
            let message = violation.to_string();
            if distinct_validation_code {
                SaveError::Validation { message, path }
            } else {
                SaveError::InvalidRequestData {
                    message,
                    path: Some(path),
                }
            }
        };

        let merged = Self::merge_parents(payload, parents);

        let id = Self::validate_id(raw_id, schema).map_err(to_error)?;
        let main = Self::validate_main(&merged, schema).map_err(to_error)?;
        let relationships = Self::validate_relationships(&merged, schema).map_err(to_error)?;

        Ok(DataToSave {
            id,
            main,
            relationships,
        })
    }

    /// Resolve the storage handle for `entity`, scoped through the session
    /// when the request carries one.
    pub fn validate_model(
        resolver: &dyn ModelResolver,
        entity: &str,
        session: Option<&Arc<dyn Session>>,
    ) -> Result<Arc<dyn ModelStore>, SaveError> {
        let store = resolver
            .resolve(entity)
            .map_err(|e| SaveError::invalid_entity(e.to_string()))?;
        Ok(scoped(session, entity, &store))
    }

    fn merge_parents(payload: &Value, parents: &Map<String, Value>) -> Value {
        match payload {
            Value::Object(body) => {
                let mut merged = body.clone();
                for (key, value) in parents {
                    merged.insert(key.clone(), value.clone());
                }
                Value::Object(merged)
            }
            Value::Null => Value::Object(parents.clone()),
            other => other.clone(),
        }
    }

    fn validate_id(raw_id: Option<&Value>, schema: &EntitySchema) -> Result<Option<RecordId>, SchemaViolation> {
        let mut path = vec!["id".to_string()];
        let Some(value) = schema.id.validate(raw_id, &mut path)? else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }

        RecordId::from_value(&value).map(Some).ok_or_else(|| SchemaViolation {
            path,
            reason: format!(
                "Expected a value of type `string | number` but received `{}`",
                value
            ),
        })
    }

    fn validate_main(merged: &Value, schema: &EntitySchema) -> Result<Map<String, Value>, SchemaViolation> {
        let mut path = vec!["main".to_string()];
        match schema.main.validate(merged, &mut path)? {
            Value::Object(main) => Ok(main),
            other => Err(SchemaViolation {
                path,
                reason: format!("Expected a value of type `object` but received `{}`", other),
            }),
        }
    }

    fn validate_relationships(
        merged: &Value,
        schema: &EntitySchema,
    ) -> Result<BTreeMap<String, Vec<RelationshipEntry>>, SchemaViolation> {
        let mut path = vec!["relationships".to_string()];
        let sanitized = match schema.relationships.validate(merged, &mut path)? {
            Value::Object(relationships) => relationships,
            other => {
                return Err(SchemaViolation {
                    path,
                    reason: format!("Expected a value of type `object` but received `{}`", other),
                })
            }
        };

        let mut relationships = BTreeMap::new();
        for (name, value) in sanitized {
            match value {
                Value::Array(entries) => {
                    relationships.insert(name, entries.into_iter().map(RelationshipEntry::from).collect());
                }
                other => {
                    path.push(name);
                    return Err(SchemaViolation {
                        path,
                        reason: format!("Expected a value of type `list` but received `{}`", other),
                    });
                }
            }
        }

        Ok(relationships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::FieldSchema;
    use crate::store::{MemoryStore, ModelRegistry};
    use serde_json::json;

    fn schema_with_relationships() -> EntitySchema {
        EntitySchema::new(
            FieldSchema::Number.optional(),
            FieldSchema::object([("name", FieldSchema::String.required())]),
            FieldSchema::object([
                ("relatedStuff", FieldSchema::list(FieldSchema::String).optional()),
                ("otherRelatedStuff", FieldSchema::list(FieldSchema::String).optional()),
            ]),
        )
    }

    #[test]
    fn test_valid_payload_is_split_into_main_and_relationships() {
        let data = SaveValidator::validate_data(
            &json!({
                "name": "The name",
                "relatedStuff": ["stuff-one", "stuff-two"],
                "otherRelatedStuff": []
            }),
            &Map::new(),
            Some(&json!(10)),
            &schema_with_relationships(),
            false,
        )
        .unwrap();

        assert_eq!(data.id, Some(RecordId::Number(10)));
        assert_eq!(Value::Object(data.main), json!({"name": "The name"}));
        assert_eq!(data.relationships["relatedStuff"].len(), 2);
        assert!(data.relationships["otherRelatedStuff"].is_empty());
    }

    #[test]
    fn test_invalid_relationship_reports_path() {
        let err = SaveValidator::validate_data(
            &json!({
                "name": "The name",
                "relatedStuff": ["stuff-one"],
                "otherRelatedStuff": "other-stuff-but-invalid"
            }),
            &Map::new(),
            Some(&json!(10)),
            &schema_with_relationships(),
            false,
        )
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InvalidRequestData);
        assert_eq!(err.path(), Some("relationships.otherRelatedStuff"));
        assert!(err.to_string().ends_with(" in relationships.otherRelatedStuff"));
    }

    #[test]
    fn test_invalid_id_and_non_object_payload() {
        let err = SaveValidator::validate_data(
            &json!({"name": "n"}),
            &Map::new(),
            Some(&json!("invalidId")),
            &schema_with_relationships(),
            false,
        )
        .unwrap_err();
        assert_eq!(err.path(), Some("id"));

        let err = SaveValidator::validate_data(
            &json!(["notValidData"]),
            &Map::new(),
            None,
            &EntitySchema::default(),
            false,
        )
        .unwrap_err();
        assert_eq!(err.path(), Some("main"));
    }

    #[test]
    fn test_schema_failure_code_can_be_distinct() {
        let err = SaveValidator::validate_data(
            &json!({}),
            &Map::new(),
            None,
            &schema_with_relationships(),
            true,
        )
        .unwrap_err();

        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.path(), Some("main.name"));
    }

    #[test]
    fn test_parents_are_merged_and_override_body() {
        let schema = EntitySchema::new(
            FieldSchema::String.optional(),
            FieldSchema::object([
                ("name", FieldSchema::String.required()),
                ("store", FieldSchema::String.required()),
            ]),
            FieldSchema::object([]),
        );
        let mut parents = Map::new();
        parents.insert("store".to_string(), json!("store-1"));

        let data = SaveValidator::validate_data(
            &json!({"name": "n", "store": "spoofed"}),
            &parents,
            None,
            &schema,
            false,
        )
        .unwrap();

        assert!(data.is_new_record());
        assert!(!data.has_relationships());
        assert_eq!(Value::Object(data.main), json!({"name": "n", "store": "store-1"}));
    }

    #[test]
    fn test_validate_model_maps_missing_model_to_invalid_entity() {
        let registry = ModelRegistry::new().with_model("product", Arc::new(MemoryStore::new("product")));

        assert!(SaveValidator::validate_model(&registry, "product", None).is_ok());

        let err = SaveValidator::validate_model(&registry, "some-entity", None).err().unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidEntity);
    }
}
