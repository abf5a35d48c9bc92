use anyhow::{anyhow, Result};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EndpointConfig;
use crate::error::SaveError;
use crate::logic::{
    ErrorClassifier, MainRecordWriter, NoHooks, RelationshipReconciler, SaveContext, SaveHooks,
    SaveValidator,
};
use crate::model::{DataToSave, EntitySchema, RelationshipParameters, SaveRequest, SaveResponse};
use crate::store::{ModelResolver, ModelStore, Session};

/// Immutable save configuration for one entity.
#[derive(Clone)]
pub struct SaveEndpoint {
    pub entity: String,
    pub schema: EntitySchema,
    pub relationships: HashMap<String, RelationshipParameters>,
    /// Report schema failures as `VALIDATION_ERROR` instead of `INVALID_REQUEST_DATA`
    pub distinct_validation_code: bool,
    pub hooks: Arc<dyn SaveHooks>,
}

impl SaveEndpoint {
    pub fn new(entity: impl Into<String>, schema: EntitySchema) -> Self {
        Self {
            entity: entity.into(),
            schema,
            relationships: HashMap::new(),
            distinct_validation_code: false,
            hooks: Arc::new(NoHooks),
        }
    }

    /// Build an endpoint from configuration, resolving every relationship
    /// collection to its store.
    pub fn from_config(
        entity: impl Into<String>,
        config: &EndpointConfig,
        resolver: &dyn ModelResolver,
    ) -> Result<Self, SaveError> {
        let mut endpoint = Self::new(entity, config.schema.clone())
            .with_distinct_validation_code(config.distinct_validation_code);

        for (name, relationship) in &config.relationships {
            let store = resolver
                .resolve(&relationship.collection)
                .map_err(|e| SaveError::invalid_entity(e.to_string()))?;
            endpoint.relationships.insert(
                name.clone(),
                RelationshipParameters::new(
                    relationship.collection.clone(),
                    store,
                    relationship.main_identifier_field.clone(),
                    relationship.secondary_identifier_field.clone(),
                    relationship.should_clean,
                ),
            );
        }

        Ok(endpoint)
    }

    pub fn with_relationship(mut self, name: impl Into<String>, parameters: RelationshipParameters) -> Self {
        self.relationships.insert(name.into(), parameters);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn SaveHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_distinct_validation_code(mut self, distinct: bool) -> Self {
        self.distinct_validation_code = distinct;
        self
    }
}

/// A request that passed validation, ready to be processed.
pub struct ValidatedSave {
    pub data: DataToSave,
    pub context: SaveContext,
    session: Option<Arc<dyn Session>>,
}

/// Drives a save request: validate, format, should-save check, primary
/// write, relationship reconciliation, post-save hook, response.
pub struct SaveOrchestrator {
    endpoint: SaveEndpoint,
    resolver: Arc<dyn ModelResolver>,
}

impl SaveOrchestrator {
    pub fn new(endpoint: SaveEndpoint, resolver: Arc<dyn ModelResolver>) -> Self {
        Self { endpoint, resolver }
    }

    /// Validate and process in one go.
    pub async fn handle(&self, request: SaveRequest) -> Result<SaveResponse, SaveError> {
        let validated = self.validate(request).await?;
        self.process(validated).await
    }

    pub async fn validate(&self, request: SaveRequest) -> Result<ValidatedSave, SaveError> {
        let entity = if request.entity.is_empty() {
            self.endpoint.entity.as_str()
        } else {
            request.entity.as_str()
        };
        debug!("Validating save request for '{}'", entity);

        let mut data = SaveValidator::validate_data(
            &request.data,
            &request.parents,
            request.id.as_ref(),
            &self.endpoint.schema,
            self.endpoint.distinct_validation_code,
        )?;
        let store = SaveValidator::validate_model(self.resolver.as_ref(), entity, request.session.as_ref())?;

        let context = SaveContext::new(entity, data.id.clone(), store);
        self.endpoint
            .hooks
            .post_validate(&context, &mut data.main)
            .await
            .map_err(Self::rejection)?;

        Ok(ValidatedSave {
            data,
            context,
            session: request.session,
        })
    }

    pub async fn process(&self, validated: ValidatedSave) -> Result<SaveResponse, SaveError> {
        let ValidatedSave {
            data,
            context,
            session,
        } = validated;

        self.run(data, &context, session.as_ref())
            .await
            .map_err(ErrorClassifier::classify)
    }

    async fn run(
        &self,
        data: DataToSave,
        context: &SaveContext,
        session: Option<&Arc<dyn Session>>,
    ) -> Result<SaveResponse> {
        let hooks = &self.endpoint.hooks;
        let is_new_record = data.is_new_record();
        let reconcile = data.has_relationships();
        let DataToSave {
            id,
            main,
            relationships,
        } = data;

        let mut main = hooks.format(context, main).await?;

        if !hooks.should_save(context, &mut main).await? {
            info!("Save of '{}' skipped by should_save", context.entity());
            return Ok(match context.id() {
                Some(id) => SaveResponse::saved(id.clone()),
                None => SaveResponse::no_content(),
            });
        }

        let store: &dyn ModelStore = context.store().as_ref();
        let saved_id = MainRecordWriter::new(store)
            .write(id.as_ref(), main.clone())
            .await?
            .ok_or_else(|| anyhow!("Main record could not be saved"))?;

        if reconcile {
            RelationshipReconciler::new(&self.endpoint.relationships, session, &saved_id, is_new_record)
                .reconcile(&relationships)
                .await?;
        }

        hooks.post_save(context, &saved_id, &main).await?;

        info!("Saved '{}' record {}", context.entity(), saved_id);
        Ok(SaveResponse::saved(saved_id))
    }

    /// A post-validation hook rejected the data.
    fn rejection(err: anyhow::Error) -> SaveError {
        match err.downcast::<SaveError>() {
            Ok(save_error) => save_error,
            Err(err) => SaveError::invalid_request(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::{FieldSchema, Record, RecordId};
    use crate::store::{MemoryStore, ModelRegistry, StoreOperation};
    use serde_json::{json, Value};

    fn schema() -> EntitySchema {
        EntitySchema::new(
            FieldSchema::Number.optional(),
            FieldSchema::object([("name", FieldSchema::String.required())]),
            FieldSchema::object([]),
        )
    }

    fn setup(hooks: Arc<dyn SaveHooks>) -> (SaveOrchestrator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new("product"));
        let registry = ModelRegistry::new().with_model("product", store.clone());
        let endpoint = SaveEndpoint::new("product", schema()).with_hooks(hooks);
        (SaveOrchestrator::new(endpoint, Arc::new(registry)), store)
    }

    struct SkipAll;

    #[async_trait::async_trait]
    impl SaveHooks for SkipAll {
        async fn should_save(&self, _ctx: &SaveContext, _main: &mut Record) -> Result<bool> {
            Ok(false)
        }
    }

    struct RejectAll;

    #[async_trait::async_trait]
    impl SaveHooks for RejectAll {
        async fn post_validate(&self, _ctx: &SaveContext, _main: &mut Record) -> Result<()> {
            Err(anyhow!("name is reserved"))
        }
    }

    #[tokio::test]
    async fn test_should_save_false_on_create_returns_no_content() {
        let (orchestrator, store) = setup(Arc::new(SkipAll));

        let response = orchestrator
            .handle(SaveRequest::new("product", json!({"name": "n"})))
            .await
            .unwrap();

        assert_eq!(response, SaveResponse::no_content());
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn test_should_save_false_on_update_returns_existing_id() {
        let (orchestrator, store) = setup(Arc::new(SkipAll));

        let response = orchestrator
            .handle(SaveRequest::new("product", json!({"name": "n"})).with_id(10))
            .await
            .unwrap();

        assert_eq!(response, SaveResponse::saved(RecordId::from(10)));
        assert!(store.operations().is_empty());
    }

    #[tokio::test]
    async fn test_post_validate_rejection_is_invalid_request_data() {
        let (orchestrator, _) = setup(Arc::new(RejectAll));

        let err = orchestrator
            .validate(SaveRequest::new("product", json!({"name": "n"})))
            .await
            .err()
            .unwrap();

        assert_eq!(err.code(), ErrorCode::InvalidRequestData);
        assert_eq!(err.to_string(), "name is reserved");
    }

    #[tokio::test]
    async fn test_update_matching_nothing_is_internal_error() {
        let (orchestrator, _) = setup(Arc::new(NoHooks));

        let err = orchestrator
            .handle(SaveRequest::new("product", json!({"name": "n"})).with_id(10))
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::InternalError);
        assert_eq!(err.to_string(), "Main record could not be saved");
    }

    #[tokio::test]
    async fn test_insert_sets_id_in_body() {
        let (orchestrator, store) = setup(Arc::new(NoHooks));

        let response = orchestrator
            .handle(SaveRequest::new("product", json!({"name": "n", "ignored": true})))
            .await
            .unwrap();

        assert_eq!(response.status, SaveResponse::OK);
        let id = response.id().unwrap().clone();
        assert_eq!(store.rows()[0]["id"], Value::from(id));
        assert_eq!(
            store.operations(),
            vec![StoreOperation::Insert(json!({"name": "n"}).as_object().cloned().unwrap())]
        );
    }
}
