use anyhow::Result;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::SaveError;
use crate::model::{Record, RecordId};
use crate::store::ModelStore;

/// Per-request state handed to every hook.
pub struct SaveContext {
    entity: String,
    id: Option<RecordId>,
    store: Arc<dyn ModelStore>,
    current: OnceCell<Option<Record>>,
}

impl SaveContext {
    pub fn new(entity: impl Into<String>, id: Option<RecordId>, store: Arc<dyn ModelStore>) -> Self {
        Self {
            entity: entity.into(),
            id,
            store,
            current: OnceCell::new(),
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    pub fn is_new_record(&self) -> bool {
        self.id.is_none()
    }

    pub fn store(&self) -> &Arc<dyn ModelStore> {
        &self.store
    }

    /// The record as currently persisted, read once per request.
    ///
    /// Only available when updating; calling it while creating a record
    /// fails with an internal error.
    pub async fn current_record(&self) -> Result<Option<Record>> {
        let Some(id) = self.id.as_ref() else {
            return Err(SaveError::internal(
                "The current record is only available when updating an existing record",
            )
            .into());
        };

        let record = self
            .current
            .get_or_try_init(|| async { self.store.get_by_id(id).await })
            .await?;
        Ok(record.clone())
    }
}

/// Optional per-entity behaviour around a save. Every method defaults to a
/// no-op so implementors only override what they need.
#[async_trait::async_trait]
pub trait SaveHooks: Send + Sync {
    /// Runs right after schema validation. May rewrite `main`; an error
    /// rejects the request as invalid data.
    async fn post_validate(&self, _ctx: &SaveContext, _main: &mut Record) -> Result<()> {
        Ok(())
    }

    /// Transform the primary record before it is written.
    async fn format(&self, _ctx: &SaveContext, main: Record) -> Result<Record> {
        Ok(main)
    }

    /// Return `false` to skip the write entirely. May rewrite `main`.
    async fn should_save(&self, _ctx: &SaveContext, _main: &mut Record) -> Result<bool> {
        Ok(true)
    }

    /// Runs after the primary record and its relationships are saved.
    async fn post_save(&self, _ctx: &SaveContext, _id: &RecordId, _main: &Record) -> Result<()> {
        Ok(())
    }
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl SaveHooks for NoHooks {}
