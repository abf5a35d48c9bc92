use crate::model::{Filter, Record, RecordId};
use anyhow::Result;
use std::sync::Arc;

/// Storage handle for one collection (a primary entity or an association table).
///
/// Failures are returned as raw errors; callers decide how to classify them.
#[async_trait::async_trait]
pub trait ModelStore: Send + Sync {
    /// All rows matching an equality filter; empty when nothing matches
    async fn get(&self, filter: &Filter) -> Result<Vec<Record>>;
    /// A single row by its identifier
    async fn get_by_id(&self, id: &RecordId) -> Result<Option<Record>>;
    /// Create one row; `None` when the store assigned no identifier
    async fn insert(&self, record: Record) -> Result<Option<RecordId>>;
    /// Patch every row matching `filter`; returns how many rows matched
    async fn update(&self, patch: Record, filter: &Filter) -> Result<u64>;
    /// Bulk-create rows
    async fn multi_insert(&self, rows: Vec<Record>) -> Result<()>;
    /// Bulk-delete every row matching any of the given key filters
    async fn multi_remove(&self, keys: Vec<Filter>) -> Result<()>;
}

/// Resolves an entity or collection name to its storage handle.
pub trait ModelResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Arc<dyn ModelStore>>;
}

/// Per-request scoping context (e.g. a tenant session). When present, every
/// store handle used by a request is obtained through it.
pub trait Session: Send + Sync {
    fn scoped_store(&self, collection: &str, store: Arc<dyn ModelStore>) -> Arc<dyn ModelStore>;
}

/// Apply the session scope to a handle, or use it as-is without a session.
pub fn scoped(
    session: Option<&Arc<dyn Session>>,
    collection: &str,
    store: &Arc<dyn ModelStore>,
) -> Arc<dyn ModelStore> {
    match session {
        Some(session) => session.scoped_store(collection, Arc::clone(store)),
        None => Arc::clone(store),
    }
}
