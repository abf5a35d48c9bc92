use anyhow::{bail, Result};
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};

use crate::model::{generate_id, Filter, Record, RecordId};
use crate::store::traits::ModelStore;

/// A call received by a [`MemoryStore`], recorded in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOperation {
    Get(Filter),
    GetById(RecordId),
    Insert(Record),
    Update { patch: Record, filter: Filter },
    MultiInsert(Vec<Record>),
    MultiRemove(Vec<Filter>),
}

/// In-memory collection implementing [`ModelStore`].
///
/// Unique indexes reject duplicate writes with a Mongo-style
/// `E11000 duplicate key error` message, and every call is journaled so a
/// caller can inspect exactly what was issued against the collection.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    rows: RwLock<Vec<Record>>,
    unique_indexes: Vec<Vec<String>>,
    journal: Mutex<Vec<StoreOperation>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(Vec::new()),
            unique_indexes: Vec::new(),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Seed the collection without journaling.
    pub fn with_rows(self, rows: Vec<Record>) -> Self {
        *self.rows.write() = rows;
        self
    }

    pub fn with_unique_index(mut self, fields: &[&str]) -> Self {
        self.unique_indexes
            .push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn rows(&self) -> Vec<Record> {
        self.rows.read().clone()
    }

    pub fn operations(&self) -> Vec<StoreOperation> {
        self.journal.lock().clone()
    }

    pub fn clear_operations(&self) {
        self.journal.lock().clear();
    }

    fn record(&self, operation: StoreOperation) {
        self.journal.lock().push(operation);
    }

    fn matches(row: &Record, filter: &Filter) -> bool {
        filter
            .iter()
            .all(|(field, value)| row.get(field) == Some(value))
    }

    /// Fail if `candidate` collides with any row in `existing` on a unique
    /// index. `skip` excludes the row being replaced by an update.
    fn check_unique(&self, candidate: &Record, existing: &[Record], skip: Option<usize>) -> Result<()> {
        for index in &self.unique_indexes {
            let Some(key) = index
                .iter()
                .map(|field| candidate.get(field))
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };

            let collides = existing.iter().enumerate().any(|(position, row)| {
                Some(position) != skip
                    && index
                        .iter()
                        .zip(&key)
                        .all(|(field, value)| row.get(field) == Some(*value))
            });

            if collides {
                let index_name = index.iter().map(|f| format!("{}_1", f)).join("_");
                let dup_key = index
                    .iter()
                    .zip(&key)
                    .map(|(field, value)| format!("{}: {}", field, value))
                    .join(", ");
                bail!(
                    "E11000 duplicate key error collection: {} index: {} dup key: {{ {} }}",
                    self.name,
                    index_name,
                    dup_key
                );
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ModelStore for MemoryStore {
    async fn get(&self, filter: &Filter) -> Result<Vec<Record>> {
        self.record(StoreOperation::Get(filter.clone()));

        let rows = self.rows.read();
        Ok(rows
            .iter()
            .filter(|row| Self::matches(row, filter))
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: &RecordId) -> Result<Option<Record>> {
        self.record(StoreOperation::GetById(id.clone()));

        let filter = id.as_filter();
        let rows = self.rows.read();
        Ok(rows.iter().find(|row| Self::matches(row, &filter)).cloned())
    }

    async fn insert(&self, mut record: Record) -> Result<Option<RecordId>> {
        self.record(StoreOperation::Insert(record.clone()));

        let id = match record.get("id").and_then(RecordId::from_value) {
            Some(id) => id,
            None => {
                let id = generate_id();
                record.insert("id".to_string(), id.to_value());
                id
            }
        };

        let mut rows = self.rows.write();
        self.check_unique(&record, &rows, None)?;
        rows.push(record);

        Ok(Some(id))
    }

    async fn update(&self, patch: Record, filter: &Filter) -> Result<u64> {
        self.record(StoreOperation::Update {
            patch: patch.clone(),
            filter: filter.clone(),
        });

        let mut rows = self.rows.write();
        let positions: Vec<usize> = rows
            .iter()
            .positions(|row| Self::matches(row, filter))
            .collect();

        let mut patched = Vec::with_capacity(positions.len());
        for &position in &positions {
            let mut row = rows[position].clone();
            for (field, value) in &patch {
                row.insert(field.clone(), value.clone());
            }
            self.check_unique(&row, &rows, Some(position))?;
            patched.push((position, row));
        }

        for (position, row) in patched {
            rows[position] = row;
        }

        Ok(positions.len() as u64)
    }

    async fn multi_insert(&self, new_rows: Vec<Record>) -> Result<()> {
        self.record(StoreOperation::MultiInsert(new_rows.clone()));

        let mut rows = self.rows.write();
        let mut staged = rows.clone();
        for row in new_rows {
            self.check_unique(&row, &staged, None)?;
            staged.push(row);
        }
        *rows = staged;

        Ok(())
    }

    async fn multi_remove(&self, keys: Vec<Filter>) -> Result<()> {
        self.record(StoreOperation::MultiRemove(keys.clone()));

        let mut rows = self.rows.write();
        rows.retain(|row| !keys.iter().any(|key| Self::matches(row, key)));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_get_filters() {
        let store = MemoryStore::new("product");
        let id = store.insert(record(json!({"name": "chair"}))).await.unwrap().unwrap();

        let rows = store.get(&record(json!({"name": "chair"}))).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&id.to_value()));

        assert!(store.get(&record(json!({"name": "table"}))).await.unwrap().is_empty());
        assert_eq!(store.get_by_id(&id).await.unwrap().unwrap()["name"], json!("chair"));
    }

    #[tokio::test]
    async fn test_update_reports_matched_rows() {
        let store = MemoryStore::new("product").with_rows(vec![record(json!({"id": 10, "name": "a"}))]);

        let matched = store
            .update(record(json!({"name": "b"})), &RecordId::from(10).as_filter())
            .await
            .unwrap();
        assert_eq!(matched, 1);
        assert_eq!(store.rows()[0]["name"], json!("b"));

        let matched = store
            .update(record(json!({"name": "c"})), &RecordId::from(11).as_filter())
            .await
            .unwrap();
        assert_eq!(matched, 0);
    }

    #[tokio::test]
    async fn test_unique_index_rejects_duplicates() {
        let store = MemoryStore::new("product")
            .with_unique_index(&["code"])
            .with_rows(vec![record(json!({"id": 1, "code": "X-1"}))]);

        let err = store.insert(record(json!({"code": "X-1"}))).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"E11000 duplicate key error collection: product index: code_1 dup key: { code: "X-1" }"#
        );
        assert_eq!(store.rows().len(), 1);
    }

    #[tokio::test]
    async fn test_multi_insert_is_all_or_nothing() {
        let store = MemoryStore::new("links").with_unique_index(&["a", "b"]);

        let result = store
            .multi_insert(vec![record(json!({"a": 1, "b": 2})), record(json!({"a": 1, "b": 2}))])
            .await;
        assert!(result.is_err());
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn test_multi_remove_by_key_filters_and_journal() {
        let store = MemoryStore::new("links").with_rows(vec![
            record(json!({"a": 10, "b": "x", "title": "t"})),
            record(json!({"a": 10, "b": "y"})),
        ]);

        let keys = vec![record(json!({"a": 10, "b": "x"}))];
        store.multi_remove(keys.clone()).await.unwrap();

        assert_eq!(store.rows(), vec![record(json!({"a": 10, "b": "y"}))]);
        assert_eq!(store.operations(), vec![StoreOperation::MultiRemove(keys)]);
    }
}
