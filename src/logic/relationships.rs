use anyhow::{anyhow, Result};
use futures::future::join_all;
use log::{debug, warn};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::model::{Filter, Record, RecordId, RelationshipEntry, RelationshipParameters};
use crate::store::{scoped, ModelStore, Session};

/// Association rows to write and identity keys to delete for one relationship.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipSplit {
    pub insert: Vec<Record>,
    pub remove: Vec<Filter>,
}

/// main id → secondary id → row
type RowIndex<'r> = HashMap<String, HashMap<String, &'r Record>>;

/// Synchronizes the association rows of every relationship in a request
/// with the desired lists.
pub struct RelationshipReconciler<'a> {
    parameters: &'a HashMap<String, RelationshipParameters>,
    session: Option<&'a Arc<dyn Session>>,
    main_id: &'a RecordId,
    is_new_record: bool,
}

impl<'a> RelationshipReconciler<'a> {
    pub fn new(
        parameters: &'a HashMap<String, RelationshipParameters>,
        session: Option<&'a Arc<dyn Session>>,
        main_id: &'a RecordId,
        is_new_record: bool,
    ) -> Self {
        Self {
            parameters,
            session,
            main_id,
            is_new_record,
        }
    }

    /// Reconcile all relationships concurrently. Every relationship runs to
    /// completion even if another fails; the first failure is reported.
    pub async fn reconcile(&self, relationships: &BTreeMap<String, Vec<RelationshipEntry>>) -> Result<()> {
        let results = join_all(
            relationships
                .iter()
                .map(|(name, entries)| self.save(name, entries)),
        )
        .await;

        let mut first_error = None;
        for (name, result) in relationships.keys().zip(results) {
            if let Err(e) = result {
                warn!("Relationship '{}' failed to synchronize: {:#}", name, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn save(&self, relationship: &str, entries: &[RelationshipEntry]) -> Result<()> {
        let parameters = self
            .parameters
            .get(relationship)
            .ok_or_else(|| anyhow!("relationshipParameters not defined for {}", relationship))?;

        let store = scoped(self.session, &parameters.collection, &parameters.store);
        let main_id = self.main_id.to_value();
        let rows = format_rows(entries, parameters, &main_id);

        if !self.is_new_record && parameters.should_clean {
            self.insert_and_remove(relationship, store.as_ref(), parameters, rows, &main_id)
                .await
        } else {
            Self::insert(relationship, store.as_ref(), rows).await
        }
    }

    /// Additive-only write: never reads current state, never removes.
    async fn insert(relationship: &str, store: &dyn ModelStore, rows: Vec<Record>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        debug!("Relationship '{}': inserting {} row(s)", relationship, rows.len());
        store.multi_insert(rows).await
    }

    async fn insert_and_remove(
        &self,
        relationship: &str,
        store: &dyn ModelStore,
        parameters: &RelationshipParameters,
        rows: Vec<Record>,
        main_id: &Value,
    ) -> Result<()> {
        let mut filter = Filter::new();
        filter.insert(parameters.main_identifier_field.clone(), main_id.clone());
        let current = store.get(&filter).await?;

        let RelationshipSplit { insert, remove } = split_rows(current, rows, parameters, main_id);
        debug!(
            "Relationship '{}': inserting {} row(s), removing {} row(s)",
            relationship,
            insert.len(),
            remove.len()
        );

        let remove_future = async move {
            if remove.is_empty() {
                Ok(())
            } else {
                store.multi_remove(remove).await
            }
        };
        let insert_future = async move {
            if insert.is_empty() {
                Ok(())
            } else {
                store.multi_insert(insert).await
            }
        };

        // Both writes run concurrently. A changed row removes and re-inserts the same
        // identity key, so a store must not apply the insert before the remove.
        let (removed, inserted) = futures::join!(remove_future, insert_future);
        removed?;
        inserted?;
        Ok(())
    }
}

/// Build association rows for the desired entries. A bare entry is the
/// secondary id; an object entry contributes its `id` as the secondary id
/// and its remaining fields as extra columns. Entries sharing the same
/// secondary id collapse into the last one.
pub fn format_rows(entries: &[RelationshipEntry], parameters: &RelationshipParameters, main_id: &Value) -> Vec<Record> {
    let rows: Vec<Record> = entries
        .iter()
        .cloned()
        .map(|entry| {
            let (secondary_id, extra) = entry.into_parts();
            let mut row = Record::new();
            row.insert(parameters.main_identifier_field.clone(), main_id.clone());
            row.insert(parameters.secondary_identifier_field.clone(), secondary_id);
            row.extend(extra);
            row
        })
        .collect();

    let mut seen = HashSet::new();
    let mut deduplicated: Vec<Record> = rows
        .into_iter()
        .rev()
        .filter(|row| seen.insert(identity_key(row, parameters)))
        .collect();
    deduplicated.reverse();
    deduplicated
}

/// Diff current association rows against desired ones.
///
/// A desired row is inserted unless an identical row (same identity key and
/// deep-equal fields) already exists; a current row is removed unless an
/// identical desired row exists. Changed extra fields therefore produce a
/// remove of the old identity key and an insert of the new row.
pub fn split_rows(
    current: Vec<Record>,
    desired: Vec<Record>,
    parameters: &RelationshipParameters,
    main_id: &Value,
) -> RelationshipSplit {
    if current.is_empty() {
        return RelationshipSplit {
            insert: desired,
            remove: Vec::new(),
        };
    }

    if desired.is_empty() {
        return RelationshipSplit {
            insert: Vec::new(),
            remove: current
                .iter()
                .map(|row| removal_key(row, parameters, main_id))
                .collect(),
        };
    }

    let current_index = index_rows(&current, parameters);
    let desired_index = index_rows(&desired, parameters);

    let insert = desired
        .iter()
        .filter(|row| !is_same(row, &current_index, parameters))
        .cloned()
        .collect();

    let remove = current
        .iter()
        .filter(|row| !is_same(row, &desired_index, parameters))
        .map(|row| removal_key(row, parameters, main_id))
        .collect();

    RelationshipSplit { insert, remove }
}

fn field_key(row: &Record, field: &str) -> String {
    row.get(field).unwrap_or(&Value::Null).to_string()
}

fn identity_key(row: &Record, parameters: &RelationshipParameters) -> (String, String) {
    (
        field_key(row, &parameters.main_identifier_field),
        field_key(row, &parameters.secondary_identifier_field),
    )
}

fn index_rows<'r>(rows: &'r [Record], parameters: &RelationshipParameters) -> RowIndex<'r> {
    let mut index: RowIndex<'r> = HashMap::new();
    for row in rows {
        let (main, secondary) = identity_key(row, parameters);
        index.entry(main).or_default().insert(secondary, row);
    }
    index
}

fn is_same(row: &Record, index: &RowIndex<'_>, parameters: &RelationshipParameters) -> bool {
    let (main, secondary) = identity_key(row, parameters);
    index
        .get(&main)
        .and_then(|by_secondary| by_secondary.get(&secondary))
        .is_some_and(|indexed| *indexed == row)
}

/// Identity-only filter used to delete an association row; extra fields are
/// dropped.
fn removal_key(row: &Record, parameters: &RelationshipParameters, main_id: &Value) -> Filter {
    let mut key = Filter::new();
    key.insert(parameters.main_identifier_field.clone(), main_id.clone());
    key.insert(
        parameters.secondary_identifier_field.clone(),
        row.get(&parameters.secondary_identifier_field)
            .cloned()
            .unwrap_or(Value::Null),
    );
    key
}
