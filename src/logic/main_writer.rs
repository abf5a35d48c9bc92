use anyhow::Result;
use log::debug;

use crate::model::{Record, RecordId};
use crate::store::ModelStore;

/// Writes the primary record: update when an id is known, insert otherwise.
pub struct MainRecordWriter<'a> {
    store: &'a dyn ModelStore,
}

impl<'a> MainRecordWriter<'a> {
    pub fn new(store: &'a dyn ModelStore) -> Self {
        Self { store }
    }

    /// Returns the authoritative id of the saved record, or `None` when the
    /// store wrote nothing (an update that matched no row, an insert without
    /// an assigned id). Storage errors propagate unchanged.
    pub async fn write(&self, id: Option<&RecordId>, main: Record) -> Result<Option<RecordId>> {
        match id {
            Some(id) => {
                let matched = self.store.update(main, &id.as_filter()).await?;
                debug!("Update of record {} matched {} row(s)", id, matched);
                Ok((matched > 0).then(|| id.clone()))
            }
            None => {
                let inserted = self.store.insert(main).await?;
                debug!("Insert returned id {:?}", inserted);
                Ok(inserted.filter(|id| !id.is_empty()))
            }
        }
    }
}
