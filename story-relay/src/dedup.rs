use crate::types::{ExternalId, Result};
use interfaces::RecordStore;

/// Has this item been ingested already? Always asks the store; there is no
/// cache in front of it.
#[derive(Clone)]
pub struct DedupFilter {
    store: RecordStore,
}

impl DedupFilter {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub async fn has(&self, external_id: &ExternalId) -> Result<bool> {
        Ok(self.store.contains(external_id).await?)
    }
}
