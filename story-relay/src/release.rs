use crate::types::{Record, Result};
use interfaces::RecordStore;
use tracing::{debug, info};

/// Hands out stored records one at a time, oldest first.
///
/// A record is marked published the moment it is taken, before anyone tries
/// to post it. A crash or failed post after that point loses the message
/// rather than risking a duplicate.
#[derive(Clone)]
pub struct ReleaseQueue {
    store: RecordStore,
}

impl ReleaseQueue {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub async fn take_next_unpublished(&self) -> Result<Option<Record>> {
        match self.store.take_next_unpublished().await? {
            Some(record) => {
                info!("Released record {} ({})", record.id, record.external_id);
                Ok(Some(record))
            }
            None => {
                debug!("No unpublished records to release");
                Ok(None)
            }
        }
    }
}
