//! One-shot sync: read a record from the store and send it.

use std::sync::Arc;

use serde_json::Value;

use crate::sender::SheetsSender;
use crate::store::RecordStore;
use crate::types::{EndpointReply, SyncError, SyncResult, SyncTarget};

/// Ties a [`RecordStore`] to a [`SheetsSender`].
#[derive(Clone)]
pub struct SyncOrchestrator {
    store: Arc<dyn RecordStore>,
    sender: SheetsSender,
}

impl SyncOrchestrator {
    pub fn new(store: Arc<dyn RecordStore>, sender: SheetsSender) -> Self {
        Self { store, sender }
    }

    /// Read the whole value at `target.path` and forward it to the sender.
    ///
    /// A missing value is forwarded as `null`, which the sender rejects as
    /// [`SyncError::EmptyData`].
    pub async fn sync_once(&self, target: &SyncTarget) -> SyncResult<EndpointReply> {
        tracing::debug!("reading {} for sheet {}", target.path, target.sheet_id);
        let record = self.store.read(&target.path).await.map_err(|e| match e {
            SyncError::StoreFailure(msg) => SyncError::StoreFailure(msg),
            other => SyncError::StoreFailure(other.to_string()),
        })?;

        let record = record.unwrap_or_else(|| {
            tracing::debug!("no value at {}", target.path);
            Value::Null
        });

        self.sender.send_to(&record, target).await
    }
}
