//! Prefix-scoped deletion

use futures::stream::{self, StreamExt};

use super::DirectorySync;
use crate::error::Result;
use crate::events::Operation;
use crate::path::VirtualPrefix;
use crate::report::{ItemOutcome, TransferReport};
use crate::traits::ObjectStore;

impl<S: ObjectStore> DirectorySync<S> {
    /// Delete every object under `prefix`, or the whole container without one
    ///
    /// Keys are listed once and deleted one request per key. A failed delete
    /// ends the call with that error unless
    /// [`continue_on_delete_error`](crate::SyncOptions::continue_on_delete_error)
    /// is set, in which case it is reported and the remaining keys are still
    /// deleted.
    pub async fn delete_all(&self, prefix: Option<&str>) -> Result<TransferReport> {
        self.ensure_container().await?;

        let prefix = VirtualPrefix::parse(prefix);
        let keys = self.list_keys(prefix.as_ref()).await?;

        let mut report = TransferReport::new(Operation::Delete);
        let mut results = stream::iter(keys)
            .map(|key| async move {
                let result = self.store.delete_object(&key).await;
                (key, result)
            })
            .buffer_unordered(self.concurrency());

        while let Some((key, result)) = results.next().await {
            match result {
                Ok(()) => self.record(&mut report, ItemOutcome::deleted(key)),
                Err(e) if self.options.continue_on_delete_error => {
                    self.record(&mut report, ItemOutcome::failed(&key, &key, e));
                }
                Err(e) => {
                    self.sink
                        .emit(ItemOutcome::failed(&key, &key, &e).to_event(Operation::Delete));
                    return Err(e);
                }
            }
        }

        Ok(report)
    }
}
