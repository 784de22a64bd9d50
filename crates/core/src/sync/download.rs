//! Download into a local directory

use std::path::Path;

use futures::stream::{self, StreamExt};
use tokio::io::AsyncWriteExt;

use super::DirectorySync;
use crate::error::Result;
use crate::events::Operation;
use crate::path::{VirtualPrefix, is_folder_marker, remote_to_local};
use crate::report::{ItemOutcome, TransferReport};
use crate::traits::ObjectStore;

impl<S: ObjectStore> DirectorySync<S> {
    /// Download every object under `prefix` below `target`
    ///
    /// The prefix is stripped from each key and the rest becomes the path
    /// relative to `target`; missing directories are created. Existing files
    /// are overwritten.
    pub async fn download_to_directory(
        &self,
        target: impl AsRef<Path>,
        prefix: Option<&str>,
    ) -> Result<TransferReport> {
        self.ensure_container().await?;

        let target = target.as_ref();
        let prefix = VirtualPrefix::parse(prefix);
        let keys = self.list_keys(prefix.as_ref()).await?;

        let mut report = TransferReport::new(Operation::Download);
        let mut outcomes = stream::iter(keys)
            .map(|key| self.download_one(target, key, prefix.as_ref()))
            .buffer_unordered(self.concurrency());
        while let Some(outcome) = outcomes.next().await {
            if let Some(outcome) = outcome {
                self.record(&mut report, outcome);
            }
        }

        Ok(report)
    }

    /// Download one key; folder markers only create their directory
    async fn download_one(
        &self,
        root: &Path,
        key: String,
        prefix: Option<&VirtualPrefix>,
    ) -> Option<ItemOutcome> {
        let mapped = remote_to_local(root, &key, prefix);

        if is_folder_marker(&key) {
            let Ok(path) = mapped else {
                tracing::debug!(%key, "Ignoring folder marker outside the target");
                return None;
            };
            return match self.ensure_local_dir(&path).await {
                Ok(()) => None,
                Err(e) => Some(ItemOutcome::failed(key, path.display().to_string(), e)),
            };
        }

        let path = match mapped {
            Ok(path) => path,
            Err(e) => return Some(ItemOutcome::failed(key, root.display().to_string(), e)),
        };
        let target = path.display().to_string();

        match self.fetch_to_file(&key, &path).await {
            Ok(size) => Some(ItemOutcome::transferred(key, target, size)),
            Err(e) => Some(ItemOutcome::failed(key, target, e)),
        }
    }

    async fn fetch_to_file(&self, key: &str, path: &Path) -> Result<u64> {
        if let Some(parent) = path.parent() {
            self.ensure_local_dir(parent).await?;
        }

        let mut reader = self.store.get_object(key).await?;
        let mut file = tokio::fs::File::create(path).await?;
        let size = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        Ok(size)
    }
}
