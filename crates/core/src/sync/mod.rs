//! Directory operations on top of an [`ObjectStore`]
//!
//! [`DirectorySync`] mirrors a local directory tree into a container, mirrors
//! a prefix of the container back to disk or into a zip archive, and deletes
//! everything under a prefix. Each call first checks its preconditions and
//! fails as a whole if they do not hold; after that every item is handled on
//! its own and failures are only reported, never propagated (deletion is
//! configurable, see [`SyncOptions::continue_on_delete_error`]).

use std::path::Path;
use std::sync::Arc;

use crate::config::SyncOptions;
use crate::error::{Error, Result};
use crate::events::{EventSink, SyncEvent, TracingSink};
use crate::path::VirtualPrefix;
use crate::report::{ItemOutcome, TransferReport};
use crate::traits::{ListOptions, ObjectStore};

mod archive;
mod delete;
mod download;
mod upload;

/// Directory-level operations against one container
pub struct DirectorySync<S> {
    store: S,
    options: SyncOptions,
    sink: Arc<dyn EventSink>,
}

impl<S: ObjectStore> DirectorySync<S> {
    /// Create with default options, logging events through `tracing`
    pub fn new(store: S) -> Self {
        Self {
            store,
            options: SyncOptions::default(),
            sink: Arc::new(TracingSink),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Send progress events to `sink` instead of the log
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    fn concurrency(&self) -> usize {
        self.options.concurrency.max(1)
    }

    /// Fail unless the bound container exists
    async fn ensure_container(&self) -> Result<()> {
        let container = self.store.container();
        tracing::debug!(container, "Checking container");
        if self.store.container_exists().await? {
            Ok(())
        } else {
            Err(Error::ContainerNotFound(container.to_string()))
        }
    }

    /// Create a local directory (and parents) if it is missing
    async fn ensure_local_dir(&self, dir: &Path) -> Result<()> {
        if tokio::fs::try_exists(dir).await? {
            return Ok(());
        }

        tokio::fs::create_dir_all(dir).await?;
        self.sink.emit(SyncEvent::DirectoryCreated {
            path: dir.display().to_string(),
        });
        Ok(())
    }

    /// Emit the outcome's event and append it to the report
    fn record(&self, report: &mut TransferReport, outcome: ItemOutcome) {
        self.sink.emit(outcome.to_event(report.operation));
        report.items.push(outcome);
    }

    /// List every key under `prefix`, following continuation tokens
    async fn list_keys(&self, prefix: Option<&VirtualPrefix>) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let options = ListOptions {
                prefix: prefix.map(|p| p.as_str().to_string()),
                max_keys: Some(self.options.page_size),
                continuation_token: continuation_token.take(),
            };

            let page = self.store.list_objects(options).await?;
            keys.extend(
                page.items
                    .into_iter()
                    .map(|item| item.key)
                    .filter(|key| prefix.is_none_or(|p| p.matches(key, self.options.prefix_match))),
            );

            match page.continuation_token {
                Some(token) if page.truncated => continuation_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(
            container = self.store.container(),
            prefix = prefix.map(VirtualPrefix::as_str).unwrap_or(""),
            count = keys.len(),
            "Listed objects"
        );
        Ok(keys)
    }
}
