//! In-memory object store
//!
//! A container held in a sorted map. Useful as a local backend and for
//! exercising the directory operations without a server. Reads and deletes of
//! chosen keys can be made to fail to exercise partial-failure handling.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::{Error, Result};
use crate::traits::{ListOptions, ListResult, ObjectInfo, ObjectReader, ObjectStore};

/// Page size used when a listing does not ask for one
const DEFAULT_MAX_KEYS: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    last_modified: Timestamp,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    failing_reads: HashSet<String>,
    failing_deletes: HashSet<String>,
}

/// Object store backed by process memory
#[derive(Debug)]
pub struct MemoryStore {
    container: String,
    exists: bool,
    state: Mutex<State>,
}

impl MemoryStore {
    /// Create an existing, empty container
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            exists: true,
            state: Mutex::new(State::default()),
        }
    }

    /// Create a handle whose container does not exist
    pub fn missing(container: impl Into<String>) -> Self {
        Self {
            exists: false,
            ..Self::new(container)
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_container(&self) -> Result<()> {
        if self.exists {
            Ok(())
        } else {
            Err(Error::ContainerNotFound(self.container.clone()))
        }
    }

    /// Store an object directly
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.state().objects.insert(
            key.into(),
            StoredObject {
                data: data.into(),
                last_modified: Timestamp::now(),
            },
        );
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        self.state().objects.keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state().objects.contains_key(key)
    }

    /// Content of an object, if present
    pub fn data(&self, key: &str) -> Option<Vec<u8>> {
        self.state().objects.get(key).map(|o| o.data.clone())
    }

    /// Make every subsequent read of `key` fail
    pub fn fail_reads(&self, key: impl Into<String>) {
        self.state().failing_reads.insert(key.into());
    }

    /// Make every subsequent delete of `key` fail
    pub fn fail_deletes(&self, key: impl Into<String>) {
        self.state().failing_deletes.insert(key.into());
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn container(&self) -> &str {
        &self.container
    }

    async fn container_exists(&self) -> Result<bool> {
        Ok(self.exists)
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        self.ensure_container()?;
        Ok(self.contains(key))
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<ObjectInfo> {
        self.ensure_container()?;
        let data = tokio::fs::read(path).await?;
        let mut info = ObjectInfo::new(key, data.len() as i64);
        let last_modified = Timestamp::now();
        info.last_modified = Some(last_modified);

        self.state().objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified,
            },
        );
        Ok(info)
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader> {
        self.ensure_container()?;
        let state = self.state();
        if state.failing_reads.contains(key) {
            return Err(Error::Network(format!("Injected read failure for '{key}'")));
        }

        let object = state
            .objects
            .get(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        Ok(Box::pin(std::io::Cursor::new(object.data.clone())))
    }

    async fn list_objects(&self, options: ListOptions) -> Result<ListResult> {
        self.ensure_container()?;
        let state = self.state();
        let max_keys = options
            .max_keys
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_MAX_KEYS);
        let prefix = options.prefix.as_deref().unwrap_or("");

        let start = match &options.continuation_token {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Unbounded,
        };

        let mut matching = state
            .objects
            .range((start, Bound::Unbounded))
            .filter(|(key, _)| key.starts_with(prefix));

        let mut items = Vec::new();
        for (key, object) in matching.by_ref().take(max_keys) {
            let mut info = ObjectInfo::new(key, object.data.len() as i64);
            info.last_modified = Some(object.last_modified);
            items.push(info);
        }

        let truncated = matching.next().is_some();
        let continuation_token = if truncated {
            items.last().map(|info| info.key.clone())
        } else {
            None
        };

        Ok(ListResult {
            items,
            truncated,
            continuation_token,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.ensure_container()?;
        let mut state = self.state();
        if state.failing_deletes.contains(key) {
            return Err(Error::Network(format!(
                "Injected delete failure for '{key}'"
            )));
        }
        state.objects.remove(key);
        Ok(())
    }
}
