//! ObjectStore trait definition
//!
//! This trait defines the interface the directory operations need from a
//! storage backend. A store handle is bound to a single container (bucket),
//! which keeps the operations decoupled from any specific SDK.

use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::Result;

/// Streamed object content
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata for a remote object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,

    /// Size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<i64>,

    /// Human-readable size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,

    /// Last modified timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// ETag (usually MD5 for single-part uploads)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    /// Content type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl ObjectInfo {
    /// Create a new ObjectInfo for an object of known size
    pub fn new(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size_bytes: Some(size),
            size_human: Some(humansize::format_size(size.max(0) as u64, humansize::BINARY)),
            last_modified: None,
            etag: None,
            content_type: None,
        }
    }
}

/// One page of a prefix listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResult {
    /// Listed objects
    pub items: Vec<ObjectInfo>,

    /// Whether the result is truncated (more items available)
    pub truncated: bool,

    /// Continuation token for pagination
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// Options for list operations
///
/// Listings are always flat (recursive); hierarchy is left to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// String prefix keys must start with
    pub prefix: Option<String>,

    /// Maximum number of keys to return per request
    pub max_keys: Option<i32>,

    /// Continuation token for pagination
    pub continuation_token: Option<String>,
}

/// Trait for container-bound object storage operations
///
/// This trait is implemented by the storage adapters and can be mocked for testing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the container this handle is bound to
    fn container(&self) -> &str;

    /// Check if the container exists
    async fn container_exists(&self) -> Result<bool>;

    /// Check if an object exists
    async fn object_exists(&self, key: &str) -> Result<bool>;

    /// Create or overwrite an object from a local file
    async fn put_file(&self, key: &str, path: &Path) -> Result<ObjectInfo>;

    /// Open an object for streamed reading
    async fn get_object(&self, key: &str) -> Result<ObjectReader>;

    /// List one page of objects
    async fn list_objects(&self, options: ListOptions) -> Result<ListResult>;

    /// Delete an object; deleting a missing key is not an error
    async fn delete_object(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn container(&self) -> &str {
        (**self).container()
    }

    async fn container_exists(&self) -> Result<bool> {
        (**self).container_exists().await
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        (**self).object_exists(key).await
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<ObjectInfo> {
        (**self).put_file(key, path).await
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader> {
        (**self).get_object(key).await
    }

    async fn list_objects(&self, options: ListOptions) -> Result<ListResult> {
        (**self).list_objects(options).await
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        (**self).delete_object(key).await
    }
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn container(&self) -> &str {
        (**self).container()
    }

    async fn container_exists(&self) -> Result<bool> {
        (**self).container_exists().await
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        (**self).object_exists(key).await
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<ObjectInfo> {
        (**self).put_file(key, path).await
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader> {
        (**self).get_object(key).await
    }

    async fn list_objects(&self, options: ListOptions) -> Result<ListResult> {
        (**self).list_objects(options).await
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        (**self).delete_object(key).await
    }
}
