//! S3 store implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from dirsync-core.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_smithy_types::byte_stream::ByteStream;

use dirsync_core::{Error, ListOptions, ListResult, ObjectInfo, ObjectReader, ObjectStore, Result};

use crate::config::StoreConfig;

/// S3 client bound to one bucket
pub struct S3Store {
    inner: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Store {
    /// Create a store from connection settings
    ///
    /// Credentials are resolved through the default AWS provider chain.
    pub async fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::debug!(
            bucket = %config.bucket,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            "Created S3 store"
        );

        Ok(Self::from_client(
            aws_sdk_s3::Client::from_conf(s3_config),
            config.bucket,
        ))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            inner: client,
            bucket: bucket.into(),
        }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Map an SDK failure onto the core error type
///
/// `what` names the resource the request was about and is used for
/// not-found errors.
fn map_sdk_error<E: std::error::Error>(err: E, what: &str) -> Error {
    classify(DisplayErrorContext(err).to_string(), what)
}

fn classify(message: String, what: &str) -> Error {
    if message.contains("NotFound")
        || message.contains("NoSuchKey")
        || message.contains("NoSuchBucket")
    {
        Error::NotFound(what.to_string())
    } else if message.contains("AccessDenied")
        || message.contains("InvalidAccessKeyId")
        || message.contains("SignatureDoesNotMatch")
    {
        Error::Auth(message)
    } else {
        Error::Network(message)
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn container(&self) -> &str {
        &self.bucket
    }

    async fn container_exists(&self) -> Result<bool> {
        match self.inner.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => match map_sdk_error(e, &self.bucket) {
                Error::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        let response = self
            .inner
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match response {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => match map_sdk_error(e, key) {
                Error::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn put_file(&self, key: &str, path: &Path) -> Result<ObjectInfo> {
        let size = tokio::fs::metadata(path).await?.len();
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        let content_type = mime_guess::from_path(path).first_or_octet_stream();

        let response = self
            .inner
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type.essence_str())
            .body(body)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        let mut info = ObjectInfo::new(key, i64::try_from(size).unwrap_or(i64::MAX));
        if let Some(etag) = response.e_tag() {
            info.etag = Some(etag.trim_matches('"').to_string());
        }
        info.content_type = Some(content_type.essence_str().to_string());
        info.last_modified = Some(jiff::Timestamp::now());

        Ok(info)
    }

    async fn get_object(&self, key: &str) -> Result<ObjectReader> {
        let response = self
            .inner
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        Ok(Box::pin(response.body.into_async_read()))
    }

    async fn list_objects(&self, options: ListOptions) -> Result<ListResult> {
        let mut request = self.inner.list_objects_v2().bucket(&self.bucket);

        if let Some(prefix) = &options.prefix {
            request = request.prefix(prefix);
        }

        if let Some(max) = options.max_keys {
            request = request.max_keys(max);
        }

        if let Some(token) = &options.continuation_token {
            request = request.continuation_token(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &self.bucket))?;

        let items = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?;
                let mut info = ObjectInfo::new(key, object.size().unwrap_or(0));
                if let Some(modified) = object.last_modified() {
                    info.last_modified = jiff::Timestamp::from_second(modified.secs()).ok();
                }
                if let Some(etag) = object.e_tag() {
                    info.etag = Some(etag.trim_matches('"').to_string());
                }
                Some(info)
            })
            .collect();

        Ok(ListResult {
            items,
            truncated: response.is_truncated().unwrap_or(false),
            continuation_token: response.next_continuation_token().map(|s| s.to_string()),
        })
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let result = self
            .inner
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match map_sdk_error(e, key) {
                // Already gone
                Error::NotFound(_) => Ok(()),
                other => Err(other),
            },
        }
    }
}
