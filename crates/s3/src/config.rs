//! Connection settings for an S3-compatible container

use serde::{Deserialize, Serialize};

use dirsync_core::{Error, Result};

const DEFAULT_REGION: &str = "us-east-1";

/// Where the container lives and how to address it
///
/// Credentials are not part of the configuration; they come from the
/// standard AWS provider chain (environment, profile, instance metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bucket that every operation is bound to
    pub bucket: String,

    /// Custom endpoint URL, for S3-compatible servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Signing region
    #[serde(default = "default_region")]
    pub region: String,

    /// Use path-style addressing (`endpoint/bucket/key`)
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_force_path_style() -> bool {
    true
}

impl StoreConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint: None,
            region: default_region(),
            force_path_style: default_force_path_style(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(Error::Config("Bucket name cannot be empty".into()));
        }

        if self.region.trim().is_empty() {
            return Err(Error::Config("Region cannot be empty".into()));
        }

        if let Some(endpoint) = &self.endpoint {
            let url = url::Url::parse(endpoint)
                .map_err(|e| Error::Config(format!("Invalid endpoint '{endpoint}': {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "Endpoint must use http or https: {endpoint}"
                )));
            }
        }

        Ok(())
    }
}
