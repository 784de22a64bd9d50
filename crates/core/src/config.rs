//! Options controlling the directory operations
//!
//! Options can be built in code or read from a TOML document. Every field has
//! a default, so an empty document is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path::PrefixMatch;

/// Default number of in-flight item transfers
const DEFAULT_CONCURRENCY: usize = 1;

/// Default page size for prefix listings
const DEFAULT_PAGE_SIZE: i32 = 1000;

/// Options shared by all directory operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Maximum number of item transfers in flight at once
    ///
    /// Archive downloads ignore this and always write one entry at a time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// How the virtual prefix is matched against remote keys
    #[serde(default)]
    pub prefix_match: PrefixMatch,

    /// Keep deleting the remaining keys after a failed delete
    #[serde(default)]
    pub continue_on_delete_error: bool,

    /// Keys requested per listing page
    #[serde(default = "default_page_size")]
    pub page_size: i32,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_page_size() -> i32 {
    DEFAULT_PAGE_SIZE
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            prefix_match: PrefixMatch::default(),
            continue_on_delete_error: false,
            page_size: default_page_size(),
        }
    }
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_prefix_match(mut self, mode: PrefixMatch) -> Self {
        self.prefix_match = mode;
        self
    }

    pub fn with_continue_on_delete_error(mut self, enabled: bool) -> Self {
        self.continue_on_delete_error = enabled;
        self
    }

    pub fn with_page_size(mut self, size: i32) -> Self {
        self.page_size = size.clamp(1, DEFAULT_PAGE_SIZE);
        self
    }

    /// Parse options from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let options: Self = toml::from_str(content)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values the operations cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }
        if !(1..=DEFAULT_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::Config(format!(
                "page_size must be between 1 and {DEFAULT_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        Ok(())
    }
}
