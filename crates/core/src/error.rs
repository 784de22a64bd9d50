//! Error types for dirsync-core
//!
//! Provides a unified error type shared by the core operations and the
//! storage adapters.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for dirsync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for dirsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local source directory does not exist
    #[error("Local directory not found: {}", .0.display())]
    LocalDirectoryNotFound(PathBuf),

    /// Remote container (bucket) does not exist
    #[error("Container '{0}' does not exist")]
    ContainerNotFound(String),

    /// Remote object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Path or key that cannot be mapped safely
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Options or store configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Zip archive error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Authentication or permission failure reported by the backend
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network error (retryable)
    #[error("Network error: {0}")]
    Network(String),

    /// General error
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Whether this is a precondition failure on a missing local directory or container
    pub const fn is_missing_resource(&self) -> bool {
        matches!(
            self,
            Error::LocalDirectoryNotFound(_) | Error::ContainerNotFound(_)
        )
    }

    /// Whether retrying the same call could succeed
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_resource_kinds() {
        assert!(Error::LocalDirectoryNotFound("/tmp/nope".into()).is_missing_resource());
        assert!(Error::ContainerNotFound("backups".into()).is_missing_resource());
        assert!(!Error::NotFound("a.txt".into()).is_missing_resource());
        assert!(!Error::General("boom".into()).is_missing_resource());
    }

    #[test]
    fn test_retryable() {
        assert!(Error::Network("reset".into()).is_retryable());
        assert!(!Error::Auth("denied".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = Error::ContainerNotFound("backups".into());
        assert_eq!(err.to_string(), "Container 'backups' does not exist");

        let err = Error::LocalDirectoryNotFound("/data/in".into());
        assert_eq!(err.to_string(), "Local directory not found: /data/in");

        let err = Error::InvalidPath("../etc/passwd".into());
        assert_eq!(err.to_string(), "Invalid path: ../etc/passwd");
    }
}
