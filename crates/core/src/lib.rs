//! dirsync-core: directory synchronization over object storage
//!
//! This crate provides:
//! - The [`ObjectStore`] trait that storage backends implement
//! - [`DirectorySync`], which uploads a directory tree, downloads a prefix to
//!   disk or into a zip archive, and deletes everything under a prefix
//! - The mapping between local paths and object keys
//! - Per-item reporting and progress events
//!
//! The crate does not depend on any storage SDK. [`MemoryStore`] is an
//! in-process backend for tests and local use.

pub mod config;
pub mod error;
pub mod events;
pub mod memory;
pub mod path;
pub mod report;
pub mod sync;
pub mod traits;

pub use config::SyncOptions;
pub use error::{Error, Result};
pub use events::{ChannelSink, EventSink, Operation, SyncEvent, TracingSink};
pub use memory::MemoryStore;
pub use path::{
    PrefixMatch, VirtualPrefix, archive_entry_name, local_to_remote, relative_key,
    remote_to_local,
};
pub use report::{ItemOutcome, ItemStatus, TransferReport};
pub use sync::DirectorySync;
pub use traits::{ListOptions, ListResult, ObjectInfo, ObjectReader, ObjectStore};
