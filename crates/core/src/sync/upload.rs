//! Directory upload

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};

use super::DirectorySync;
use crate::error::{Error, Result};
use crate::events::Operation;
use crate::path::{VirtualPrefix, local_to_remote};
use crate::report::{ItemOutcome, TransferReport};
use crate::traits::ObjectStore;

/// A local file and the key it maps to
#[derive(Debug)]
struct UploadJob {
    path: PathBuf,
    key: String,
}

/// Result of walking the source tree
#[derive(Debug, Default)]
struct Walk {
    jobs: Vec<UploadJob>,
    /// Entries that could not be read or mapped
    failures: Vec<ItemOutcome>,
}

impl<S: ObjectStore> DirectorySync<S> {
    /// Upload a local directory tree into the container
    ///
    /// Files land under `prefix` (if any) with their path relative to
    /// `source`. Keys that already exist are skipped without comparing
    /// content, so repeating the call only uploads files that are new.
    pub async fn upload_directory(
        &self,
        source: impl AsRef<Path>,
        prefix: Option<&str>,
    ) -> Result<TransferReport> {
        let source = source.as_ref();
        let is_dir = tokio::fs::metadata(source)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(Error::LocalDirectoryNotFound(source.to_path_buf()));
        }

        self.ensure_container().await?;

        let base = tokio::fs::canonicalize(source).await?;
        let walk = walk_tree(base, VirtualPrefix::parse(prefix)).await?;
        tracing::debug!(
            source = %source.display(),
            files = walk.jobs.len(),
            "Enumerated local files"
        );

        let mut report = TransferReport::new(Operation::Upload);
        for failure in walk.failures {
            self.record(&mut report, failure);
        }

        let mut outcomes = stream::iter(walk.jobs)
            .map(|job| self.upload_one(job))
            .buffer_unordered(self.concurrency());
        while let Some(outcome) = outcomes.next().await {
            self.record(&mut report, outcome);
        }

        Ok(report)
    }

    async fn upload_one(&self, job: UploadJob) -> ItemOutcome {
        let source = job.path.display().to_string();

        match self.store.object_exists(&job.key).await {
            Ok(true) => return ItemOutcome::skipped(source, job.key),
            Ok(false) => {}
            Err(e) => return ItemOutcome::failed(source, job.key, e),
        }

        match self.store.put_file(&job.key, &job.path).await {
            Ok(info) => {
                let size = info
                    .size_bytes
                    .and_then(|s| u64::try_from(s).ok())
                    .unwrap_or(0);
                ItemOutcome::transferred(source, job.key, size)
            }
            Err(e) => ItemOutcome::failed(source, job.key, e),
        }
    }
}

/// Walk `base` pre-order: the files of a directory first, then each
/// subdirectory with the prefix extended by its name.
///
/// Uses an explicit stack, so tree depth is not bounded by the call stack.
/// Symlinks to files are uploaded; symlinked directories are not entered.
async fn walk_tree(base: PathBuf, prefix: Option<VirtualPrefix>) -> Result<Walk> {
    let mut walk = Walk::default();
    let mut stack = vec![(base, prefix)];
    let mut is_root = true;

    while let Some((dir, prefix)) = stack.pop() {
        let entries = match read_dir_entries(&dir).await {
            Ok(entries) => entries,
            Err(e) if is_root => return Err(e),
            Err(e) => {
                let target = prefix.as_ref().map(ToString::to_string).unwrap_or_default();
                walk.failures
                    .push(ItemOutcome::failed(dir.display().to_string(), target, e));
                continue;
            }
        };
        is_root = false;

        let subdirs = walk.add_entries(&dir, prefix.as_ref(), entries);

        // Reversed so the first subdirectory is popped next
        stack.extend(subdirs.into_iter().rev());
    }

    Ok(walk)
}

impl Walk {
    /// Queue the files of one directory and return its subdirectories
    ///
    /// An entry that could not be classified is recorded as a failure; the
    /// rest of the directory is still walked.
    fn add_entries(
        &mut self,
        dir: &Path,
        prefix: Option<&VirtualPrefix>,
        entries: Vec<(PathBuf, std::io::Result<EntryKind>)>,
    ) -> Vec<(PathBuf, Option<VirtualPrefix>)> {
        let mut subdirs = Vec::new();
        for (path, kind) in entries {
            match kind {
                Ok(EntryKind::File) => match local_to_remote(dir, &path, prefix) {
                    Ok(key) => self.jobs.push(UploadJob { path, key }),
                    Err(e) => self.fail(&path, e),
                },
                Ok(EntryKind::Dir) => match path.file_name().and_then(|n| n.to_str()) {
                    Some(name) => {
                        let child = match prefix {
                            Some(prefix) => Some(prefix.join(name)),
                            None => VirtualPrefix::new(name),
                        };
                        subdirs.push((path, child));
                    }
                    None => {
                        let e = Error::InvalidPath(format!(
                            "Non UTF-8 directory name: {}",
                            path.display()
                        ));
                        self.fail(&path, e);
                    }
                },
                Ok(EntryKind::Other) => {
                    tracing::debug!(path = %path.display(), "Skipping non-regular entry");
                }
                Err(e) => self.fail(&path, e),
            }
        }
        subdirs
    }

    fn fail(&mut self, path: &Path, cause: impl std::fmt::Display) {
        self.failures
            .push(ItemOutcome::failed(path.display().to_string(), "", cause));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Dir,
    Other,
}

/// Read a directory's entries, classifying each one
///
/// Only failing to read the directory itself is an error; an entry whose
/// type cannot be determined carries its own error.
async fn read_dir_entries(dir: &Path) -> Result<Vec<(PathBuf, std::io::Result<EntryKind>)>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        let kind = match entry.file_type().await {
            Ok(file_type) if file_type.is_file() => Ok(EntryKind::File),
            Ok(file_type) if file_type.is_dir() => Ok(EntryKind::Dir),
            Ok(file_type) if file_type.is_symlink() => match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => Ok(EntryKind::File),
                _ => Ok(EntryKind::Other),
            },
            Ok(_) => Ok(EntryKind::Other),
            Err(e) => Err(e),
        };
        entries.push((path, kind));
    }

    Ok(entries)
}
