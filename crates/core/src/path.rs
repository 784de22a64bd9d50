//! Path mapping between local files and remote object keys
//!
//! Remote keys are flat strings that simulate a hierarchy with `/`-delimited
//! segments. A virtual prefix scopes an operation to part of that key space.
//! Keys produced here always use `/`, whatever the local platform separator.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator used in remote keys
pub const KEY_SEPARATOR: char = '/';

/// How a virtual prefix is matched against remote keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefixMatch {
    /// Plain string prefix: `Folder` also matches `FolderX/a.txt`
    #[default]
    Raw,
    /// The key must equal the prefix or continue with `/` right after it
    Segment,
}

/// A normalized virtual prefix
///
/// Backslashes are converted to `/`, leading separators are trimmed and a run
/// of trailing separators collapses to one. A trailing `/` is kept: `Folder/`
/// only selects keys inside `Folder`, while `Folder` is a plain string prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualPrefix(String);

impl VirtualPrefix {
    /// Normalize a caller-supplied prefix
    ///
    /// Returns `None` when no segment is left, which means "the whole container".
    pub fn new(prefix: &str) -> Option<Self> {
        let normalized = prefix.replace('\\', "/");
        let trimmed = normalized.trim_start_matches(KEY_SEPARATOR);
        let base = trimmed.trim_end_matches(KEY_SEPARATOR);
        if base.is_empty() {
            None
        } else if base.len() < trimmed.len() {
            Some(Self(format!("{base}{KEY_SEPARATOR}")))
        } else {
            Some(Self(base.to_string()))
        }
    }

    /// Normalize an optional prefix
    pub fn parse(prefix: Option<&str>) -> Option<Self> {
        prefix.and_then(Self::new)
    }

    /// The prefix as used for listing and matching
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The prefix without its trailing separator
    pub fn base(&self) -> &str {
        self.0.trim_end_matches(KEY_SEPARATOR)
    }

    /// Extend the prefix by one segment (a subdirectory name)
    pub fn join(&self, segment: &str) -> Self {
        Self(format!("{}{KEY_SEPARATOR}{segment}", self.base()))
    }

    /// Check whether `key` lies under this prefix
    pub fn matches(&self, key: &str, mode: PrefixMatch) -> bool {
        match mode {
            PrefixMatch::Raw => key.starts_with(&self.0),
            PrefixMatch::Segment => key
                .strip_prefix(self.base())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(KEY_SEPARATOR)),
        }
    }
}

impl fmt::Display for VirtualPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Join a `/`-separated relative path onto an optional virtual prefix
pub fn join_key(prefix: Option<&VirtualPrefix>, relative: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}{KEY_SEPARATOR}{relative}", prefix.base()),
        None => relative.to_string(),
    }
}

/// Map a local file to its remote key
///
/// `base` is the absolute directory the traversal level started from; it is
/// stripped from `file` and the remainder is joined onto `prefix`.
pub fn local_to_remote(base: &Path, file: &Path, prefix: Option<&VirtualPrefix>) -> Result<String> {
    let relative = file.strip_prefix(base).map_err(|_| {
        Error::InvalidPath(format!(
            "{} is not below {}",
            file.display(),
            base.display()
        ))
    })?;

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                let segment = segment.to_str().ok_or_else(|| {
                    Error::InvalidPath(format!("Non UTF-8 file name: {}", file.display()))
                })?;
                segments.push(segment);
            }
            Component::CurDir => {}
            _ => {
                return Err(Error::InvalidPath(format!(
                    "Unexpected component in {}",
                    relative.display()
                )));
            }
        }
    }

    if segments.is_empty() {
        return Err(Error::InvalidPath(format!(
            "{} does not name a file below {}",
            file.display(),
            base.display()
        )));
    }

    Ok(join_key(prefix, &segments.join("/")))
}

/// Strip a virtual prefix from a remote key
///
/// When the key starts with the prefix string (without its trailing
/// separator), the prefix and the one character following it are removed. This is a string strip: under `Folder`
/// the key `FolderX/a.txt` yields `a.txt` after leading separators are trimmed.
/// A key equal to the prefix yields its last segment.
pub fn relative_key<'a>(key: &'a str, prefix: Option<&VirtualPrefix>) -> &'a str {
    let Some(prefix) = prefix else {
        return key;
    };

    let Some(rest) = key.strip_prefix(prefix.base()) else {
        return key;
    };

    let mut chars = rest.chars();
    chars.next();
    let rest = chars.as_str().trim_start_matches(KEY_SEPARATOR);

    if rest.is_empty() {
        key.rsplit(KEY_SEPARATOR).next().unwrap_or(key)
    } else {
        rest
    }
}

/// Split a relative key into segments that are safe to place below a root
fn safe_segments<'a>(key: &str, relative: &'a str) -> Result<Vec<&'a str>> {
    let mut segments = Vec::new();
    for segment in relative.split(KEY_SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(Error::InvalidPath(format!(
                    "Key '{key}' escapes the target directory"
                )));
            }
            segment => {
                let normal = Path::new(segment)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
                if !normal {
                    return Err(Error::InvalidPath(format!(
                        "Key '{key}' contains an unsupported segment '{segment}'"
                    )));
                }
                segments.push(segment);
            }
        }
    }

    if segments.is_empty() {
        return Err(Error::InvalidPath(format!(
            "Key '{key}' does not name a file"
        )));
    }

    Ok(segments)
}

/// Map a remote key to its destination below a local root directory
pub fn remote_to_local(root: &Path, key: &str, prefix: Option<&VirtualPrefix>) -> Result<PathBuf> {
    let relative = relative_key(key, prefix);
    let mut path = root.to_path_buf();
    for segment in safe_segments(key, relative)? {
        path.push(segment);
    }
    Ok(path)
}

/// Map a remote key to a zip entry name (always `/`-separated)
pub fn archive_entry_name(key: &str, prefix: Option<&VirtualPrefix>) -> Result<String> {
    let relative = relative_key(key, prefix);
    Ok(safe_segments(key, relative)?.join("/"))
}

/// Whether a key is a zero-byte folder marker such as `photos/`
pub fn is_folder_marker(key: &str) -> bool {
    key.ends_with(KEY_SEPARATOR)
}
