//! Relative content paths
//!
//! Every path that arrives from a client is slash-separated and relative to
//! the configured data root. Paths are normalized before they touch the
//! filesystem: empty and `.` segments collapse, `..` is rejected, so a
//! normalized path can never escape the root.

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Normalize a client-supplied relative path
///
/// `"/ProjectA//shots/./a.jpg"` becomes `"ProjectA/shots/a.jpg"`; the empty
/// string denotes the root itself.
pub fn normalize(raw: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(Error::InvalidInput(format!(
                    "Parent references are not allowed: {}",
                    raw
                )))
            }
            s if s.contains('\\') || s.contains('\0') => {
                return Err(Error::InvalidInput(format!("Invalid path segment: {:?}", s)))
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// Validate a single new entry name (folder or uploaded file name)
pub fn single_segment(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains('/')
        || trimmed.contains('\\')
        || trimmed.contains('\0')
    {
        return Err(Error::InvalidInput(format!("Invalid name: {:?}", name)));
    }
    Ok(trimmed)
}

/// Join a normalized parent path and a child name
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Parent directory of a normalized path ("" for top-level entries)
pub fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Final segment of a normalized path
pub fn file_name(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Split a file name into stem and extension (extension without the dot)
///
/// Dotfiles keep their full name as the stem: `".env"` has no extension.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(idx) => (&name[..idx], Some(&name[idx + 1..])),
    }
}

/// Absolute location of a normalized relative path under `root`
pub fn resolve(root: &Path, relative: &str) -> PathBuf {
    let mut full = root.to_path_buf();
    for segment in relative.split('/').filter(|s| !s.is_empty()) {
        full.push(segment);
    }
    full
}
