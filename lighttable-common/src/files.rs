//! File tree service
//!
//! Lists the data directory for browsing, hiding everything that is not
//! user content (dotfiles, sidecars, generated thumbnails and preview
//! tracks, transcoded copies), and performs the few mutating operations the
//! browser offers: create folder, delete, upload.

use crate::metadata::{Metadata, MetadataStore};
use crate::{mime, naming, paths, Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Default upload limit (500 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Entry kind in a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// One browsable entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFile {
    pub name: String,
    /// Slash-separated path relative to the data root
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Size in bytes; folders have none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Node of the recursive folder tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderNode {
    pub name: String,
    pub path: String,
    pub children: Vec<FolderNode>,
}

/// Result of an existence check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCheck {
    pub exists: bool,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_file: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_directory: Option<bool>,
}

/// True for entries shown to users: not hidden, not a derived artifact
pub fn is_listable(name: &str, is_dir: bool) -> bool {
    !name.starts_with('.') && !naming::is_derived_artifact(name, is_dir)
}

/// Case-insensitive name order, ties broken by the exact name
fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Folders first, then files; each group by name
fn compare_entries(a: &ContentFile, b: &ContentFile) -> Ordering {
    match (a.kind, b.kind) {
        (EntryKind::Folder, EntryKind::File) => Ordering::Less,
        (EntryKind::File, EntryKind::Folder) => Ordering::Greater,
        _ => compare_names(&a.name, &b.name),
    }
}

/// File tree rooted at the data directory
#[derive(Debug, Clone)]
pub struct FileTree {
    root: PathBuf,
    store: MetadataStore,
    max_upload_bytes: u64,
}

impl FileTree {
    pub fn new(store: MetadataStore) -> Self {
        Self {
            root: store.root().to_path_buf(),
            store,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, max_upload_bytes: u64) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Create the data directory if missing
    pub async fn ensure_root(&self) -> Result<()> {
        if !self.root.exists() {
            info!("Creating data directory: {}", self.root.display());
        }
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Absolute location of a client-supplied path
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        Ok(paths::resolve(&self.root, &paths::normalize(path)?))
    }

    /// List one directory level
    ///
    /// Any filesystem failure is reported as [`Error::ListingFailed`]; the
    /// underlying cause is only logged.
    pub async fn list(&self, dir: &str, with_metadata: bool) -> Result<Vec<ContentFile>> {
        let dir = paths::normalize(dir)?;
        let full = paths::resolve(&self.root, &dir);

        let mut entries = match self.read_entries(&dir, &full).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(dir = %dir, error = %e, "Error listing files");
                return Err(Error::ListingFailed(dir));
            }
        };

        if with_metadata {
            for entry in entries.iter_mut().filter(|e| e.kind == EntryKind::File) {
                entry.metadata = Some(self.store.read(&entry.path).await);
            }
        }

        entries.sort_by(compare_entries);
        debug!(dir = %dir, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn read_entries(&self, dir: &str, full: &Path) -> std::io::Result<Vec<ContentFile>> {
        let mut reader = tokio::fs::read_dir(full).await?;
        let mut entries = Vec::new();

        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Follows symlinks so linked folders browse like folders
            let stats = match tokio::fs::metadata(entry.path()).await {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(name = %name, error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let is_dir = stats.is_dir();
            if !is_listable(&name, is_dir) {
                continue;
            }

            let kind = if is_dir { EntryKind::Folder } else { EntryKind::File };
            entries.push(ContentFile {
                path: paths::join(dir, &name),
                size: (kind == EntryKind::File).then(|| stats.len()),
                modified: stats.modified().ok().map(DateTime::<Utc>::from),
                mime_type: (kind == EntryKind::File).then(|| mime::mime_type_for(&name).to_string()),
                metadata: None,
                kind,
                name,
            });
        }

        Ok(entries)
    }

    /// Recursive tree of all user folders, each level sorted by name
    pub async fn folder_tree(&self) -> Result<Vec<FolderNode>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || build_folder_tree(&root))
            .await
            .map_err(|e| Error::Internal(format!("Folder tree task failed: {}", e)))
    }

    /// Create `parent/name` (and any missing ancestors); returns the new path
    pub async fn create_folder(&self, parent: &str, name: &str) -> Result<String> {
        let parent = paths::normalize(parent)?;
        let name = paths::single_segment(name)?;
        let path = paths::join(&parent, name);

        tokio::fs::create_dir_all(paths::resolve(&self.root, &path)).await?;
        info!(path = %path, "Folder created");
        Ok(path)
    }

    /// Delete a file or a whole folder
    ///
    /// Folder deletion is recursive and irreversible. Deleting a file also
    /// removes its sidecar and, for videos, its generated artifacts.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let path = paths::normalize(path)?;
        if path.is_empty() {
            return Err(Error::InvalidInput("Cannot delete the data root".to_string()));
        }
        let full = paths::resolve(&self.root, &path);

        let stats = match tokio::fs::symlink_metadata(&full).await {
            Ok(stats) => stats,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::NotFound(path)),
            Err(e) => return Err(e.into()),
        };

        if stats.is_dir() {
            tokio::fs::remove_dir_all(&full).await?;
            info!(path = %path, "Folder deleted");
            return Ok(());
        }

        tokio::fs::remove_file(&full).await?;
        self.store.remove(&path).await?;
        if mime::is_video(mime::mime_type_for(&path)) {
            self.remove_video_artifacts(&path).await;
        }
        info!(path = %path, "File deleted");
        Ok(())
    }

    async fn remove_video_artifacts(&self, path: &str) {
        for artifact in [
            naming::thumbnail_path(path),
            naming::preview_track_path(path),
            naming::converted_path(path),
        ] {
            remove_if_present(&paths::resolve(&self.root, &artifact), false).await;
        }
        remove_if_present(&paths::resolve(&self.root, &naming::preview_dir(path)), true).await;
    }

    /// Store an uploaded file in `dir`; returns its relative path
    pub async fn save_upload(&self, dir: &str, file_name: &str, bytes: &[u8]) -> Result<String> {
        if bytes.len() as u64 > self.max_upload_bytes {
            return Err(Error::InvalidInput(format!(
                "File too large: {} bytes (limit {})",
                bytes.len(),
                self.max_upload_bytes
            )));
        }
        let dir = paths::normalize(dir)?;
        let file_name = paths::single_segment(file_name)?;
        if !is_listable(file_name, false) {
            return Err(Error::InvalidInput(format!("Reserved file name: {}", file_name)));
        }

        let path = paths::join(&dir, file_name);
        let full = paths::resolve(&self.root, &path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;

        info!(path = %path, size = bytes.len(), "Upload stored");
        Ok(path)
    }

    /// Existence check; never fails for missing paths
    pub async fn check(&self, path: &str) -> Result<FileCheck> {
        let path = paths::normalize(path)?;
        let full = paths::resolve(&self.root, &path);

        Ok(match tokio::fs::metadata(&full).await {
            Ok(stats) => FileCheck {
                exists: true,
                size: Some(stats.len()),
                is_file: Some(stats.is_file()),
                is_directory: Some(stats.is_dir()),
                path,
            },
            Err(_) => FileCheck {
                exists: false,
                path,
                size: None,
                is_file: None,
                is_directory: None,
            },
        })
    }
}

async fn remove_if_present(full: &Path, is_dir: bool) {
    let result = if is_dir {
        tokio::fs::remove_dir_all(full).await
    } else {
        tokio::fs::remove_file(full).await
    };
    match result {
        Ok(()) => debug!("Removed derived artifact {}", full.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove derived artifact {}: {}", full.display(), e),
    }
}

fn name_of(name: &OsStr) -> String {
    name.to_string_lossy().into_owned()
}

fn build_folder_tree(root: &Path) -> Vec<FolderNode> {
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by(|a, b| compare_names(&name_of(a.file_name()), &name_of(b.file_name())))
        .into_iter()
        .filter_entry(|e| e.file_type().is_dir() && is_listable(&name_of(e.file_name()), true));

    // stack[i] is the open folder at depth i + 1
    let mut stack: Vec<FolderNode> = Vec::new();
    let mut roots = Vec::new();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing folder: {}", e);
                continue;
            }
        };

        while stack.len() >= entry.depth() {
            if let Some(done) = stack.pop() {
                attach(&mut stack, &mut roots, done);
            }
        }

        let relative = entry
            .path()
            .strip_prefix(root)
            .map(|p| {
                p.components()
                    .map(|c| name_of(c.as_os_str()))
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .unwrap_or_default();

        stack.push(FolderNode {
            name: name_of(entry.file_name()),
            path: relative,
            children: Vec::new(),
        });
    }

    while let Some(done) = stack.pop() {
        attach(&mut stack, &mut roots, done);
    }
    roots
}

fn attach(stack: &mut [FolderNode], roots: &mut Vec<FolderNode>, node: FolderNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, kind: EntryKind) -> ContentFile {
        ContentFile {
            name: name.to_string(),
            path: name.to_string(),
            kind,
            size: None,
            modified: None,
            mime_type: None,
            metadata: None,
        }
    }

    #[test]
    fn test_is_listable() {
        assert!(is_listable("photo.jpg", false));
        assert!(is_listable("Shoot", true));
        assert!(!is_listable(".DS_Store", false));
        assert!(!is_listable(".cache", true));
        assert!(!is_listable("photo.jpg.txt", false));
        assert!(!is_listable("clip_thumbnails", true));
    }

    #[test]
    fn test_sort_folders_first_case_insensitive() {
        let mut entries = vec![
            entry("b.jpg", EntryKind::File),
            entry("Zeta", EntryKind::Folder),
            entry("A.jpg", EntryKind::File),
            entry("alpha", EntryKind::Folder),
        ];
        entries.sort_by(compare_entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Zeta", "A.jpg", "b.jpg"]);
    }

    #[test]
    fn test_folder_serializes_without_size_or_mime() {
        let json = serde_json::to_value(entry("Shoot", EntryKind::Folder)).unwrap();
        assert_eq!(json["type"], "folder");
        assert!(json.get("size").is_none());
        assert!(json.get("mimeType").is_none());
    }
}
