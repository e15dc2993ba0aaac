//! Sidecar metadata store
//!
//! Reads and writes `<path>.txt` beside each content file under the data
//! root. Reads never fail; mutations are unlocked read-modify-write cycles
//! (see the module docs in [`crate::metadata`] for the race this implies).

use super::{format, Actor, Metadata, SidecarRead, MAX_RATING, MIN_RATING};
use crate::{naming, paths, time, Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Store of per-file sidecar metadata rooted at the data directory
#[derive(Debug, Clone)]
pub struct MetadataStore {
    root: PathBuf,
}

impl MetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data directory all content paths are relative to
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute sidecar location for a content path
    fn sidecar_location(&self, path: &str) -> Result<PathBuf> {
        let normalized = paths::normalize(path)?;
        if normalized.is_empty() {
            return Err(Error::InvalidInput(
                "Metadata requires a file path".to_string(),
            ));
        }
        Ok(paths::resolve(&self.root, &naming::sidecar_path(&normalized)))
    }

    /// Load metadata for `path`
    ///
    /// Never fails: a missing sidecar and an unreadable one both yield an
    /// empty record. Use [`MetadataStore::read_detailed`] to tell them apart.
    pub async fn read(&self, path: &str) -> Metadata {
        match self.read_detailed(path).await {
            SidecarRead::Unreadable(reason) => {
                warn!(path = %path, reason = %reason, "Sidecar unreadable, treating as empty");
                Metadata::default()
            }
            other => other.into_metadata(),
        }
    }

    /// Load metadata for `path`, distinguishing absent from unreadable sidecars
    pub async fn read_detailed(&self, path: &str) -> SidecarRead {
        let location = match self.sidecar_location(path) {
            Ok(location) => location,
            Err(e) => return SidecarRead::Unreadable(e.to_string()),
        };

        let bytes = match tokio::fs::read(&location).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return SidecarRead::Absent,
            Err(e) => return SidecarRead::Unreadable(e.to_string()),
        };

        match String::from_utf8(bytes) {
            Ok(content) => SidecarRead::Loaded(format::parse_sidecar(&content)),
            Err(e) => SidecarRead::Unreadable(format!("Invalid UTF-8: {}", e)),
        }
    }

    /// Stamp, serialize and overwrite the sidecar for `path`
    ///
    /// Sets `lastModified` to now and `modifiedBy` to the actor's signature,
    /// creates parent directories as needed, and returns the stamped record
    /// in canonical form, equal to what a following read yields.
    pub async fn write(&self, path: &str, mut metadata: Metadata, actor: &Actor) -> Result<Metadata> {
        if let Some(rating) = metadata.rating {
            validate_rating(rating)?;
        }
        let location = self.sidecar_location(path)?;

        metadata.last_modified = Some(time::now_iso());
        metadata.modified_by = Some(actor.signature());
        let metadata = format::canonicalize(metadata);

        let content = format::format_sidecar(&metadata);
        replace_file(&location, content.as_bytes()).await?;

        debug!(path = %path, modified_by = %actor.signature(), "Sidecar written");
        Ok(metadata)
    }

    /// Append a preformatted `[timestamp] name: text` comment
    ///
    /// Line breaks in the text are folded into spaces; a comment is one line.
    pub async fn append_comment(&self, path: &str, text: &str, actor: &Actor) -> Result<Metadata> {
        let text = format::single_line(text);
        if text.is_empty() {
            return Err(Error::InvalidInput("Comment text is empty".to_string()));
        }

        let mut metadata = self.read(path).await;
        metadata
            .comments
            .push(format!("[{}] {}: {}", time::now_iso(), format::single_line(&actor.name), text));
        self.write(path, metadata, actor).await
    }

    /// Set the 1-5 rating
    pub async fn set_rating(&self, path: &str, rating: u8, actor: &Actor) -> Result<Metadata> {
        validate_rating(rating)?;
        let mut metadata = self.read(path).await;
        metadata.rating = Some(rating);
        self.write(path, metadata, actor).await
    }

    /// Flip the selection flag and return its new value
    pub async fn toggle_selection(&self, path: &str, actor: &Actor) -> Result<bool> {
        let mut metadata = self.read(path).await;
        let selected = !metadata.is_selected();
        metadata.selected = Some(selected);
        self.write(path, metadata, actor).await?;
        Ok(selected)
    }

    /// Record the transcoded artifact produced for `path`
    pub async fn record_conversion(
        &self,
        path: &str,
        converted_path: &str,
        actor: &Actor,
    ) -> Result<Metadata> {
        let mut metadata = self.read(path).await;
        metadata.converted_path = Some(converted_path.to_string());
        metadata.conversion_date = Some(time::now_iso());
        self.write(path, metadata, actor).await
    }

    /// Delete the sidecar for `path` if one exists
    pub async fn remove(&self, path: &str) -> Result<()> {
        let location = self.sidecar_location(path)?;
        match tokio::fs::remove_file(&location).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_rating(rating: u8) -> Result<()> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "Rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, rating
        )))
    }
}

/// Replace `target` as a whole: write a sibling temp file, then rename
///
/// Concurrent writers to the same target each rename a complete file, so the
/// result is always one writer's content, never an interleaving.
pub(crate) async fn replace_file(target: &Path, content: &[u8]) -> Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| Error::Internal(format!("No parent directory for {}", target.display())))?;
    tokio::fs::create_dir_all(parent).await?;

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(".{}.{:016x}.tmp", file_name, rand::random::<u64>()));

    tokio::fs::write(&temp, content).await?;
    if let Err(e) = tokio::fs::rename(&temp, target).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}
