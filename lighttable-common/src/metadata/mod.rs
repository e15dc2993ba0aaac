//! Per-file sidecar metadata
//!
//! Each content file `photo.jpg` may carry a human-readable sidecar
//! `photo.jpg.txt` holding its rating, selection flag, comments, tags, notes
//! and transcode bookkeeping. See [`format`] for the on-disk layout and
//! [`store`] for the read/modify/write operations.
//!
//! # Concurrency
//!
//! There is no locking. Every mutation is a read-modify-write of the whole
//! file, so two concurrent mutations of the *same* path race and the later
//! write wins; the earlier update is lost. Each write replaces the file
//! atomically, so readers always observe one complete version. Mutations of
//! different paths never interfere.

pub mod format;
pub mod store;

use serde::{Deserialize, Serialize};

pub use format::{format_sidecar, parse_sidecar};
pub use store::MetadataStore;

/// Lowest accepted rating
pub const MIN_RATING: u8 = 1;
/// Highest accepted rating
pub const MAX_RATING: u8 = 5;

/// Metadata record for one content file
///
/// Absence of a sidecar is represented by `Metadata::default()`; every field
/// is optional and empty collections mean "none".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,

    /// Preformatted `[timestamp] author: text` lines, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    /// `Name <email>` of the last writer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_date: Option<String>,
}

impl Metadata {
    /// True when no field carries a value
    pub fn is_empty(&self) -> bool {
        *self == Metadata::default()
    }

    /// Selection flag with absence counted as unselected
    pub fn is_selected(&self) -> bool {
        self.selected.unwrap_or(false)
    }
}

/// Identity stamped into `modifiedBy` and comment prefixes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub email: String,
}

impl Actor {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// `Name <email>` as written to the `Modified By:` line
    pub fn signature(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// Outcome of loading a sidecar, keeping "absent" and "unreadable" apart
///
/// The public [`MetadataStore::read`] contract collapses both into an empty
/// record; this type exists for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarRead {
    /// No sidecar file exists yet
    Absent,
    /// Sidecar was read and parsed
    Loaded(Metadata),
    /// Sidecar exists but could not be read (permissions, invalid UTF-8, ...)
    Unreadable(String),
}

impl SidecarRead {
    /// Collapse into the record callers see: empty unless loaded
    pub fn into_metadata(self) -> Metadata {
        match self {
            SidecarRead::Loaded(metadata) => metadata,
            SidecarRead::Absent | SidecarRead::Unreadable(_) => Metadata::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert!(Metadata::default().is_empty());
        let rated = Metadata {
            rating: Some(3),
            ..Default::default()
        };
        assert!(!rated.is_empty());
    }

    #[test]
    fn test_actor_signature() {
        let actor = Actor::new("Ana", "a@x.com");
        assert_eq!(actor.signature(), "Ana <a@x.com>");
    }

    #[test]
    fn test_sidecar_read_collapses_to_empty() {
        assert!(SidecarRead::Absent.into_metadata().is_empty());
        assert!(SidecarRead::Unreadable("denied".into()).into_metadata().is_empty());
    }

    #[test]
    fn test_json_uses_camel_case_and_skips_absent() {
        let metadata = Metadata {
            rating: Some(4),
            converted_path: Some("clip_converted.mp4".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["rating"], 4);
        assert_eq!(json["convertedPath"], "clip_converted.mp4");
        assert!(json.get("comments").is_none());
        assert!(json.get("selected").is_none());
    }

    #[test]
    fn test_json_partial_deserialize() {
        let metadata: Metadata = serde_json::from_str(r#"{"tags":["hero"],"notes":"keep"}"#).unwrap();
        assert_eq!(metadata.tags, vec!["hero".to_string()]);
        assert_eq!(metadata.notes.as_deref(), Some("keep"));
        assert_eq!(metadata.rating, None);
    }
}
