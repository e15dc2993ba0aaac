//! Derived-artifact naming convention
//!
//! Every artifact the service produces lives beside its source file:
//!
//! | artifact            | name                                  |
//! |---------------------|---------------------------------------|
//! | sidecar metadata    | `<file>.txt`                          |
//! | transcoded video    | `<base>_converted.mp4`                |
//! | poster frame        | `<base>_thumb.jpg`                    |
//! | preview track       | `<base>_thumbnails.vtt`               |
//! | preview frames      | `<base>_thumbnails/thumb_N.jpg`       |
//!
//! None of them are ever shown in directory listings.

use crate::paths;

pub const SIDECAR_SUFFIX: &str = ".txt";
pub const CONVERTED_MARKER: &str = "_converted";
pub const CONVERTED_EXTENSION: &str = "mp4";
pub const THUMB_SUFFIX: &str = "_thumb.jpg";
pub const PREVIEW_TRACK_SUFFIX: &str = "_thumbnails.vtt";
pub const PREVIEW_DIR_SUFFIX: &str = "_thumbnails";

/// Sidecar location for a content path: the full path plus `.txt`
pub fn sidecar_path(path: &str) -> String {
    format!("{}{}", path, SIDECAR_SUFFIX)
}

/// True when the file stem ends in `_converted`
pub fn is_converted(path: &str) -> bool {
    let (stem, _) = paths::split_extension(paths::file_name(path));
    stem.ends_with(CONVERTED_MARKER)
}

/// Transcode target for a source video: `<dir>/<base>_converted.mp4`
pub fn converted_path(path: &str) -> String {
    derived(path, &format!("{}.{}", CONVERTED_MARKER, CONVERTED_EXTENSION))
}

/// Poster frame for a video: `<dir>/<base>_thumb.jpg`
pub fn thumbnail_path(path: &str) -> String {
    derived(path, THUMB_SUFFIX)
}

/// WebVTT preview track for a video: `<dir>/<base>_thumbnails.vtt`
pub fn preview_track_path(path: &str) -> String {
    derived(path, PREVIEW_TRACK_SUFFIX)
}

/// Directory holding preview frames: `<dir>/<base>_thumbnails`
pub fn preview_dir(path: &str) -> String {
    derived(path, PREVIEW_DIR_SUFFIX)
}

/// Single preview frame, numbered from 1
pub fn preview_frame(path: &str, index: usize) -> String {
    format!("{}/thumb_{}.jpg", preview_dir(path), index)
}

/// True for names produced by the service rather than uploaded by users
pub fn is_derived_artifact(name: &str, is_dir: bool) -> bool {
    if is_dir {
        return name.ends_with(PREVIEW_DIR_SUFFIX);
    }
    name.ends_with(SIDECAR_SUFFIX)
        || name.ends_with(THUMB_SUFFIX)
        || name.ends_with(PREVIEW_TRACK_SUFFIX)
        || is_converted(name)
}

fn derived(path: &str, suffix: &str) -> String {
    let (stem, _) = paths::split_extension(paths::file_name(path));
    paths::join(paths::parent(path), &format!("{}{}", stem, suffix))
}
