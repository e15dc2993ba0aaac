//! Static extension → MIME type lookup

/// Fallback for unknown extensions
pub const OCTET_STREAM: &str = "application/octet-stream";

/// MIME type for a file name, derived purely from its extension
///
/// Unknown or missing extensions map to [`OCTET_STREAM`].
pub fn mime_type_for(name: &str) -> &'static str {
    let ext = match crate::paths::split_extension(name) {
        (_, Some(ext)) => ext.to_ascii_lowercase(),
        (_, None) => return OCTET_STREAM,
    };
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "pdf" => "application/pdf",
        "vtt" => "text/vtt",
        _ => OCTET_STREAM,
    }
}

/// True for video MIME types
pub fn is_video(mime_type: &str) -> bool {
    mime_type.starts_with("video/")
}
