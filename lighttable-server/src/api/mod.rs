//! HTTP API handlers for lighttable-server

pub mod auth;
pub mod convert;
pub mod files;
pub mod health;
pub mod media;
pub mod metadata;
pub mod settings;

pub use health::health_routes;

use crate::error::{ApiError, ApiResult};
use lighttable_common::access::{self, User};
use lighttable_common::paths;
use tracing::warn;

/// Normalize a client path and check it against the user's start path
///
/// Returns the normalized path; 400 for malformed paths, 403 outside the
/// user's start path.
pub(crate) fn authorized_path(user: &User, requested: &str) -> ApiResult<String> {
    let path = paths::normalize(requested)?;
    if !access::authorize(user, &path).is_allowed() {
        warn!(email = %user.email, path = %path, "Path outside start path");
        return Err(ApiError::forbidden());
    }
    Ok(path)
}

/// Like [`authorized_path`] but rejects a missing or empty path
pub(crate) fn required_path(user: &User, requested: Option<&str>) -> ApiResult<String> {
    let path = authorized_path(user, requested.unwrap_or_default())?;
    if path.is_empty() {
        return Err(ApiError::BadRequest("No path provided".to_string()));
    }
    Ok(path)
}
