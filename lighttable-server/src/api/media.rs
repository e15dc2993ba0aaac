//! Derived video media: poster frames, preview tracks, probe info
//!
//! Thumbnail and preview-track endpoints accept their parameters either as
//! a query string (GET) or a JSON body (POST).

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use lighttable_common::access::User;
use serde::{Deserialize, Serialize};

use super::files::PathQuery;
use super::required_path;
use crate::error::ApiResult;
use crate::transcode::MediaInfo;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ThumbnailRequest {
    pub path: Option<String>,
    /// `HH:MM:SS` or seconds; defaults to one second in
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailResponse {
    pub success: bool,
    pub thumbnail_path: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct PreviewTrackRequest {
    pub path: Option<String>,
    /// Seconds between frames; defaults to 10
    pub interval: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTrackResponse {
    pub success: bool,
    pub vtt_path: String,
    pub vtt_url: String,
    pub thumbnails_path: String,
}

fn file_url(path: &str) -> String {
    format!("/api/files/{}", path)
}

async fn thumbnail(state: AppState, user: User, request: ThumbnailRequest) -> ApiResult<Json<ThumbnailResponse>> {
    let path = required_path(&user, request.path.as_deref())?;
    let thumbnail_path = state
        .transcoder
        .thumbnail(&path, request.timestamp.as_deref())
        .await?;

    Ok(Json(ThumbnailResponse {
        success: true,
        url: file_url(&thumbnail_path),
        thumbnail_path,
    }))
}

/// GET /api/thumbnail?path=&timestamp=
pub async fn thumbnail_query(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(request): Query<ThumbnailRequest>,
) -> ApiResult<Json<ThumbnailResponse>> {
    thumbnail(state, user, request).await
}

/// POST /api/thumbnail {path, timestamp}
pub async fn thumbnail_body(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<ThumbnailRequest>,
) -> ApiResult<Json<ThumbnailResponse>> {
    thumbnail(state, user, request).await
}

async fn preview_track(
    state: AppState,
    user: User,
    request: PreviewTrackRequest,
) -> ApiResult<Json<PreviewTrackResponse>> {
    let path = required_path(&user, request.path.as_deref())?;
    let track = state.transcoder.preview_track(&path, request.interval).await?;

    Ok(Json(PreviewTrackResponse {
        success: true,
        vtt_url: file_url(&track.vtt_path),
        vtt_path: track.vtt_path,
        thumbnails_path: track.thumbnails_path,
    }))
}

/// GET /api/video-thumbnails?path=&interval=
pub async fn preview_track_query(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(request): Query<PreviewTrackRequest>,
) -> ApiResult<Json<PreviewTrackResponse>> {
    preview_track(state, user, request).await
}

/// POST /api/video-thumbnails {path, interval}
pub async fn preview_track_body(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(request): Json<PreviewTrackRequest>,
) -> ApiResult<Json<PreviewTrackResponse>> {
    preview_track(state, user, request).await
}

/// GET /api/video-info?path=
pub async fn video_info(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<MediaInfo>> {
    let path = required_path(&user, query.path.as_deref())?;
    Ok(Json(state.transcoder.video_info(&path).await?))
}
