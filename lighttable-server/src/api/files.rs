//! File browsing, raw content, folder management and uploads

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::Response,
    Extension, Json,
};
use lighttable_common::access::{self, User};
use lighttable_common::files::{ContentFile, FileCheck};
use lighttable_common::mime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info, warn};

use super::{authorized_path, required_path};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub path: Option<String>,
    /// Attach each file's sidecar metadata
    pub metadata: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub files: Vec<ContentFile>,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    #[serde(default)]
    pub path: String,
    pub name: String,
}

fn require_tree_rights(user: &User) -> ApiResult<()> {
    if user.role.can_modify_tree() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Insufficient permissions".to_string()))
    }
}

/// GET /api/files?path=&metadata=
///
/// An empty path lands restricted users on their start path.
pub async fn list_files(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let requested = access::effective_path(&user, query.path.as_deref().unwrap_or_default());
    let path = authorized_path(&user, &requested)?;

    let files = state
        .tree
        .list(&path, query.metadata.unwrap_or(false))
        .await?;
    Ok(Json(ListResponse { files, path }))
}

/// POST /api/files {path, name} (admin/manager)
pub async fn create_folder(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(body): Json<CreateFolderRequest>,
) -> ApiResult<Json<Value>> {
    require_tree_rights(&user)?;
    let parent = authorized_path(&user, &body.path)?;

    let path = state.tree.create_folder(&parent, &body.name).await?;
    info!(email = %user.email, path = %path, "Folder created via API");
    Ok(Json(json!({ "success": true, "path": path })))
}

/// DELETE /api/files?path= (admin/manager)
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<Value>> {
    require_tree_rights(&user)?;
    let path = required_path(&user, query.path.as_deref())?;

    state.tree.delete(&path).await?;
    info!(email = %user.email, path = %path, "Entry deleted via API");
    Ok(Json(json!({ "success": true })))
}

/// GET /api/files/{*path}
///
/// Raw file content. Range requests are answered with 206 Partial Content.
pub async fn serve_file(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(path): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let path = required_path(&user, Some(&path))?;
    let full = state.tree.resolve(&path)?;

    let is_file = tokio::fs::metadata(&full)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ApiError::NotFound("File not found".to_string()));
    }

    let mut response = match ServeFile::new(&full).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if matches!(response.status(), StatusCode::OK | StatusCode::PARTIAL_CONTENT) {
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(mime::mime_type_for(&path)),
        );
    }
    debug!(path = %path, status = %response.status(), "Served file");
    Ok(response)
}

/// POST /api/upload (multipart: `file`, `path`)
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut dir = String::new();
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("path") => {
                dir = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid path field: {}", e)))?;
            }
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    warn!(error = %e, "Upload body rejected");
                    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        ApiError::PayloadTooLarge
                    } else {
                        ApiError::BadRequest(format!("Invalid upload: {}", e))
                    }
                })?;
                file = Some((name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (name, bytes) = file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    if bytes.len() as u64 > state.tree.max_upload_bytes() {
        return Err(ApiError::PayloadTooLarge);
    }
    let dir = authorized_path(&user, &access::effective_path(&user, &dir))?;

    let path = state.tree.save_upload(&dir, &name, &bytes).await?;
    info!(email = %user.email, path = %path, size = bytes.len(), "File uploaded");
    Ok(Json(json!({ "success": true, "path": path })))
}

/// GET /api/file-check?path=
pub async fn file_check(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<FileCheck>> {
    let path = required_path(&user, query.path.as_deref())?;
    Ok(Json(state.tree.check(&path).await?))
}
