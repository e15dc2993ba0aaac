//! Per-file review metadata: comments, ratings, selection

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use lighttable_common::access::User;
use lighttable_common::metadata::{Actor, Metadata};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::files::PathQuery;
use super::required_path;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /api/metadata body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRequest {
    pub path: Option<String>,
    pub action: String,
    /// `comment` action
    pub comment: Option<String>,
    /// `rating` action, 1-5
    pub rating: Option<i64>,
    /// `update` action: the whole record
    pub metadata: Option<Metadata>,
}

/// The mutations clients can request
#[derive(Debug, Clone, PartialEq)]
enum MetadataAction {
    Comment(String),
    Rating(u8),
    ToggleSelection,
    Update(Metadata),
}

impl MetadataAction {
    fn from_request(request: MetadataRequest) -> ApiResult<Self> {
        match request.action.as_str() {
            "comment" => request
                .comment
                .map(MetadataAction::Comment)
                .ok_or_else(|| ApiError::BadRequest("Comment text required".to_string())),
            "rating" => {
                let rating = request
                    .rating
                    .ok_or_else(|| ApiError::BadRequest("Rating required".to_string()))?;
                u8::try_from(rating)
                    .map(MetadataAction::Rating)
                    .map_err(|_| ApiError::BadRequest(format!("Invalid rating: {}", rating)))
            }
            "toggle-selection" => Ok(MetadataAction::ToggleSelection),
            "update" => request
                .metadata
                .map(MetadataAction::Update)
                .ok_or_else(|| ApiError::BadRequest("Metadata required".to_string())),
            _ => Err(ApiError::BadRequest("Invalid action".to_string())),
        }
    }
}

/// GET /api/metadata?path=
///
/// Files without a sidecar return an empty record.
pub async fn get_metadata(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<Metadata>> {
    let path = required_path(&user, query.path.as_deref())?;
    Ok(Json(state.store.read(&path).await))
}

/// POST /api/metadata {path, action, ...}
///
/// Returns the updated record, except `toggle-selection` which returns
/// `{selected}`.
pub async fn update_metadata(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(mut body): Json<MetadataRequest>,
) -> ApiResult<Response> {
    let path = required_path(&user, body.path.take().as_deref())?;
    let action = MetadataAction::from_request(body)?;
    let actor = Actor::from(&user);
    debug!(path = %path, email = %user.email, ?action, "Metadata action");

    let metadata = match action {
        MetadataAction::Comment(text) => state.store.append_comment(&path, &text, &actor).await?,
        MetadataAction::Rating(rating) => state.store.set_rating(&path, rating, &actor).await?,
        MetadataAction::ToggleSelection => {
            let selected = state.store.toggle_selection(&path, &actor).await?;
            return Ok(Json(json!({ "selected": selected })).into_response());
        }
        MetadataAction::Update(metadata) => state.store.write(&path, metadata, &actor).await?,
    };
    Ok(Json(metadata).into_response())
}
