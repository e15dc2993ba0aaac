//! Admin settings: user directory management and the folder tree

use axum::{extract::State, Extension, Json};
use lighttable_common::access::User;
use lighttable_common::files::FolderNode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct FoldersResponse {
    pub folders: Vec<FolderNode>,
}

/// POST /api/settings/users body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageUsersRequest {
    pub action: String,
    pub user_data: Option<User>,
    /// `update`: email the record is currently stored under
    pub original_email: Option<String>,
    /// `delete`: email to remove
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum UserAction {
    Create(User),
    Update { original_email: String, user: User },
    Delete(String),
}

impl UserAction {
    fn from_request(request: ManageUsersRequest) -> ApiResult<Self> {
        let user_data = || {
            request
                .user_data
                .clone()
                .ok_or_else(|| ApiError::BadRequest("User data required".to_string()))
        };
        match request.action.as_str() {
            "create" => Ok(UserAction::Create(user_data()?)),
            "update" => {
                let user = user_data()?;
                let original_email = request
                    .original_email
                    .clone()
                    .unwrap_or_else(|| user.email.clone());
                Ok(UserAction::Update { original_email, user })
            }
            "delete" => request
                .email
                .clone()
                .map(UserAction::Delete)
                .ok_or_else(|| ApiError::BadRequest("Email required".to_string())),
            _ => Err(ApiError::BadRequest("Invalid action".to_string())),
        }
    }
}

fn require_admin(user: &User) -> ApiResult<()> {
    if user.role.can_administer() {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

/// GET /api/settings/users (admin)
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<Json<UsersResponse>> {
    require_admin(&user)?;
    Ok(Json(UsersResponse {
        users: state.users.list().await,
    }))
}

/// POST /api/settings/users {action, userData, originalEmail, email} (admin)
///
/// Deleting an unknown email still succeeds.
pub async fn manage_users(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(body): Json<ManageUsersRequest>,
) -> ApiResult<Json<Value>> {
    require_admin(&user)?;

    match UserAction::from_request(body)? {
        UserAction::Create(new_user) => {
            state.users.create(new_user).await?;
        }
        UserAction::Update { original_email, user: updated } => {
            state.users.update(&original_email, updated).await?;
        }
        UserAction::Delete(email) => {
            let removed = state.users.delete(&email).await?;
            if !removed {
                info!(email = %email, "Delete requested for unknown user");
            }
        }
    }
    Ok(Json(json!({ "success": true })))
}

/// GET /api/settings/folders (admin)
pub async fn folder_tree(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> ApiResult<Json<FoldersResponse>> {
    require_admin(&user)?;
    Ok(Json(FoldersResponse {
        folders: state.tree.folder_tree().await?,
    }))
}
