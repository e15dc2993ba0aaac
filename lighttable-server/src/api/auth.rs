//! Session authentication
//!
//! Login by email issues a signed session token in the `auth-token`
//! cookie. The middleware verifies that cookie on every protected route and
//! hands the session's [`User`] to handlers as an request extension.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension, Json,
};
use lighttable_common::access::{self, User, SESSION_TTL_SECS};
use lighttable_common::time;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "auth-token";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: User,
}

/// Value of cookie `name` from the `Cookie` headers
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

/// `Set-Cookie` value for the session cookie; `None` clears it
fn session_cookie(token: Option<&str>, secure: bool) -> String {
    let (value, max_age) = match token {
        Some(token) => (token, SESSION_TTL_SECS),
        None => ("", 0),
    };
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, value, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn with_cookie(mut response: Response, cookie: String) -> ApiResult<Response> {
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("Invalid cookie header: {}", e)))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

/// Session middleware
///
/// Rejects requests without a valid, unexpired session cookie with 401.
/// Applied to protected routes only.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = cookie_value(request.headers(), SESSION_COOKIE).ok_or_else(|| {
        debug!(uri = %request.uri(), "Request without session cookie");
        ApiError::Unauthorized
    })?;

    let user = access::authenticate(token, &state.session_secret, time::now()).ok_or_else(|| {
        warn!(uri = %request.uri(), "Invalid or expired session token");
        ApiError::Unauthorized
    })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// POST /api/auth/login
///
/// Unknown emails get 401.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Response> {
    let email = body.email.trim();
    let Some(user) = state.users.find(email).await else {
        warn!(email = %email, "Login for unknown user");
        return Err(ApiError::Unauthorized);
    };

    let token = access::issue_token(&user, &state.session_secret, time::now());
    info!(email = %user.email, role = ?user.role, "User logged in");

    let response = Json(UserResponse { user }).into_response();
    with_cookie(response, session_cookie(Some(&token), state.secure_cookies))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>) -> ApiResult<Response> {
    let response = Json(json!({ "success": true })).into_response();
    with_cookie(response, session_cookie(None, state.secure_cookies))
}

/// GET /api/auth/me
pub async fn me(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(UserResponse { user })
}
