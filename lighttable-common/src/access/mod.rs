//! Users, sessions and start-path confinement
//!
//! - [`users`]: the static JSON user directory
//! - [`token`]: signed session tokens (HS256 JWT)
//! - [`authorize`]: per-user start-path restriction
//!
//! Like the rest of this crate these are plain functions and types with no
//! HTTP framework dependency; the service wraps them in middleware.

pub mod token;
pub mod users;

use crate::metadata::Actor;
use crate::paths;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use token::{authenticate, issue_token, verify_token, SessionClaims, TokenError, SESSION_TTL_SECS};
pub use users::UserDirectory;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    /// Manage the user directory and browse the full folder tree
    pub fn can_administer(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Create folders and delete entries
    pub fn can_modify_tree(self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

/// Entry of the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Root restriction and default landing folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_path: Option<String>,
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Actor::new(user.name.clone(), user.email.clone())
    }
}

/// Outcome of a path authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

impl Access {
    pub fn is_allowed(self) -> bool {
        self == Access::Allow
    }
}

/// How far a user's start path confines them
enum Confinement {
    Unrestricted,
    Within(String),
    /// Start path is set but malformed; nothing is reachable
    Invalid,
}

fn confinement(user: &User) -> Confinement {
    let Some(raw) = user.start_path.as_deref() else {
        return Confinement::Unrestricted;
    };
    match paths::normalize(raw) {
        Ok(start) if start.is_empty() => Confinement::Unrestricted,
        Ok(start) => Confinement::Within(start),
        Err(_) => Confinement::Invalid,
    }
}

/// Check `requested` against the user's start path
///
/// The requested path must be the start path itself or lie beneath it at a
/// `/` boundary: with start path `ProjectA`, `ProjectA` and `ProjectA/Sub`
/// are allowed but `ProjectAX` is denied. Unrestricted users are always
/// allowed. Paths that fail normalization are denied, and so is everything
/// for a user whose start path itself fails normalization.
pub fn authorize(user: &User, requested: &str) -> Access {
    let start = match confinement(user) {
        Confinement::Unrestricted => return Access::Allow,
        Confinement::Invalid => {
            warn!(email = %user.email, "Malformed start path, denying access");
            return Access::Deny;
        }
        Confinement::Within(start) => start,
    };
    let Ok(requested) = paths::normalize(requested) else {
        return Access::Deny;
    };

    let within = match requested.strip_prefix(start.as_str()) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    };
    if within {
        Access::Allow
    } else {
        Access::Deny
    }
}

/// Path to browse when the client asked for `requested`
///
/// An empty request lands restricted users on their start path.
pub fn effective_path(user: &User, requested: &str) -> String {
    let requested = requested.trim_matches('/');
    if !requested.is_empty() {
        return requested.to_string();
    }
    match confinement(user) {
        Confinement::Within(start) => start,
        Confinement::Unrestricted | Confinement::Invalid => String::new(),
    }
}
