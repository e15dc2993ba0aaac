//! Static JSON user directory
//!
//! The directory is a single file:
//!
//! ```json
//! { "users": [ { "email": "a@x.com", "name": "Ana", "role": "admin", "startPath": "ProjectA" } ] }
//! ```
//!
//! It is read wholesale on every lookup and rewritten wholesale on every
//! admin edit. Emails are matched case-insensitively.

use super::User;
use crate::metadata::store::replace_file;
use crate::{paths, Error, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// On-disk shape of the user directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersFile {
    #[serde(default)]
    pub users: Vec<User>,
}

/// Handle on the user directory file
#[derive(Debug, Clone)]
pub struct UserDirectory {
    path: PathBuf,
}

fn same_email(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Validate and normalize a user record before it is stored
fn validate(mut user: User) -> Result<User> {
    user.email = user.email.trim().to_string();
    user.name = user.name.trim().to_string();
    if user.email.is_empty() || !user.email.contains('@') {
        return Err(Error::InvalidInput(format!("Invalid email: {:?}", user.email)));
    }
    if user.name.is_empty() {
        return Err(Error::InvalidInput("Name is required".to_string()));
    }
    user.start_path = match user.start_path.as_deref() {
        Some(start) => Some(paths::normalize(start)?).filter(|s| !s.is_empty()),
        None => None,
    };
    Ok(user)
}

impl UserDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the whole file; a missing file is an empty directory
    pub async fn load(&self) -> Result<UsersFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(UsersFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, file: &UsersFile) -> Result<()> {
        let content = serde_json::to_string_pretty(file)?;
        replace_file(&self.path, content.as_bytes()).await
    }

    /// All users; an unreadable directory lists as empty
    pub async fn list(&self) -> Vec<User> {
        match self.load().await {
            Ok(file) => file.users,
            Err(e) => {
                error!("Error reading users from {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Look a user up by email
    pub async fn find(&self, email: &str) -> Option<User> {
        self.list()
            .await
            .into_iter()
            .find(|u| same_email(&u.email, email))
    }

    /// Add a user; [`Error::Conflict`] if the email is taken
    pub async fn create(&self, user: User) -> Result<User> {
        let user = validate(user)?;
        let mut file = self.load().await?;
        if file.users.iter().any(|u| same_email(&u.email, &user.email)) {
            return Err(Error::Conflict(format!("User already exists: {}", user.email)));
        }
        file.users.push(user.clone());
        self.save(&file).await?;
        info!(email = %user.email, role = ?user.role, "User created");
        Ok(user)
    }

    /// Replace the user currently stored under `original_email`
    pub async fn update(&self, original_email: &str, user: User) -> Result<User> {
        let user = validate(user)?;
        let mut file = self.load().await?;

        let index = file
            .users
            .iter()
            .position(|u| same_email(&u.email, original_email))
            .ok_or_else(|| Error::NotFound(format!("User not found: {}", original_email)))?;

        let email_taken = file
            .users
            .iter()
            .enumerate()
            .any(|(i, u)| i != index && same_email(&u.email, &user.email));
        if email_taken {
            return Err(Error::Conflict(format!("User already exists: {}", user.email)));
        }

        file.users[index] = user.clone();
        self.save(&file).await?;
        info!(email = %user.email, "User updated");
        Ok(user)
    }

    /// Remove a user; returns whether one was removed
    pub async fn delete(&self, email: &str) -> Result<bool> {
        let mut file = self.load().await?;
        let before = file.users.len();
        file.users.retain(|u| !same_email(&u.email, email));
        let removed = file.users.len() != before;
        if removed {
            self.save(&file).await?;
            info!(email = %email, "User deleted");
        }
        Ok(removed)
    }
}
