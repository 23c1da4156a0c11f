//! Durable Session Storage
//!
//! Persists the session as one JSON document with the fixed keys
//! `accessToken`, `refreshToken`, and `user`, surviving process restarts.

use crate::error::ClientError;
use crate::models::User;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// On-disk session document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(rename = "accessToken")]
    pub access_token: Option<String>,
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

/// File-backed session store
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the persisted session, tolerating a missing or corrupt file
    pub fn load(&self) -> Option<PersistedSession> {
        let raw = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), "discarding corrupt session file: {err}");
                None
            }
        }
    }

    /// Write the session document
    pub fn save(&self, session: &PersistedSession) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(session)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Remove the session document; a missing file is fine
    pub fn clear(&self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), "failed to clear session file: {err}");
            }
        }
    }
}
