//! Client Session Manager
//!
//! Owns the `{user, access_token, refresh_token}` triple, mirrors it into
//! durable storage, and serializes concurrent 401 recoveries through a
//! single in-flight refresh gate. The gate is explicit state on this
//! instance; there are no module-level globals.

use crate::error::ClientError;
use crate::models::{Envelope, TokenData, User};
use crate::storage::{PersistedSession, SessionStore};

use serde_json::json;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    /// Bumped on every token change or clear. A 401 recovery records the
    /// epoch it saw before failing; if the epoch moved while it waited on
    /// the gate, another caller already refreshed and its result is reused
    /// instead of issuing a second refresh call.
    epoch: u64,
}

/// Session manager with a single-flight refresh gate
pub struct SessionManager {
    state: RwLock<SessionState>,
    refresh_gate: Mutex<()>,
    store: SessionStore,
}

impl SessionManager {
    /// Create a manager, restoring any persisted session
    pub fn new(store: SessionStore) -> Self {
        let mut state = SessionState::default();
        if let Some(persisted) = store.load() {
            state.user = persisted.user;
            state.access_token = persisted.access_token;
            state.refresh_token = persisted.refresh_token;
        }
        Self {
            state: RwLock::new(state),
            refresh_gate: Mutex::new(()),
            store,
        }
    }

    pub async fn user(&self) -> Option<User> {
        self.state.read().await.user.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.state.read().await.refresh_token.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        let state = self.state.read().await;
        state.access_token.is_some() && state.user.is_some()
    }

    pub(crate) async fn epoch(&self) -> u64 {
        self.state.read().await.epoch
    }

    /// Install a full session after login or register
    pub async fn set_session(
        &self,
        user: User,
        access_token: String,
        refresh_token: String,
    ) -> Result<(), ClientError> {
        {
            let mut state = self.state.write().await;
            state.user = Some(user);
            state.access_token = Some(access_token);
            state.refresh_token = Some(refresh_token);
            state.epoch += 1;
        }
        self.persist().await
    }

    /// Replace both tokens after a refresh, keeping the user
    pub async fn set_tokens(
        &self,
        access_token: String,
        refresh_token: String,
    ) -> Result<(), ClientError> {
        {
            let mut state = self.state.write().await;
            state.access_token = Some(access_token);
            state.refresh_token = Some(refresh_token);
            state.epoch += 1;
        }
        self.persist().await
    }

    /// Update the cached user record
    pub async fn set_user(&self, user: User) -> Result<(), ClientError> {
        {
            let mut state = self.state.write().await;
            state.user = Some(user);
        }
        self.persist().await
    }

    /// Drop all session state, in memory and on disk
    pub async fn clear(&self) {
        {
            let mut state = self.state.write().await;
            *state = SessionState {
                epoch: state.epoch + 1,
                ..SessionState::default()
            };
        }
        self.store.clear();
    }

    async fn persist(&self) -> Result<(), ClientError> {
        let session = {
            let state = self.state.read().await;
            PersistedSession {
                access_token: state.access_token.clone(),
                refresh_token: state.refresh_token.clone(),
                user: state.user.clone(),
            }
        };
        self.store.save(&session)
    }

    // ============================================
    // 401 Recovery
    // ============================================

    /// Recover from a 401 by refreshing the access token, issuing at most
    /// one network refresh call no matter how many requests failed
    /// concurrently.
    ///
    /// Returns the access token to replay with. On refresh failure every
    /// waiter gets `SessionExpired` and the session is cleared: the forced
    /// transition back to Anonymous.
    pub(crate) async fn recover_unauthorized(
        &self,
        http: &reqwest::Client,
        base_url: &str,
        seen_epoch: u64,
    ) -> Result<String, ClientError> {
        let _gate = self.refresh_gate.lock().await;

        // While this caller waited on the gate, the winner may already
        // have rotated the tokens; reuse its result.
        {
            let state = self.state.read().await;
            if state.epoch != seen_epoch {
                return state
                    .access_token
                    .clone()
                    .ok_or(ClientError::SessionExpired);
            }
        }

        let refresh_token = {
            self.state
                .read()
                .await
                .refresh_token
                .clone()
                .ok_or(ClientError::SessionExpired)?
        };

        match call_refresh(http, base_url, &refresh_token).await {
            Ok(tokens) => {
                let access = tokens.access_token.clone();
                self.set_tokens(tokens.access_token, tokens.refresh_token)
                    .await?;
                tracing::debug!("access token refreshed");
                Ok(access)
            }
            Err(err) => {
                tracing::warn!("token refresh failed, clearing session: {err}");
                self.clear().await;
                Err(ClientError::SessionExpired)
            }
        }
    }
}

/// One refresh round-trip; no auth header, never retried
async fn call_refresh(
    http: &reqwest::Client,
    base_url: &str,
    refresh_token: &str,
) -> Result<TokenData, ClientError> {
    let response = http
        .post(format!("{base_url}/auth/refresh"))
        .json(&json!({ "refreshToken": refresh_token }))
        .send()
        .await?;

    let status = response.status();
    let envelope: Envelope = response.json().await?;
    if status.is_success() && envelope.success {
        let data = envelope.data.ok_or(ClientError::SessionExpired)?;
        Ok(serde_json::from_value(data)?)
    } else {
        Err(ClientError::Api {
            status: status.as_u16(),
            message: envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| "Token refresh rejected".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn temp_store() -> SessionStore {
        let path: PathBuf =
            std::env::temp_dir().join(format!("tasklane-test-{}.json", Uuid::new_v4()));
        SessionStore::new(path)
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            role: "user".to_string(),
            avatar: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_session_persists_and_restores() {
        let store = temp_store();
        let manager = SessionManager::new(store.clone());
        assert!(!manager.is_authenticated().await);

        manager
            .set_session(user(), "access".to_string(), "refresh".to_string())
            .await
            .unwrap();
        assert!(manager.is_authenticated().await);

        // A second manager over the same store restores the session.
        let restored = SessionManager::new(store.clone());
        assert!(restored.is_authenticated().await);
        assert_eq!(restored.access_token().await.as_deref(), Some("access"));

        manager.clear().await;
        let cleared = SessionManager::new(store);
        assert!(!cleared.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_token_change_bumps_epoch() {
        let manager = SessionManager::new(temp_store());
        let before = manager.epoch().await;
        manager
            .set_tokens("a".to_string(), "r".to_string())
            .await
            .unwrap();
        assert!(manager.epoch().await > before);

        let before = manager.epoch().await;
        manager.clear().await;
        assert!(manager.epoch().await > before);
    }
}
