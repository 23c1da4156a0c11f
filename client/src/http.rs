//! API Client
//!
//! HTTP layer over the Tasklane REST API. Every authenticated request
//! carries the bearer access token; a 401 triggers at most one refresh
//! (shared across concurrent callers through the session manager's gate)
//! and one replay. A second 401 after the replay is a final auth failure.

use crate::error::ClientError;
use crate::models::{
    AuthData, Envelope, NewTask, ProfileData, StatsData, Task, TaskListData, TaskQuery, User,
};
use crate::session::SessionManager;
use crate::storage::SessionStore;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base, e.g. `http://localhost:5000/api`
    pub base_url: String,
    /// Bounded per-request timeout
    pub timeout: Duration,
    /// Durable session file location
    pub storage_path: PathBuf,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, storage_path: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
            storage_path: storage_path.into(),
        }
    }
}

/// Tasklane API client
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let session = Arc::new(SessionManager::new(SessionStore::new(config.storage_path)));

        Ok(Self {
            http,
            base_url: config.base_url,
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    // ============================================
    // Auth Operations
    // ============================================

    /// Register and start an authenticated session
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ClientError> {
        let response = self
            .http
            .post(format!("{}/auth/register", self.base_url))
            .json(&json!({ "name": name, "email": email, "password": password }))
            .send()
            .await?;

        let auth: AuthData = decode(parse_envelope(response).await?)?;
        self.session
            .set_session(auth.user.clone(), auth.access_token, auth.refresh_token)
            .await?;
        Ok(auth.user)
    }

    /// Log in and start an authenticated session
    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let response = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        let auth: AuthData = decode(parse_envelope(response).await?)?;
        self.session
            .set_session(auth.user.clone(), auth.access_token, auth.refresh_token)
            .await?;
        Ok(auth.user)
    }

    /// Log out: best-effort server revocation, then local clearing.
    ///
    /// A network failure never blocks the local state from clearing.
    pub async fn logout(&self) {
        let access = self.session.access_token().await;
        let refresh = self.session.refresh_token().await;

        if let (Some(access), Some(refresh)) = (access, refresh) {
            let result = self
                .http
                .post(format!("{}/auth/logout", self.base_url))
                .bearer_auth(&access)
                .json(&json!({ "refreshToken": refresh }))
                .send()
                .await;
            if let Err(err) = result {
                tracing::debug!("server logout failed, clearing locally anyway: {err}");
            }
        }

        self.session.clear().await;
    }

    /// Fetch the profile for the current session
    pub async fn profile(&self) -> Result<User, ClientError> {
        let data: ProfileData = self.request(Method::GET, "/auth/profile", &[], None).await?;
        Ok(data.user)
    }

    /// Restore a persisted session on startup by validating it against
    /// the profile endpoint; an unusable session is cleared.
    pub async fn bootstrap(&self) -> Option<User> {
        self.session.access_token().await?;

        match self.profile().await {
            Ok(user) => {
                if let Err(err) = self.session.set_user(user.clone()).await {
                    tracing::warn!("failed to persist restored user: {err}");
                }
                Some(user)
            }
            Err(err) => {
                tracing::debug!("stored session is unusable: {err}");
                self.session.clear().await;
                None
            }
        }
    }

    // ============================================
    // Task Operations
    // ============================================

    pub async fn list_tasks(&self, query: &TaskQuery) -> Result<TaskListData, ClientError> {
        self.request(Method::GET, "/tasks", &query.to_params(), None)
            .await
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Task, ClientError> {
        self.request(Method::GET, &format!("/tasks/{id}"), &[], None)
            .await
    }

    pub async fn create_task(&self, task: &NewTask) -> Result<Task, ClientError> {
        let body = serde_json::to_value(task)?;
        self.request(Method::POST, "/tasks", &[], Some(body)).await
    }

    /// Send a full merged task record; see the sync engine for the merge
    pub async fn update_task(&self, id: Uuid, payload: Value) -> Result<Task, ClientError> {
        self.request(Method::PUT, &format!("/tasks/{id}"), &[], Some(payload))
            .await
    }

    pub async fn delete_task(&self, id: Uuid) -> Result<(), ClientError> {
        let _: Value = self
            .request(Method::DELETE, &format!("/tasks/{id}"), &[], None)
            .await?;
        Ok(())
    }

    pub async fn update_position(
        &self,
        id: Uuid,
        position: i64,
        status: crate::models::TaskStatus,
    ) -> Result<Task, ClientError> {
        self.request(
            Method::PATCH,
            &format!("/tasks/{id}/position"),
            &[],
            Some(json!({ "position": position, "status": status })),
        )
        .await
    }

    pub async fn update_time(&self, id: Uuid, actual_time: u32) -> Result<Task, ClientError> {
        self.request(
            Method::PATCH,
            &format!("/tasks/{id}/time"),
            &[],
            Some(json!({ "actualTime": actual_time })),
        )
        .await
    }

    pub async fn stats(&self) -> Result<StatsData, ClientError> {
        self.request(Method::GET, "/tasks/stats/summary", &[], None)
            .await
    }

    // ============================================
    // Request Pipeline
    // ============================================

    /// Issue an authenticated request, refreshing and replaying once on 401
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let seen_epoch = self.session.epoch().await;
        let token = self.session.access_token().await;

        let response = self
            .execute(method.clone(), path, query, body.as_ref(), token.as_deref())
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED && token.is_some() {
            let replay_token = self
                .session
                .recover_unauthorized(&self.http, &self.base_url, seen_epoch)
                .await?;

            let response = self
                .execute(method, path, query, body.as_ref(), Some(&replay_token))
                .await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(ClientError::Unauthorized);
            }
            return decode(parse_envelope(response).await?);
        }

        decode(parse_envelope(response).await?)
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }
}

/// Unwrap the response envelope, mapping error envelopes to [`ClientError::Api`]
pub(crate) async fn parse_envelope(response: reqwest::Response) -> Result<Value, ClientError> {
    let status = response.status();
    let envelope: Envelope = response.json().await?;

    if status.is_success() && envelope.success {
        Ok(envelope.data.unwrap_or(Value::Null))
    } else {
        Err(ClientError::Api {
            status: status.as_u16(),
            message: envelope
                .error
                .or(envelope.message)
                .unwrap_or_else(|| "Request failed".to_string()),
        })
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    Ok(serde_json::from_value(value)?)
}
