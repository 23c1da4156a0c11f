//! Client Error Types

/// Errors surfaced by the API client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with an error envelope
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Token refresh failed; all session state has been cleared and the
    /// caller must return to the login entry point
    #[error("session expired")]
    SessionExpired,

    /// The replayed request was rejected again after a successful refresh
    #[error("unauthorized after token refresh")]
    Unauthorized,

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("task not found")]
    TaskNotFound,

    #[error("session storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("malformed payload: {0}")]
    Decode(#[from] serde_json::Error),
}
