//! API Error Types
//!
//! Centralized error handling for all endpoints. Every error renders the
//! wire envelope `{"success": false, "error": ...}` with the matching
//! HTTP status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(validator::ValidationErrors),

    #[error("User already exists with this email")]
    EmailExists,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired refresh token")]
    InvalidToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::EmailExists => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::InvalidToken | ApiError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Config(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            // Validation errors surface field-level detail to the caller.
            ApiError::Validation(errors) => {
                let details: Vec<_> = errors
                    .field_errors()
                    .iter()
                    .flat_map(|(field, errs)| {
                        errs.iter().map(move |e| {
                            json!({
                                "field": field,
                                "message": e
                                    .message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| "Invalid value".to_string()),
                            })
                        })
                    })
                    .collect();

                json!({
                    "success": false,
                    "error": "Validation failed",
                    "errors": details,
                })
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "internal server error");
                if production_mode() {
                    json!({
                        "success": false,
                        "error": "Internal server error",
                    })
                } else {
                    json!({
                        "success": false,
                        "error": "Internal server error",
                        "stack": detail,
                    })
                }
            }
            ApiError::Config(detail) => {
                tracing::error!(detail = %detail, "configuration error");
                json!({
                    "success": false,
                    "error": "Internal server error",
                })
            }
            other => json!({
                "success": false,
                "error": other.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(err: argon2::password_hash::Error) -> Self {
        tracing::error!("password hashing error: {:?}", err);
        ApiError::Internal("password hashing failed".to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        tracing::debug!("JWT error: {:?}", err);
        ApiError::InvalidToken
    }
}

fn production_mode() -> bool {
    std::env::var("APP_ENV")
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false)
}
