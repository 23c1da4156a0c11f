//! Authentication HTTP Handlers
//!
//! REST endpoints for register, login, refresh, logout, and profile.

use crate::error::ApiError;
use crate::extractors::CurrentUser;
use crate::models::{
    ApiResponse, LoginRequest, LogoutRequest, RefreshTokenRequest, RegisterRequest, UserResponse,
};
use crate::Services;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// POST /api/auth/register
pub async fn register(
    State(services): State<Arc<Services>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let data = services.auth.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(data, "Registration successful")),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(services): State<Arc<Services>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let data = services.auth.login(req).await?;

    Ok(Json(ApiResponse::new(data, "Login successful")))
}

/// POST /api/auth/refresh
pub async fn refresh(
    State(services): State<Arc<Services>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let data = services.auth.refresh(&req.refresh_token).await?;

    Ok(Json(ApiResponse::new(data, "Tokens refreshed")))
}

/// POST /api/auth/logout (bearer required)
pub async fn logout(
    State(services): State<Arc<Services>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    services
        .auth
        .logout(user.id, req.refresh_token.as_deref())
        .await;

    Ok(Json(ApiResponse::new(
        json!(null),
        "Logged out successfully",
    )))
}

/// GET /api/auth/profile (bearer required)
pub async fn profile(CurrentUser(user): CurrentUser) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ApiResponse::new(
        json!({ "user": UserResponse::from(&user) }),
        "Profile fetched successfully",
    )))
}
