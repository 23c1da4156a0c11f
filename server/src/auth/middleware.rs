//! Request Authentication Middleware
//!
//! Validates the bearer access token on every protected request, resolves
//! the user it names, and attaches the identity to the request context.
//! Downstream handlers trust the attached identity.

use crate::extractors::CurrentUser;
use crate::Services;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Require an authenticated user
///
/// Any failure (missing header, bad signature, expired token, or a user
/// id that no longer resolves) yields the same generic 401.
pub async fn require_auth(
    State(services): State<Arc<Services>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let user = services
        .auth
        .authenticate_bearer(auth_header)
        .await
        .map_err(axum::response::IntoResponse::into_response)?;

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}
