//! Request Extractors
//!
//! The authenticated-user extractor reads the identity attached by
//! [`crate::auth::middleware::require_auth`]; handlers behind that
//! middleware receive it infallibly, anything else gets a generic 401.

use crate::error::ApiError;
use crate::models::User;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Identity resolved by the authentication middleware
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(ApiError::Unauthorized)
    }
}
