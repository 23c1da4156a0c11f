//! Authentication Service
//!
//! Token issuance, password hashing, and the session state machine:
//! `Anonymous -> Authenticated -> (Refreshing) -> Authenticated | Anonymous`.

use crate::config::Config;
use crate::error::ApiError;
use crate::models::{
    AccessClaims, AuthData, LoginRequest, RefreshClaims, RegisterRequest, TokenData, User,
    UserResponse,
};
use crate::store::{TokenStore, UserStore};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use uuid::Uuid;

/// Authentication service
pub struct AuthService {
    users: Arc<UserStore>,
    tokens: Arc<TokenStore>,
    access_expiration: i64,
    refresh_expiration: i64,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl AuthService {
    /// Create a new authentication service
    ///
    /// Access and refresh tokens are signed with distinct secrets so a
    /// refresh token can never pass as an access token.
    pub fn new(config: &Config, users: Arc<UserStore>, tokens: Arc<TokenStore>) -> Self {
        Self {
            users,
            tokens,
            access_expiration: config.access_token_expiration,
            refresh_expiration: config.refresh_token_expiration,
            access_encoding: EncodingKey::from_secret(config.access_token_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_token_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
        }
    }

    // ============================================
    // Password Hashing
    // ============================================

    /// Hash a password using Argon2id
    pub fn hash_password(&self, password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)?
            .to_string();
        Ok(hash)
    }

    /// Verify a password against a stored hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, ApiError> {
        let parsed_hash = PasswordHash::new(hash)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    // ============================================
    // Token Issuer
    // ============================================

    /// Issue a short-lived access token for a user
    pub fn issue_access_token(&self, user_id: Uuid) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(self.access_expiration)).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.access_encoding)?)
    }

    /// Issue a long-lived refresh token for a user
    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<(String, DateTime<Utc>), ApiError> {
        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.refresh_expiration);
        let claims = RefreshClaims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.refresh_encoding)?;
        Ok((token, expires_at))
    }

    /// Verify an access token signature and expiry
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, ApiError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &Validation::default())?;
        Ok(data.claims)
    }

    /// Verify a refresh token signature and expiry
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, ApiError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &Validation::default())?;
        Ok(data.claims)
    }

    // ============================================
    // Registration / Login
    // ============================================

    /// Register a new user and start an authenticated session
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthData, ApiError> {
        let email = req.email.to_lowercase();

        if self.users.find_by_email(&email).await.is_some() {
            return Err(ApiError::EmailExists);
        }

        let password_hash = self.hash_password(&req.password)?;
        let user = self
            .users
            .insert(User::new(req.name.trim().to_string(), email, password_hash))
            .await
            // The insert re-checks uniqueness under its write guard.
            .ok_or(ApiError::EmailExists)?;

        tracing::info!(user_id = %user.id, "user registered");

        self.open_session(&user).await
    }

    /// Authenticate credentials and start a session
    ///
    /// An unknown email and a wrong password yield the identical error so
    /// callers cannot enumerate accounts.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthData, ApiError> {
        let user = self
            .users
            .find_by_email(&req.email)
            .await
            .ok_or(ApiError::InvalidCredentials)?;

        if !self.verify_password(&req.password, &user.password_hash)? {
            return Err(ApiError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id, "user logged in");

        self.open_session(&user).await
    }

    /// Issue both tokens and persist the refresh token
    async fn open_session(&self, user: &User) -> Result<AuthData, ApiError> {
        let access_token = self.issue_access_token(user.id)?;
        let (refresh_token, expires_at) = self.issue_refresh_token(user.id)?;
        self.tokens.save(&refresh_token, user.id, expires_at).await;

        Ok(AuthData {
            user: UserResponse::from(user),
            access_token,
            refresh_token,
        })
    }

    // ============================================
    // Token Refresh / Logout
    // ============================================

    /// Rotate a refresh token and issue a fresh access token
    ///
    /// One-time-use rotation: the presented token is revoked the instant
    /// its replacement is persisted, in one atomic store mutation. A
    /// concurrent refresh with the same token has exactly one winner; the
    /// loser finds no active record and fails.
    pub async fn refresh(&self, old_refresh_token: &str) -> Result<TokenData, ApiError> {
        let claims = self.verify_refresh_token(old_refresh_token)?;

        let (new_refresh_token, expires_at) = self.issue_refresh_token(claims.sub)?;
        self.tokens
            .rotate(old_refresh_token, claims.sub, &new_refresh_token, expires_at)
            .await
            .ok_or(ApiError::InvalidToken)?;

        let access_token = self.issue_access_token(claims.sub)?;

        tracing::debug!(user_id = %claims.sub, "refresh token rotated");

        Ok(TokenData {
            access_token,
            refresh_token: new_refresh_token,
        })
    }

    /// Revoke the named refresh token; absence of the token is not an error
    pub async fn logout(&self, user_id: Uuid, refresh_token: Option<&str>) {
        if let Some(token) = refresh_token {
            self.tokens.revoke(token, user_id).await;
            tracing::debug!(user_id = %user_id, "refresh token revoked on logout");
        }
    }

    // ============================================
    // Request Authentication
    // ============================================

    /// Validate a bearer access token and resolve the user it names
    ///
    /// Every failure collapses to a generic 401; no state is mutated and
    /// no detail leaks about which step failed.
    pub async fn authenticate_bearer(&self, auth_header: Option<&str>) -> Result<User, ApiError> {
        let header = auth_header.ok_or(ApiError::Unauthorized)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let claims = self
            .verify_access_token(token)
            .map_err(|_| ApiError::Unauthorized)?;

        self.users
            .find_by_id(claims.sub)
            .await
            .ok_or(ApiError::Unauthorized)
    }
}
