//! Server Configuration
//!
//! All configuration values are loaded from environment variables.
//! No hardcoded secrets or sensitive data.

use crate::error::ApiError;
use std::env;

/// Server configuration loaded from environment
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address to bind (from BIND_ADDR env var)
    pub bind_addr: String,

    /// Secret for signing access tokens (from ACCESS_TOKEN_SECRET env var)
    pub access_token_secret: String,

    /// Secret for signing refresh tokens (from REFRESH_TOKEN_SECRET env var)
    pub refresh_token_secret: String,

    /// Access token expiration in seconds (from ACCESS_TOKEN_EXPIRATION env var)
    pub access_token_expiration: i64,

    /// Refresh token expiration in seconds (from REFRESH_TOKEN_EXPIRATION env var)
    pub refresh_token_expiration: i64,

    /// Allowed browser origin for CORS (from FRONTEND_URL env var)
    pub frontend_origin: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Panics
    /// Panics if ACCESS_TOKEN_SECRET or REFRESH_TOKEN_SECRET is not set
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5000".to_string()),

            access_token_secret: env::var("ACCESS_TOKEN_SECRET")
                .expect("ACCESS_TOKEN_SECRET environment variable must be set"),

            refresh_token_secret: env::var("REFRESH_TOKEN_SECRET")
                .expect("REFRESH_TOKEN_SECRET environment variable must be set"),

            access_token_expiration: env::var("ACCESS_TOKEN_EXPIRATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(900), // 15 minutes default

            refresh_token_expiration: env::var("REFRESH_TOKEN_EXPIRATION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(604800), // 7 days default

            frontend_origin: env::var("FRONTEND_URL").ok(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.access_token_secret.len() < 32 {
            return Err(ApiError::Config(
                "ACCESS_TOKEN_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.refresh_token_secret.len() < 32 {
            return Err(ApiError::Config(
                "REFRESH_TOKEN_SECRET must be at least 32 characters".to_string(),
            ));
        }

        if self.access_token_secret == self.refresh_token_secret {
            return Err(ApiError::Config(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".to_string(),
            ));
        }

        if self.access_token_expiration <= 0 {
            return Err(ApiError::Config(
                "ACCESS_TOKEN_EXPIRATION must be positive".to_string(),
            ));
        }

        if self.refresh_token_expiration <= self.access_token_expiration {
            return Err(ApiError::Config(
                "REFRESH_TOKEN_EXPIRATION must be greater than ACCESS_TOKEN_EXPIRATION"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            access_token_secret: "a".repeat(32),
            refresh_token_secret: "b".repeat(32),
            access_token_expiration: 900,
            refresh_token_expiration: 604800,
            frontend_origin: None,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_config_validation_short_secret() {
        let config = Config {
            access_token_secret: "short".to_string(),
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_shared_secret() {
        let config = Config {
            refresh_token_secret: "a".repeat(32),
            ..base_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_refresh_shorter_than_access() {
        let config = Config {
            refresh_token_expiration: 600,
            ..base_config()
        };
        assert!(config.validate().is_err());
    }
}
