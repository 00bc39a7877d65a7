//! Authentication configuration.

use std::fmt;

use chrono::Duration;
use serde::Deserialize;

use crate::error::AuthError;

/// Minimum HS256 signing secret length (256 bits).
pub const MIN_JWT_SECRET_BYTES: usize = 32;

/// Configuration for the authentication service.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HS256 secret; at least [`MIN_JWT_SECRET_BYTES`] bytes.
    pub jwt_secret: String,
    /// JWT issuer (`iss` claim).
    pub jwt_issuer: String,
    /// JWT audience (`aud` claim).
    pub jwt_audience: String,
    /// Access token lifetime in hours (default: 1).
    pub access_token_lifetime_hours: u64,
    /// Refresh token lifetime in days (default: 7).
    pub refresh_token_lifetime_days: u64,
    /// Optional pepper prepended to passwords before Argon2id hashing.
    pub pepper: Option<String>,
    /// Minimum password length for policy enforcement (default: 6).
    pub min_password_length: usize,
    /// Lifetime of email confirmation tokens in hours (default: 24).
    pub confirmation_token_lifetime_hours: u64,
    /// Base URL used when building confirmation links.
    pub public_base_url: String,
    /// Product name shown in outgoing email.
    pub product_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: "clientele".into(),
            jwt_audience: "clientele".into(),
            access_token_lifetime_hours: 1,
            refresh_token_lifetime_days: 7,
            pepper: None,
            min_password_length: 6,
            confirmation_token_lifetime_hours: 24,
            public_base_url: "http://localhost:8080".into(),
            product_name: "CRM".into(),
        }
    }
}

impl AuthConfig {
    /// Reject configurations that must never reach a running service.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_BYTES {
            return Err(AuthError::SigningKeyMisconfigured);
        }
        Ok(())
    }

    pub fn access_token_lifetime(&self) -> Duration {
        Duration::hours(self.access_token_lifetime_hours as i64)
    }

    pub fn refresh_token_lifetime(&self) -> Duration {
        Duration::days(self.refresh_token_lifetime_days as i64)
    }

    pub fn confirmation_token_lifetime(&self) -> Duration {
        Duration::hours(self.confirmation_token_lifetime_hours as i64)
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field(
                "access_token_lifetime_hours",
                &self.access_token_lifetime_hours,
            )
            .field(
                "refresh_token_lifetime_days",
                &self.refresh_token_lifetime_days,
            )
            .field("pepper", &self.pepper.as_ref().map(|_| "<redacted>"))
            .field("min_password_length", &self.min_password_length)
            .field(
                "confirmation_token_lifetime_hours",
                &self.confirmation_token_lifetime_hours,
            )
            .field("public_base_url", &self.public_base_url)
            .field("product_name", &self.product_name)
            .finish()
    }
}
