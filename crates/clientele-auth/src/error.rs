//! Authentication error types.
//!
//! Every variant has a stable [`code`](AuthError::code) that transport
//! layers hand to clients. Internal failures collapse to `ServerError`;
//! an orphaned tenant is reported to clients as a plain
//! `UserCreationFailed`.

use clientele_core::error::CoreError;
use thiserror::Error;
use uuid::Uuid;

use crate::config::MIN_JWT_SECRET_BYTES;

/// Generic message for account-creation failures that are not the
/// client's fault.
pub const ACCOUNT_NOT_CREATED: &str = "account could not be created";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("an account with this email already exists")]
    DuplicateEmail,

    #[error("{reason}")]
    UserCreationFailed { reason: String },

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("email address has not been confirmed")]
    EmailNotConfirmed,

    #[error("invalid or expired refresh token")]
    InvalidOrExpiredRefreshToken,

    #[error("user not found")]
    UserNotFound,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("tenant {tenant_id} orphaned after failed account creation")]
    TenantOrphaned { tenant_id: Uuid },

    #[error("JWT signing secret must be at least {} bytes", MIN_JWT_SECRET_BYTES)]
    SigningKeyMisconfigured,

    #[error("cryptography error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl AuthError {
    /// Stable, client-visible error code.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::DuplicateEmail => "DuplicateEmail",
            AuthError::UserCreationFailed { .. } | AuthError::TenantOrphaned { .. } => {
                "UserCreationFailed"
            }
            AuthError::InvalidCredentials => "InvalidCredentials",
            AuthError::EmailNotConfirmed => "EmailNotConfirmed",
            AuthError::InvalidOrExpiredRefreshToken => "InvalidOrExpiredRefreshToken",
            AuthError::UserNotFound => "UserNotFound",
            AuthError::TokenInvalid(_) => "TokenInvalid",
            AuthError::SigningKeyMisconfigured | AuthError::Crypto(_) | AuthError::Core(_) => {
                "ServerError"
            }
        }
    }

    /// Message safe to show a client. Never carries internal detail.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::TenantOrphaned { .. } => ACCOUNT_NOT_CREATED.into(),
            AuthError::TokenInvalid(_) => "invalid token".into(),
            e if e.is_internal() => "an unexpected error occurred".into(),
            e => e.to_string(),
        }
    }

    /// Whether this is a server-side fault rather than a rejected request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::TenantOrphaned { .. }
                | AuthError::SigningKeyMisconfigured
                | AuthError::Crypto(_)
                | AuthError::Core(_)
        )
    }
}
