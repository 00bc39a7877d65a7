//! HS256 access tokens and opaque, single-use refresh tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use clientele_core::models::account::Account;
use clientele_core::models::refresh_token::{RefreshTokenRecord, Redemption};
use clientele_core::repository::RefreshTokenStore;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::AuthError;

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

/// Raw refresh token entropy (512 bits).
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// JWT claims embedded in every access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Account ID (UUID string).
    pub sub: String,
    /// Owning tenant ID (UUID string).
    pub tenant_id: String,
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
    /// Unique token ID (UUID string).
    pub jti: String,
}

/// What a successful login or refresh hands back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Seconds until the access token expires.
    pub expires_in: i64,
}

/// Signs access tokens and manages refresh tokens in a [`RefreshTokenStore`].
#[derive(Clone)]
pub struct TokenIssuer<R> {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    config: AuthConfig,
    store: R,
}

impl<R: RefreshTokenStore> TokenIssuer<R> {
    /// Fails with `SigningKeyMisconfigured` when the secret is too short.
    pub fn new(config: &AuthConfig, store: R) -> Result<Self, AuthError> {
        config.validate()?;
        let secret = config.jwt_secret.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            config: config.clone(),
            store,
        })
    }

    /// Issue a fresh access token and store a new refresh token for `account`.
    pub async fn issue(&self, account: &Account) -> Result<TokenBundle, AuthError> {
        let now = Utc::now();
        let exp = (now + self.config.access_token_lifetime()).timestamp();
        let claims = AccessTokenClaims {
            sub: account.id.to_string(),
            tenant_id: account.tenant_id.to_string(),
            roles: account.roles.clone(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            iat: now.timestamp(),
            exp,
            jti: Uuid::new_v4().to_string(),
        };

        let access_token =
            jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
                .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))?;

        let refresh_token = generate_refresh_token();
        let record = RefreshTokenRecord {
            account_id: account.id,
            issued_at: now,
            expires_at: now + self.config.refresh_token_lifetime(),
        };
        self.store
            .put(&hash_refresh_token(&refresh_token), record)
            .await?;

        Ok(TokenBundle {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER,
            expires_in: (exp - Utc::now().timestamp()).max(0),
        })
    }

    /// Verify signature, issuer, audience and expiry with no leeway.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.config.jwt_issuer]);
        validation.set_audience(&[&self.config.jwt_audience]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

        jsonwebtoken::decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::TokenInvalid(e.to_string()))
    }

    /// Consume a refresh token. The token is dead afterwards whatever the
    /// outcome.
    pub async fn redeem(&self, raw: &str) -> Result<Uuid, AuthError> {
        match self.store.redeem(&hash_refresh_token(raw)).await? {
            Redemption::Redeemed(account_id) => Ok(account_id),
            Redemption::Expired => {
                tracing::debug!("expired refresh token presented");
                Err(AuthError::InvalidOrExpiredRefreshToken)
            }
            Redemption::Unknown => Err(AuthError::InvalidOrExpiredRefreshToken),
        }
    }

    /// Drop a refresh token regardless of expiry. Returns whether it existed.
    pub async fn revoke(&self, raw: &str) -> Result<bool, AuthError> {
        Ok(self.store.revoke(&hash_refresh_token(raw)).await?)
    }
}

/// Generate a cryptographically random opaque refresh token
/// (64 bytes, base64url-encoded without padding).
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw refresh token, hex-encoded. Stores key on this.
pub fn hash_refresh_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
