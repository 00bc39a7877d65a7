//! Email confirmation tokens.
//!
//! [`HmacIdentityTokenProvider`] binds a token to the account's id, email
//! and confirmation state. Flipping `email_confirmed` changes the MAC input,
//! so a token can never be verified twice.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use clientele_core::models::account::Account;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

const PURPOSE: &[u8] = b"email-confirmation";
const EXPIRY_LEN: usize = 8;
const MAC_LEN: usize = 32;

/// Produces and checks single-use confirmation tokens for an account.
pub trait IdentityTokenProvider: Send + Sync {
    fn generate(&self, account: &Account) -> Result<String, AuthError>;
    fn verify(&self, account: &Account, token: &str) -> bool;
}

#[derive(Clone)]
pub struct HmacIdentityTokenProvider {
    secret: Vec<u8>,
    lifetime: Duration,
}

impl HmacIdentityTokenProvider {
    pub fn new(secret: impl Into<Vec<u8>>, lifetime: Duration) -> Self {
        Self {
            secret: secret.into(),
            lifetime,
        }
    }

    fn mac(&self, account: &Account, expires_at: i64) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::Crypto(format!("hmac key: {e}")))?;
        mac.update(PURPOSE);
        mac.update(account.id.as_bytes());
        mac.update(account.email.as_bytes());
        mac.update(&[u8::from(account.email_confirmed)]);
        mac.update(&expires_at.to_be_bytes());
        Ok(mac)
    }
}

impl IdentityTokenProvider for HmacIdentityTokenProvider {
    fn generate(&self, account: &Account) -> Result<String, AuthError> {
        let expires_at = (Utc::now() + self.lifetime).timestamp();
        let tag = self.mac(account, expires_at)?.finalize().into_bytes();

        let mut raw = Vec::with_capacity(EXPIRY_LEN + MAC_LEN);
        raw.extend_from_slice(&expires_at.to_be_bytes());
        raw.extend_from_slice(&tag);
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    fn verify(&self, account: &Account, token: &str) -> bool {
        let Ok(raw) = URL_SAFE_NO_PAD.decode(token) else {
            return false;
        };
        if raw.len() != EXPIRY_LEN + MAC_LEN {
            return false;
        }
        let (expiry, tag) = raw.split_at(EXPIRY_LEN);
        let Ok(expiry) = <[u8; EXPIRY_LEN]>::try_from(expiry) else {
            return false;
        };
        let expires_at = i64::from_be_bytes(expiry);
        if expires_at <= Utc::now().timestamp() {
            return false;
        }
        match self.mac(account, expires_at) {
            Ok(mac) => mac.verify_slice(tag).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn account() -> Account {
        let now = Utc::now();
        Account {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "amy@acme.test".into(),
            password_hash: String::new(),
            first_name: "Amy".into(),
            last_name: "Lee".into(),
            email_confirmed: false,
            roles: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    fn provider() -> HmacIdentityTokenProvider {
        HmacIdentityTokenProvider::new("confirmation-secret", Duration::hours(24))
    }

    #[test]
    fn generated_token_verifies() {
        let account = account();
        let token = provider().generate(&account).unwrap();
        assert!(provider().verify(&account, &token));
    }

    #[test]
    fn token_is_bound_to_account() {
        let token = provider().generate(&account()).unwrap();
        assert!(!provider().verify(&account(), &token));
    }

    #[test]
    fn token_dies_once_confirmed() {
        let mut account = account();
        let token = provider().generate(&account).unwrap();
        account.email_confirmed = true;
        assert!(!provider().verify(&account, &token));
    }

    #[test]
    fn expired_token_is_rejected() {
        let account = account();
        let short = HmacIdentityTokenProvider::new("confirmation-secret", Duration::seconds(-1));
        let token = short.generate(&account).unwrap();
        assert!(!provider().verify(&account, &token));
    }

    #[test]
    fn other_secret_is_rejected() {
        let account = account();
        let token = provider().generate(&account).unwrap();
        let other = HmacIdentityTokenProvider::new("other-secret", Duration::hours(24));
        assert!(!other.verify(&account, &token));
    }

    #[test]
    fn garbage_is_rejected() {
        let account = account();
        assert!(!provider().verify(&account, ""));
        assert!(!provider().verify(&account, "not base64 !!"));
        assert!(!provider().verify(&account, &URL_SAFE_NO_PAD.encode([0u8; 12])));
    }
}
