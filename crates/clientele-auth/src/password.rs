//! Password hashing, verification and policy using Argon2id.

use std::sync::OnceLock;

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};

use crate::error::AuthError;

fn peppered<'a>(password: &'a str, pepper: Option<&str>, buf: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            *buf = format!("{p}{password}");
            buf.as_bytes()
        }
        None => password.as_bytes(),
    }
}

/// Hash a password with Argon2id using OWASP-recommended parameters
/// (m=19 MiB, t=2, p=1). The salt is random per call.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, AuthError> {
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| AuthError::Crypto(format!("argon2 params: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(input, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Crypto(format!("password hash: {e}")))
}

/// Verify a plaintext password against an Argon2id PHC-format hash.
///
/// Returns `Ok(false)` on mismatch and `Err(AuthError::Crypto)` if the
/// stored hash is malformed.
pub fn verify_password(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| AuthError::Crypto(format!("invalid hash format: {e}")))?;

    match Argon2::default().verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::Crypto(format!("verify error: {e}"))),
    }
}

/// Burn the same Argon2 work as a real verification.
///
/// Called when a login names an unknown email so that the response time
/// does not reveal whether the account exists.
pub fn verify_against_dummy(password: &str, pepper: Option<&str>) {
    static DUMMY_HASH: OnceLock<Option<String>> = OnceLock::new();
    let dummy = DUMMY_HASH.get_or_init(|| hash_password("dummy-password-never-matches", None).ok());
    if let Some(hash) = dummy {
        let _ = verify_password(password, hash, pepper);
    }
}

/// Argon2 holds a core for tens of milliseconds, so request paths hand it
/// to tokio's blocking pool instead of running it on a runtime worker.
async fn off_thread<T, F>(work: F) -> Result<T, AuthError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AuthError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AuthError::Crypto(format!("password task failed: {e}")))?
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_off_thread(
    password: &str,
    pepper: Option<&str>,
) -> Result<String, AuthError> {
    let password = password.to_owned();
    let pepper = pepper.map(str::to_owned);
    off_thread(move || hash_password(&password, pepper.as_deref())).await
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_off_thread(
    password: &str,
    hash: &str,
    pepper: Option<&str>,
) -> Result<bool, AuthError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    let pepper = pepper.map(str::to_owned);
    off_thread(move || verify_password(&password, &hash, pepper.as_deref())).await
}

/// [`verify_against_dummy`] on the blocking pool.
pub async fn verify_against_dummy_off_thread(password: &str, pepper: Option<&str>) {
    let password = password.to_owned();
    let pepper = pepper.map(str::to_owned);
    let dummy = off_thread(move || {
        verify_against_dummy(&password, pepper.as_deref());
        Ok(())
    });
    if let Err(e) = dummy.await {
        tracing::warn!(error = %e, "dummy password verification failed");
    }
}

/// List every policy rule the password breaks. Empty means acceptable.
pub fn policy_violations(password: &str, min_length: usize) -> Vec<String> {
    let mut violations = Vec::new();
    if password.chars().count() < min_length {
        violations.push(format!("password must be at least {min_length} characters"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        violations.push("password must contain a digit".into());
    }
    if !password.chars().any(char::is_lowercase) {
        violations.push("password must contain a lowercase letter".into());
    }
    if !password.chars().any(char::is_uppercase) {
        violations.push("password must contain an uppercase letter".into());
    }
    if password.chars().all(char::is_alphanumeric) {
        violations.push("password must contain a non-alphanumeric character".into());
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_matches() {
        let hash = hash_password("Hunter2!", None).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Hunter2!", &hash, None).unwrap());
    }

    #[test]
    fn wrong_password_does_not_match() {
        let hash = hash_password("Hunter2!", None).unwrap();
        assert!(!verify_password("wrong", &hash, None).unwrap());
    }

    #[test]
    fn pepper_is_applied() {
        let hash = hash_password("Hunter2!", Some("pepper!")).unwrap();
        assert!(verify_password("Hunter2!", &hash, Some("pepper!")).unwrap());
        assert!(!verify_password("Hunter2!", &hash, None).unwrap());
    }

    #[tokio::test]
    async fn blocking_pool_variants_agree_with_sync_ones() {
        let hash = hash_password_off_thread("Hunter2!", Some("pepper!"))
            .await
            .unwrap();
        assert!(verify_password("Hunter2!", &hash, Some("pepper!")).unwrap());
        assert!(
            verify_password_off_thread("Hunter2!", &hash, Some("pepper!"))
                .await
                .unwrap()
        );
        assert!(
            !verify_password_off_thread("Hunter3!", &hash, Some("pepper!"))
                .await
                .unwrap()
        );
        verify_against_dummy_off_thread("anything", None).await;
    }

    #[test]
    fn malformed_hash_returns_error() {
        assert!(verify_password("pw", "not-a-hash", None).is_err());
    }

    #[test]
    fn strong_password_passes_policy() {
        assert!(policy_violations("Pw123456!", 6).is_empty());
    }

    #[test]
    fn weak_password_lists_every_rule() {
        let violations = policy_violations("abc", 6);
        assert_eq!(violations.len(), 4);
        assert!(violations.iter().any(|v| v.contains("at least 6")));
        assert!(violations.iter().any(|v| v.contains("digit")));
        assert!(violations.iter().any(|v| v.contains("uppercase")));
        assert!(violations.iter().any(|v| v.contains("non-alphanumeric")));
    }
}
