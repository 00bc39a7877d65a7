//! Email/password login gated on email confirmation.

use clientele_core::models::account::{Account, normalize_email};
use clientele_core::repository::{AccountRepository, RefreshTokenStore};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AuthError;
use crate::password::{verify_against_dummy_off_thread, verify_password_off_thread};
use crate::token::{TokenBundle, TokenIssuer};

/// Public projection of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub tenant_id: Uuid,
}

impl From<&Account> for UserProfile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            tenant_id: account.tenant_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutput {
    #[serde(flatten)]
    pub tokens: TokenBundle,
    pub user: UserProfile,
}

#[derive(Clone)]
pub struct CredentialValidator<A, R> {
    accounts: A,
    issuer: TokenIssuer<R>,
    pepper: Option<String>,
}

impl<A, R> CredentialValidator<A, R>
where
    A: AccountRepository,
    R: RefreshTokenStore,
{
    pub fn new(accounts: A, issuer: TokenIssuer<R>, pepper: Option<String>) -> Self {
        Self {
            accounts,
            issuer,
            pepper,
        }
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutput, AuthError> {
        let pepper = self.pepper.as_deref();
        let account = match self.accounts.get_by_email(&normalize_email(email)).await {
            Ok(account) => account,
            Err(e) if e.is_not_found() => {
                verify_against_dummy_off_thread(password, pepper).await;
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_password_off_thread(password, &account.password_hash, pepper).await? {
            tracing::info!(account_id = %account.id, "login rejected: bad password");
            return Err(AuthError::InvalidCredentials);
        }

        if !account.email_confirmed {
            tracing::info!(account_id = %account.id, "login rejected: email not confirmed");
            return Err(AuthError::EmailNotConfirmed);
        }

        let tokens = self.issuer.issue(&account).await?;
        tracing::info!(account_id = %account.id, tenant_id = %account.tenant_id, "login succeeded");
        Ok(LoginOutput {
            tokens,
            user: UserProfile::from(&account),
        })
    }
}
