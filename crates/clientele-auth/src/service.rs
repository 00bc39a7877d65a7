//! Authentication service: the entry point the transport layer calls.
//!
//! Generic over repository implementations so that the auth layer has
//! no dependency on the database crate.

use std::sync::Arc;

use clientele_core::repository::{AccountRepository, RefreshTokenStore, TenantRepository};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::confirmation::{ConfirmOutcome, EmailConfirmationFlow};
use crate::credentials::{CredentialValidator, LoginOutput, UserProfile};
use crate::email::EmailSender;
use crate::error::AuthError;
use crate::identity::IdentityTokenProvider;
use crate::registrar::{RegisterInput, RegisterOutput, TenantRegistrar};
use crate::token::{AccessTokenClaims, TokenBundle, TokenIssuer};

pub struct AuthService<T, A, R, P, E> {
    accounts: A,
    registrar: TenantRegistrar<T, A, P, E>,
    credentials: CredentialValidator<A, R>,
    confirmation: EmailConfirmationFlow<A, P, E>,
    issuer: TokenIssuer<R>,
}

impl<T, A, R, P, E> AuthService<T, A, R, P, E>
where
    T: TenantRepository,
    A: AccountRepository + Clone,
    R: RefreshTokenStore + Clone,
    P: IdentityTokenProvider,
    E: EmailSender + 'static,
{
    /// Fails with `SigningKeyMisconfigured` if the JWT secret is unusable.
    pub fn new(
        tenants: T,
        accounts: A,
        refresh_store: R,
        identity: P,
        email: E,
        config: AuthConfig,
    ) -> Result<Self, AuthError> {
        let issuer = TokenIssuer::new(&config, refresh_store)?;
        let confirmation = EmailConfirmationFlow::new(
            accounts.clone(),
            Arc::new(identity),
            Arc::new(email),
            &config,
        );
        let registrar = TenantRegistrar::new(
            tenants,
            accounts.clone(),
            confirmation.clone(),
            config.pepper.clone(),
            config.min_password_length,
        );
        let credentials =
            CredentialValidator::new(accounts.clone(), issuer.clone(), config.pepper.clone());

        Ok(Self {
            accounts,
            registrar,
            credentials,
            confirmation,
            issuer,
        })
    }

    #[tracing::instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<RegisterOutput, AuthError> {
        self.registrar.register(input).await
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutput, AuthError> {
        self.credentials.login(email, password).await
    }

    /// Rotate a refresh token: the presented token is consumed before a
    /// replacement is issued.
    #[tracing::instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle, AuthError> {
        let account_id = self.issuer.redeem(refresh_token).await?;
        let account = match self.accounts.get_by_id(account_id).await {
            Ok(account) => account,
            Err(e) if e.is_not_found() => {
                tracing::warn!(%account_id, "refresh token for deleted account");
                return Err(AuthError::InvalidOrExpiredRefreshToken);
            }
            Err(e) => return Err(e.into()),
        };
        self.issuer.issue(&account).await
    }

    #[tracing::instrument(skip(self, token))]
    pub async fn confirm_email(
        &self,
        account_id: Uuid,
        token: &str,
    ) -> Result<ConfirmOutcome, AuthError> {
        self.confirmation.confirm_email(account_id, token).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn resend_confirmation(&self, email: &str) -> Result<(), AuthError> {
        self.confirmation.resend_confirmation(email).await
    }

    pub async fn current_user(&self, account_id: Uuid) -> Result<UserProfile, AuthError> {
        match self.accounts.get_by_id(account_id).await {
            Ok(account) => Ok(UserProfile::from(&account)),
            Err(e) if e.is_not_found() => Err(AuthError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Revoke a refresh token. Access tokens already issued stay valid
    /// until they expire.
    #[tracing::instrument(skip_all)]
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        if self.issuer.revoke(refresh_token).await? {
            tracing::info!("refresh token revoked");
        }
        Ok(())
    }

    pub fn validate_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        self.issuer.validate_access_token(token)
    }

    pub fn orphaned_tenants(&self) -> Vec<Uuid> {
        self.registrar.orphaned_tenants()
    }
}
