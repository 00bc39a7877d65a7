//! Email confirmation: token issue, link delivery and the confirmed flip.

use std::sync::Arc;

use clientele_core::models::account::{Account, normalize_email};
use clientele_core::repository::AccountRepository;
use serde::Serialize;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::email::{EmailSender, confirmation_message, welcome_message};
use crate::error::AuthError;
use crate::identity::IdentityTokenProvider;

/// Result of presenting a confirmation token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfirmOutcome {
    Confirmed,
    AlreadyConfirmed,
    UserNotFound,
    TokenInvalid,
}

pub struct EmailConfirmationFlow<A, P, E> {
    accounts: A,
    identity: Arc<P>,
    email: Arc<E>,
    public_base_url: String,
    product_name: String,
    valid_hours: u64,
}

impl<A: Clone, P, E> Clone for EmailConfirmationFlow<A, P, E> {
    fn clone(&self) -> Self {
        Self {
            accounts: self.accounts.clone(),
            identity: Arc::clone(&self.identity),
            email: Arc::clone(&self.email),
            public_base_url: self.public_base_url.clone(),
            product_name: self.product_name.clone(),
            valid_hours: self.valid_hours,
        }
    }
}

impl<A, P, E> EmailConfirmationFlow<A, P, E>
where
    A: AccountRepository,
    P: IdentityTokenProvider,
    E: EmailSender + 'static,
{
    pub fn new(accounts: A, identity: Arc<P>, email: Arc<E>, config: &AuthConfig) -> Self {
        Self {
            accounts,
            identity,
            email,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            product_name: config.product_name.clone(),
            valid_hours: config.confirmation_token_lifetime_hours,
        }
    }

    pub fn generate_confirmation_token(&self, account: &Account) -> Result<String, AuthError> {
        self.identity.generate(account)
    }

    /// Link the confirmation email points at. Tokens are base64url and
    /// need no further escaping.
    pub fn confirmation_link(&self, account_id: Uuid, token: &str) -> String {
        format!(
            "{}/api/auth/confirm-email?userId={account_id}&token={token}",
            self.public_base_url
        )
    }

    /// Generate a token and mail the link. Returns whether the sender
    /// accepted the message; never fails the caller.
    pub async fn send_confirmation(&self, account: &Account) -> bool {
        let token = match self.generate_confirmation_token(account) {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(account_id = %account.id, error = %e, "confirmation token generation failed");
                return false;
            }
        };
        let link = self.confirmation_link(account.id, &token);
        let msg = confirmation_message(
            &self.product_name,
            &account.first_name,
            &link,
            self.valid_hours,
        );

        let sent = self
            .email
            .send(&account.email, &msg.subject, &msg.html_body)
            .await;
        if !sent {
            tracing::warn!(account_id = %account.id, "confirmation email was not delivered");
        }
        sent
    }

    pub async fn confirm_email(
        &self,
        account_id: Uuid,
        token: &str,
    ) -> Result<ConfirmOutcome, AuthError> {
        let account = match self.accounts.get_by_id(account_id).await {
            Ok(account) => account,
            Err(e) if e.is_not_found() => return Ok(ConfirmOutcome::UserNotFound),
            Err(e) => return Err(e.into()),
        };

        if account.email_confirmed {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }
        if !self.identity.verify(&account, token) {
            return Ok(ConfirmOutcome::TokenInvalid);
        }

        // A concurrent confirmation may have flipped the flag since the read.
        if !self.accounts.mark_email_confirmed(account_id).await? {
            return Ok(ConfirmOutcome::AlreadyConfirmed);
        }

        tracing::info!(%account_id, "email confirmed");
        self.spawn_welcome(account);
        Ok(ConfirmOutcome::Confirmed)
    }

    /// Send a fresh confirmation link if the address belongs to an
    /// unconfirmed account. Silent otherwise.
    pub async fn resend_confirmation(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let account = match self.accounts.get_by_email(&email).await {
            Ok(account) => account,
            Err(e) if e.is_not_found() => {
                tracing::debug!("confirmation resend for unknown email");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if account.email_confirmed {
            tracing::debug!(account_id = %account.id, "confirmation resend for confirmed account");
            return Ok(());
        }

        self.send_confirmation(&account).await;
        Ok(())
    }

    fn spawn_welcome(&self, account: Account) {
        let email = Arc::clone(&self.email);
        let msg = welcome_message(&self.product_name, &account.first_name);
        tokio::spawn(async move {
            if !email.send(&account.email, &msg.subject, &msg.html_body).await {
                tracing::warn!(account_id = %account.id, "welcome email was not delivered");
            }
        });
    }
}
