//! Tenant registration: a new tenant plus its first (Admin) account.
//!
//! The two inserts are not transactional. If the account cannot be
//! created the tenant is deleted again; if that delete fails too, the
//! tenant id is kept in an orphan ledger and the call still fails.
//!
//! The ledger is diagnostic only: it lives in memory, is lost on restart
//! and keeps the most recent [`MAX_ORPHANS`] ids. The ERROR log line
//! emitted for every orphan is the durable record.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use clientele_core::error::CoreError;
use clientele_core::models::account::{Account, CreateAccount, ROLE_ADMIN, normalize_email};
use clientele_core::models::tenant::CreateTenant;
use clientele_core::repository::{AccountRepository, TenantRepository};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::confirmation::EmailConfirmationFlow;
use crate::email::EmailSender;
use crate::error::{ACCOUNT_NOT_CREATED, AuthError};
use crate::identity::IdentityTokenProvider;
use crate::password::{hash_password_off_thread, policy_violations};

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub tenant_name: String,
}

impl fmt::Debug for RegisterInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterInput")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("tenant_name", &self.tenant_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutput {
    pub account_id: Uuid,
    pub tenant_id: Uuid,
    /// Whether the email sender accepted the confirmation message.
    pub confirmation_email_sent: bool,
    pub requires_email_confirmation: bool,
}

/// Orphaned tenant ids kept by the ledger before the oldest is dropped.
pub const MAX_ORPHANS: usize = 256;

/// Bounded record of tenants whose compensating delete failed.
#[derive(Debug, Clone, Default)]
struct OrphanLedger {
    ids: Arc<Mutex<VecDeque<Uuid>>>,
}

impl OrphanLedger {
    fn record(&self, tenant_id: Uuid) {
        let mut ids = self.ids.lock();
        if ids.len() == MAX_ORPHANS {
            if let Some(dropped) = ids.pop_front() {
                tracing::warn!(tenant_id = %dropped, "orphan ledger full; dropping oldest entry");
            }
        }
        ids.push_back(tenant_id);
    }

    fn snapshot(&self) -> Vec<Uuid> {
        self.ids.lock().iter().copied().collect()
    }
}

pub struct TenantRegistrar<T, A, P, E> {
    tenants: T,
    accounts: A,
    confirmation: EmailConfirmationFlow<A, P, E>,
    pepper: Option<String>,
    min_password_length: usize,
    orphans: OrphanLedger,
}

impl<T, A, P, E> TenantRegistrar<T, A, P, E>
where
    T: TenantRepository,
    A: AccountRepository,
    P: IdentityTokenProvider,
    E: EmailSender + 'static,
{
    pub fn new(
        tenants: T,
        accounts: A,
        confirmation: EmailConfirmationFlow<A, P, E>,
        pepper: Option<String>,
        min_password_length: usize,
    ) -> Self {
        Self {
            tenants,
            accounts,
            confirmation,
            pepper,
            min_password_length,
            orphans: OrphanLedger::default(),
        }
    }

    pub async fn register(&self, input: RegisterInput) -> Result<RegisterOutput, AuthError> {
        let email = normalize_email(&input.email);
        validate_fields(&email, &input)?;

        match self.accounts.get_by_email(&email).await {
            Ok(_) => return Err(AuthError::DuplicateEmail),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let tenant = self
            .tenants
            .create(CreateTenant {
                name: input.tenant_name.trim().to_string(),
                contact_email: email.clone(),
            })
            .await?;

        let account = match self.create_first_account(tenant.id, &email, &input).await {
            Ok(account) => account,
            Err(cause) => return Err(self.compensate(tenant.id, cause).await),
        };

        tracing::info!(
            tenant_id = %tenant.id,
            account_id = %account.id,
            "tenant registered"
        );

        let confirmation_email_sent = self.confirmation.send_confirmation(&account).await;

        Ok(RegisterOutput {
            account_id: account.id,
            tenant_id: tenant.id,
            confirmation_email_sent,
            requires_email_confirmation: true,
        })
    }

    /// Recent tenant ids whose compensating delete failed, oldest first.
    /// Operators must clean these up by hand.
    pub fn orphaned_tenants(&self) -> Vec<Uuid> {
        self.orphans.snapshot()
    }

    async fn create_first_account(
        &self,
        tenant_id: Uuid,
        email: &str,
        input: &RegisterInput,
    ) -> Result<Account, AuthError> {
        let violations = policy_violations(&input.password, self.min_password_length);
        if !violations.is_empty() {
            return Err(AuthError::UserCreationFailed {
                reason: violations.join("; "),
            });
        }

        let password_hash =
            hash_password_off_thread(&input.password, self.pepper.as_deref()).await?;

        self.accounts
            .create(CreateAccount {
                tenant_id,
                email: email.to_string(),
                password_hash,
                first_name: input.first_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
                roles: vec![ROLE_ADMIN.to_string()],
            })
            .await
            .map_err(|e| match e {
                CoreError::AlreadyExists { .. } => AuthError::DuplicateEmail,
                other => other.into(),
            })
    }

    /// Undo the tenant insert after the account insert failed, and turn
    /// `cause` into the error the caller sees.
    async fn compensate(&self, tenant_id: Uuid, cause: AuthError) -> AuthError {
        match self.tenants.delete(tenant_id).await {
            Ok(()) => {
                tracing::warn!(%tenant_id, error = %cause, "account creation failed; tenant removed");
                match cause {
                    AuthError::DuplicateEmail | AuthError::UserCreationFailed { .. } => cause,
                    _ => AuthError::UserCreationFailed {
                        reason: ACCOUNT_NOT_CREATED.into(),
                    },
                }
            }
            Err(delete_err) => {
                tracing::error!(
                    %tenant_id,
                    cause = %cause,
                    error = %delete_err,
                    "compensating tenant delete failed; tenant orphaned"
                );
                self.orphans.record(tenant_id);
                AuthError::TenantOrphaned { tenant_id }
            }
        }
    }
}

fn validate_fields(email: &str, input: &RegisterInput) -> Result<(), AuthError> {
    let reason = if email.is_empty() || !email.contains('@') {
        "a valid email address is required"
    } else if input.tenant_name.trim().is_empty() {
        "tenant name is required"
    } else if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
        "first and last name are required"
    } else {
        return Ok(());
    };
    Err(AuthError::UserCreationFailed {
        reason: reason.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> RegisterInput {
        RegisterInput {
            email: "amy@acme.test".into(),
            password: "Pw123456!".into(),
            first_name: "Amy".into(),
            last_name: "Lee".into(),
            tenant_name: "Acme".into(),
        }
    }

    #[test]
    fn complete_input_is_valid() {
        assert!(validate_fields("amy@acme.test", &input()).is_ok());
    }

    #[test]
    fn missing_tenant_name_is_rejected() {
        let input = RegisterInput {
            tenant_name: "  ".into(),
            ..input()
        };
        assert!(matches!(
            validate_fields("amy@acme.test", &input),
            Err(AuthError::UserCreationFailed { .. })
        ));
    }

    #[test]
    fn malformed_email_is_rejected() {
        assert!(validate_fields("amy", &input()).is_err());
    }

    #[test]
    fn orphan_ledger_keeps_the_most_recent_ids() {
        let ledger = OrphanLedger::default();
        let ids: Vec<Uuid> = (0..MAX_ORPHANS + 3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            ledger.record(*id);
        }
        let kept = ledger.snapshot();
        assert_eq!(kept.len(), MAX_ORPHANS);
        assert_eq!(kept.first(), Some(&ids[3]));
        assert_eq!(kept.last(), ids.last());
    }

    #[test]
    fn debug_redacts_password() {
        assert!(!format!("{:?}", input()).contains("Pw123456!"));
    }

    #[test]
    fn input_uses_camel_case() {
        let input: RegisterInput = serde_json::from_str(
            r#"{"email":"a@b.test","password":"p","firstName":"A","lastName":"B","tenantName":"T"}"#,
        )
        .unwrap();
        assert_eq!(input.tenant_name, "T");
    }
}
