//! SurrealDB implementation of [`AccountRepository`].
//!
//! Accounts arrive with their credential already hashed; this layer
//! never handles plaintext passwords. Email uniqueness is enforced by
//! the `idx_account_email` index, so a racing duplicate insert surfaces
//! as `AlreadyExists` rather than a second row.

use chrono::{DateTime, Utc};
use clientele_core::error::CoreResult;
use clientele_core::models::account::{Account, CreateAccount};
use clientele_core::repository::{AccountRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::warn;
use uuid::Uuid;

use crate::error::{DbError, retry_on_conflict};

#[derive(Debug, SurrealValue)]
struct AccountRow {
    tenant_id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    email_confirmed: bool,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct AccountRowWithId {
    record_id: String,
    tenant_id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    email_confirmed: bool,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn into_account(self, id: Uuid) -> Result<Account, DbError> {
        let tenant_id =
            Uuid::parse_str(&self.tenant_id).map_err(|e| DbError::corrupt("account", e))?;
        Ok(Account {
            id,
            tenant_id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            email_confirmed: self.email_confirmed,
            roles: self.roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl AccountRowWithId {
    fn try_into_account(self) -> Result<Account, DbError> {
        let id = Uuid::parse_str(&self.record_id).map_err(|e| DbError::corrupt("account", e))?;
        AccountRow {
            tenant_id: self.tenant_id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            email_confirmed: self.email_confirmed,
            roles: self.roles,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
        .into_account(id)
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

#[derive(Debug, SurrealValue)]
struct ConfirmedRow {
    email_confirmed: bool,
}

/// SurrealDB implementation of the Account repository.
#[derive(Clone)]
pub struct SurrealAccountRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAccountRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// The WHERE guard makes the flip a compare-and-set: only the call
    /// that observes `false` gets a row back.
    async fn confirm_once(&self, id: Uuid) -> Result<bool, DbError> {
        let result = self
            .db
            .query(
                "UPDATE type::record('account', $id) SET \
                 email_confirmed = true, updated_at = time::now() \
                 WHERE email_confirmed = false \
                 RETURN email_confirmed",
            )
            .bind(("id", id.to_string()))
            .await?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("account", e))?;

        let rows: Vec<ConfirmedRow> = result.take(0)?;
        Ok(rows.iter().any(|r| r.email_confirmed))
    }
}

impl<C: Connection> AccountRepository for SurrealAccountRepository<C> {
    async fn create(&self, input: CreateAccount) -> CoreResult<Account> {
        input.validate()?;
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('account', $id) SET \
                 tenant_id = $tenant_id, \
                 email = $email, \
                 password_hash = $password_hash, \
                 first_name = $first_name, \
                 last_name = $last_name, \
                 email_confirmed = false, \
                 roles = $roles",
            )
            .bind(("id", id_str.clone()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("email", input.email))
            .bind(("password_hash", input.password_hash))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("roles", input.roles))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("account", e))?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "account".into(),
            id: id_str,
        })?;

        Ok(row.into_account(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> CoreResult<Account> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('account', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "account".into(),
            id: id_str,
        })?;

        Ok(row.into_account(id)?)
    }

    async fn get_by_email(&self, email: &str) -> CoreResult<Account> {
        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM account WHERE email = $email")
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "account".into(),
            id: format!("email={email}"),
        })?;

        Ok(row.try_into_account()?)
    }

    async fn mark_email_confirmed(&self, id: Uuid) -> CoreResult<bool> {
        // A concurrent confirmation either commits first, so the retry
        // finds the flag already set, or keeps conflicting, which means
        // another caller is flipping it.
        match retry_on_conflict("account", || self.confirm_once(id)).await {
            Err(e) if e.is_write_conflict() => {
                warn!(account_id = %id, "email confirmation kept conflicting");
                Ok(false)
            }
            other => Ok(other?),
        }
    }

    async fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> CoreResult<PaginatedResult<Account>> {
        let tenant_id_str = tenant_id.to_string();

        let mut count_result = self
            .db
            .query(
                "SELECT count() AS total FROM account \
                 WHERE tenant_id = $tenant_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM account \
                 WHERE tenant_id = $tenant_id \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("tenant_id", tenant_id_str))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<AccountRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(AccountRowWithId::try_into_account)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }
}
