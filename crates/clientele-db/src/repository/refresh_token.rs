//! SurrealDB implementation of [`RefreshTokenStore`].
//!
//! The token digest is the record key, so redemption is a single
//! `DELETE … RETURN BEFORE` on one record: whichever concurrent caller
//! deletes the row receives it, every other caller receives nothing.
//! Losing callers may see a write conflict first; those are retried.

use chrono::{DateTime, Utc};
use clientele_core::error::CoreResult;
use clientele_core::models::refresh_token::{RefreshTokenRecord, Redemption};
use clientele_core::repository::RefreshTokenStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, retry_on_conflict};

#[derive(Debug, SurrealValue)]
struct RefreshTokenRow {
    account_id: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl RefreshTokenRow {
    fn try_into_record(self) -> Result<RefreshTokenRecord, DbError> {
        let account_id = Uuid::parse_str(&self.account_id)
            .map_err(|e| DbError::corrupt("refresh_token", e))?;
        Ok(RefreshTokenRecord {
            account_id,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// Refresh tokens persisted in SurrealDB, shared by every server instance.
#[derive(Clone)]
pub struct SurrealRefreshTokenStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRefreshTokenStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Remove the record under `key`, returning it if this call removed it.
    ///
    /// Concurrent removals of one key conflict inside SurrealDB. The
    /// retried statement sees the committed delete and finds no row, so
    /// only one caller ever gets the record back.
    async fn take(&self, key: &str) -> Result<Option<RefreshTokenRecord>, DbError> {
        match retry_on_conflict("refresh_token", || self.delete_returning(key)).await {
            Err(e) if e.is_write_conflict() => {
                warn!("refresh token removal kept conflicting; treating as already taken");
                Ok(None)
            }
            other => other,
        }
    }

    async fn delete_returning(&self, key: &str) -> Result<Option<RefreshTokenRecord>, DbError> {
        let result = self
            .db
            .query("DELETE type::record('refresh_token', $key) RETURN BEFORE")
            .bind(("key", key.to_string()))
            .await?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("refresh_token", e))?;

        let rows: Vec<RefreshTokenRow> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(RefreshTokenRow::try_into_record)
            .transpose()
    }
}

impl<C: Connection> RefreshTokenStore for SurrealRefreshTokenStore<C> {
    async fn put(&self, key: &str, record: RefreshTokenRecord) -> CoreResult<()> {
        let result = self
            .db
            .query(
                "DELETE refresh_token WHERE expires_at <= time::now(); \
                 CREATE type::record('refresh_token', $key) SET \
                 account_id = $account_id, \
                 issued_at = $issued_at, \
                 expires_at = $expires_at",
            )
            .bind(("key", key.to_string()))
            .bind(("account_id", record.account_id.to_string()))
            .bind(("issued_at", record.issued_at))
            .bind(("expires_at", record.expires_at))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| DbError::from_statement("refresh_token", e))?;

        Ok(())
    }

    async fn redeem(&self, key: &str) -> CoreResult<Redemption> {
        let removed = self.take(key).await?;
        let outcome = Redemption::from_removed(removed, Utc::now());
        if outcome == Redemption::Expired {
            debug!("expired refresh token removed on redemption");
        }
        Ok(outcome)
    }

    async fn revoke(&self, key: &str) -> CoreResult<bool> {
        Ok(self.take(key).await?.is_some())
    }

    async fn len(&self) -> CoreResult<u64> {
        let mut result = self
            .db
            .query("SELECT count() AS total FROM refresh_token GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }
}
