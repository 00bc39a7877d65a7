//! Database-specific error types and conversions.

use clientele_core::error::CoreError;
use tracing::debug;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Unique constraint violated on {entity}")]
    Conflict { entity: String },

    #[error("Corrupt {entity} row: {message}")]
    CorruptRow { entity: String, message: String },

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl DbError {
    /// Classify a failed statement, recognising unique-index violations.
    pub(crate) fn from_statement(entity: &str, err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        if message.contains("already contains") {
            DbError::Conflict {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }

    /// SurrealDB aborts the losing side of two concurrent writes to one
    /// record with a retryable transaction conflict.
    pub fn is_write_conflict(&self) -> bool {
        let message = self.to_string();
        message.contains("Transaction conflict") || message.contains("retry the transaction")
    }

    pub(crate) fn corrupt(entity: &str, message: impl std::fmt::Display) -> Self {
        DbError::CorruptRow {
            entity: entity.into(),
            message: message.to_string(),
        }
    }
}

/// Attempts made on a statement that keeps losing write conflicts.
pub(crate) const WRITE_CONFLICT_ATTEMPTS: u32 = 5;

/// Run `op` again while it fails with a write conflict, up to
/// [`WRITE_CONFLICT_ATTEMPTS`] times. The last error is returned as is.
pub(crate) async fn retry_on_conflict<T, F, Fut>(entity: &str, mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(e) if e.is_write_conflict() && attempt < WRITE_CONFLICT_ATTEMPTS => {
                debug!(entity, attempt, "write conflict, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            DbError::Conflict { entity } => CoreError::AlreadyExists { entity },
            other => CoreError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_index_violation_becomes_conflict() {
        let err = DbError::from_statement(
            "account",
            "Database index `idx_account_email` already contains 'a@x.com'",
        );
        assert!(matches!(err, DbError::Conflict { .. }));
        assert!(matches!(
            CoreError::from(err),
            CoreError::AlreadyExists { .. }
        ));
    }

    #[test]
    fn write_conflicts_are_recognised() {
        let err = DbError::from_statement(
            "refresh_token",
            "Transaction conflict: Write conflict, retry the transaction",
        );
        assert!(err.is_write_conflict());
        assert!(!DbError::from_statement("account", "connection reset").is_write_conflict());
    }

    #[tokio::test]
    async fn conflicts_are_retried_until_the_statement_succeeds() {
        let mut calls = 0;
        let result = retry_on_conflict("refresh_token", || {
            calls += 1;
            let outcome = if calls < 3 {
                Err(DbError::Query("Transaction conflict: Write conflict".into()))
            } else {
                Ok(calls)
            };
            async move { outcome }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn conflict_retries_are_bounded() {
        let mut calls = 0;
        let result: Result<(), DbError> = retry_on_conflict("account", || {
            calls += 1;
            async { Err(DbError::Query("retry the transaction".into())) }
        })
        .await;
        assert!(result.unwrap_err().is_write_conflict());
        assert_eq!(calls, WRITE_CONFLICT_ATTEMPTS);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), DbError> = retry_on_conflict("account", || {
            calls += 1;
            async { Err(DbError::Query("connection reset".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn other_failures_are_database_errors() {
        let err = DbError::from_statement("account", "connection reset");
        assert!(matches!(CoreError::from(err), CoreError::Database(_)));
    }
}
