//! Schema definitions and migration runner for SurrealDB.
//!
//! All tables are SCHEMAFULL. UUIDs are stored as strings; refresh
//! tokens use their digest as the record key. Client dates of birth are
//! ISO `YYYY-MM-DD` strings.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "tenants_accounts_refresh_tokens",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "clients",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Tenants
-- =======================================================================
DEFINE TABLE tenant SCHEMAFULL;
DEFINE FIELD name ON TABLE tenant TYPE string;
DEFINE FIELD contact_email ON TABLE tenant TYPE string;
DEFINE FIELD created_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE tenant TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_tenant_contact_email ON TABLE tenant \
    COLUMNS contact_email;

-- =======================================================================
-- Accounts (email unique across all tenants)
-- =======================================================================
DEFINE TABLE account SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE account TYPE string;
DEFINE FIELD email ON TABLE account TYPE string;
DEFINE FIELD password_hash ON TABLE account TYPE string;
DEFINE FIELD first_name ON TABLE account TYPE string;
DEFINE FIELD last_name ON TABLE account TYPE string;
DEFINE FIELD email_confirmed ON TABLE account TYPE bool DEFAULT false;
DEFINE FIELD roles ON TABLE account TYPE array<string> DEFAULT [];
DEFINE FIELD created_at ON TABLE account TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE account TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_account_email ON TABLE account \
    COLUMNS email UNIQUE;
DEFINE INDEX idx_account_tenant ON TABLE account \
    COLUMNS tenant_id;

-- =======================================================================
-- Refresh tokens (record key = SHA-256 digest of the raw token)
-- =======================================================================
DEFINE TABLE refresh_token SCHEMAFULL;
DEFINE FIELD account_id ON TABLE refresh_token TYPE string;
DEFINE FIELD issued_at ON TABLE refresh_token TYPE datetime;
DEFINE FIELD expires_at ON TABLE refresh_token TYPE datetime;
DEFINE INDEX idx_refresh_token_expires ON TABLE refresh_token \
    COLUMNS expires_at;
";

// -----------------------------------------------------------------------
// Schema v2
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
-- =======================================================================
-- Clients (tenant-scoped customer records)
-- =======================================================================
DEFINE TABLE client SCHEMAFULL;
DEFINE FIELD tenant_id ON TABLE client TYPE string;
DEFINE FIELD title ON TABLE client TYPE string DEFAULT '';
DEFINE FIELD first_name ON TABLE client TYPE string;
DEFINE FIELD last_name ON TABLE client TYPE string;
DEFINE FIELD email ON TABLE client TYPE string;
DEFINE FIELD phone ON TABLE client TYPE string DEFAULT '';
DEFINE FIELD date_of_birth ON TABLE client TYPE option<string>;
DEFINE FIELD street ON TABLE client TYPE option<string>;
DEFINE FIELD suburb ON TABLE client TYPE option<string>;
DEFINE FIELD state ON TABLE client TYPE option<string>;
DEFINE FIELD post_code ON TABLE client TYPE option<string>;
DEFINE FIELD created_at ON TABLE client TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE client TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_client_tenant ON TABLE client \
    COLUMNS tenant_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the recorded maximum.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    let mut result = db
        .query("SELECT version FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS.iter().filter(|m| m.version > current_version) {
        info!(
            version = migration.version,
            name = migration.name,
            "Applying migration"
        );
        db.query(migration.sql).await?.check().map_err(|e| {
            DbError::Migration(format!(
                "v{} '{}': {}",
                migration.version, migration.name, e,
            ))
        })?;

        db.query("CREATE _migration SET version = $version, name = $name")
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!("recording v{}: {}", migration.version, e))
            })?;
    }

    Ok(())
}

/// Raw DDL for schema version 1.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

/// Raw DDL for schema version 2.
pub fn schema_v2() -> &'static str {
    SCHEMA_V2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn clients_are_indexed_by_tenant() {
        assert!(SCHEMA_V2.contains("idx_client_tenant ON TABLE client COLUMNS tenant_id"));
    }

    #[test]
    fn account_email_is_unique() {
        assert!(SCHEMA_V1.contains("idx_account_email ON TABLE account COLUMNS email UNIQUE"));
    }
}
