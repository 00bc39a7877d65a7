//! Refresh token store selected at startup.

use clientele_auth::MemoryRefreshTokenStore;
use clientele_core::error::CoreResult;
use clientele_core::models::refresh_token::{RefreshTokenRecord, Redemption};
use clientele_core::repository::RefreshTokenStore;
use clientele_db::repository::SurrealRefreshTokenStore;
use surrealdb::Connection;

use crate::config::RefreshStoreBackend;

#[derive(Clone)]
pub enum RefreshStore<C: Connection> {
    Memory(MemoryRefreshTokenStore),
    Database(SurrealRefreshTokenStore<C>),
}

impl<C: Connection> RefreshStore<C> {
    pub fn new(backend: RefreshStoreBackend, db: surrealdb::Surreal<C>) -> Self {
        match backend {
            RefreshStoreBackend::Memory => Self::Memory(MemoryRefreshTokenStore::new()),
            RefreshStoreBackend::Database => Self::Database(SurrealRefreshTokenStore::new(db)),
        }
    }
}

impl<C: Connection> RefreshTokenStore for RefreshStore<C> {
    async fn put(&self, key: &str, record: RefreshTokenRecord) -> CoreResult<()> {
        match self {
            Self::Memory(s) => s.put(key, record).await,
            Self::Database(s) => s.put(key, record).await,
        }
    }

    async fn redeem(&self, key: &str) -> CoreResult<Redemption> {
        match self {
            Self::Memory(s) => s.redeem(key).await,
            Self::Database(s) => s.redeem(key).await,
        }
    }

    async fn revoke(&self, key: &str) -> CoreResult<bool> {
        match self {
            Self::Memory(s) => s.revoke(key).await,
            Self::Database(s) => s.revoke(key).await,
        }
    }

    async fn len(&self) -> CoreResult<u64> {
        match self {
            Self::Memory(s) => s.len().await,
            Self::Database(s) => s.len().await,
        }
    }
}
