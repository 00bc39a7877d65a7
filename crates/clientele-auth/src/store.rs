//! In-memory [`RefreshTokenStore`].
//!
//! Each instance owns its map; clones share it. Nothing is global, so
//! two services in one process never see each other's tokens.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use clientele_core::error::CoreResult;
use clientele_core::models::refresh_token::{RefreshTokenRecord, Redemption};
use clientele_core::repository::RefreshTokenStore;
use parking_lot::Mutex;

#[derive(Debug, Clone, Default)]
pub struct MemoryRefreshTokenStore {
    /// Records keyed by refresh token digest.
    entries: Arc<Mutex<HashMap<String, RefreshTokenRecord>>>,
}

impl MemoryRefreshTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn put(&self, key: &str, record: RefreshTokenRecord) -> CoreResult<()> {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, r| !r.is_expired_at(now));
        let evicted = before - entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted expired refresh tokens");
        }
        entries.insert(key.to_string(), record);
        Ok(())
    }

    async fn redeem(&self, key: &str) -> CoreResult<Redemption> {
        let removed = self.entries.lock().remove(key);
        Ok(Redemption::from_removed(removed, Utc::now()))
    }

    async fn revoke(&self, key: &str) -> CoreResult<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn len(&self) -> CoreResult<u64> {
        Ok(self.entries.lock().len() as u64)
    }
}
