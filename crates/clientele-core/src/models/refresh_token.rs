//! Refresh token records.
//!
//! The raw token never leaves the issuing response; stores only see a
//! key derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub account_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Result of presenting a refresh token key to a store.
///
/// `Expired` and `Unknown` are both terminal; the entry is gone from the
/// store in either case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redemption {
    Redeemed(Uuid),
    Expired,
    Unknown,
}

impl Redemption {
    /// Classify a record removed from a store at `now`.
    pub fn from_removed(record: Option<RefreshTokenRecord>, now: DateTime<Utc>) -> Self {
        match record {
            Some(r) if r.is_expired_at(now) => Self::Expired,
            Some(r) => Self::Redeemed(r.account_id),
            None => Self::Unknown,
        }
    }
}
