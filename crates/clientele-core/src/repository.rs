//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Implementations must be cheap
//! to clone; the auth layer hands clones to each component it builds.

use uuid::Uuid;

use crate::error::CoreResult;
use crate::models::{
    account::{Account, CreateAccount},
    client::{Client, ClientDetails},
    refresh_token::{RefreshTokenRecord, Redemption},
    tenant::{CreateTenant, Tenant},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Tenants
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = CoreResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CoreResult<Tenant>> + Send;
    /// Hard delete. Deleting a missing tenant is not an error.
    fn delete(&self, id: Uuid) -> impl Future<Output = CoreResult<()>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = CoreResult<PaginatedResult<Tenant>>> + Send;
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

pub trait AccountRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the email is taken.
    fn create(&self, input: CreateAccount) -> impl Future<Output = CoreResult<Account>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = CoreResult<Account>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = CoreResult<Account>> + Send;
    /// Flip `email_confirmed` to true. Returns `true` only for the call
    /// that performed the transition.
    fn mark_email_confirmed(&self, id: Uuid) -> impl Future<Output = CoreResult<bool>> + Send;
    fn list_by_tenant(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CoreResult<PaginatedResult<Account>>> + Send;
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

/// Client records. Every operation is scoped to one tenant: a client that
/// belongs to another tenant is reported as `NotFound`.
pub trait ClientRepository: Send + Sync {
    fn create(
        &self,
        tenant_id: Uuid,
        details: ClientDetails,
    ) -> impl Future<Output = CoreResult<Client>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = CoreResult<Client>> + Send;
    /// Replace every editable field.
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        details: ClientDetails,
    ) -> impl Future<Output = CoreResult<Client>> + Send;
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = CoreResult<()>> + Send;
    fn list(
        &self,
        tenant_id: Uuid,
        pagination: Pagination,
    ) -> impl Future<Output = CoreResult<PaginatedResult<Client>>> + Send;
}

// ---------------------------------------------------------------------------
// Refresh tokens
// ---------------------------------------------------------------------------

/// Outstanding refresh tokens, keyed by a digest of the raw token.
pub trait RefreshTokenStore: Send + Sync {
    /// Insert a record. Implementations evict already-expired entries
    /// as part of the same mutation.
    fn put(
        &self,
        key: &str,
        record: RefreshTokenRecord,
    ) -> impl Future<Output = CoreResult<()>> + Send;

    /// Remove the entry for `key` and classify it, as one atomic step.
    ///
    /// Of several concurrent callers presenting the same key, at most
    /// one observes [`Redemption::Redeemed`].
    fn redeem(&self, key: &str) -> impl Future<Output = CoreResult<Redemption>> + Send;

    /// Remove the entry regardless of expiry. Returns whether one existed.
    fn revoke(&self, key: &str) -> impl Future<Output = CoreResult<bool>> + Send;

    /// Number of stored entries, expired ones included.
    fn len(&self) -> impl Future<Output = CoreResult<u64>> + Send;
}
