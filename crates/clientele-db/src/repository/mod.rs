//! SurrealDB repository implementations.

mod account;
mod client;
mod refresh_token;
mod tenant;

pub use account::SurrealAccountRepository;
pub use client::SurrealClientRepository;
pub use refresh_token::SurrealRefreshTokenStore;
pub use tenant::SurrealTenantRepository;
