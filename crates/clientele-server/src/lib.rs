//! Clientele Server — HTTP transport, configuration and email delivery
//! for the identity backend and the tenant-scoped client records.

pub mod clients;
pub mod config;
pub mod email;
pub mod routes;
pub mod server;
pub mod store;

pub use config::ServerConfig;
pub use routes::{AppState, Backend};
pub use server::{LiveBackend, build_router, build_state, cors_layer, start};
