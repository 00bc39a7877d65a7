//! Domain models for Clientele.
//!
//! These are the core types shared across all crates.

pub mod account;
pub mod client;
pub mod refresh_token;
pub mod tenant;
