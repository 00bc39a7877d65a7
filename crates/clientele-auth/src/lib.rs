//! Clientele Auth — tenant registration, credential validation, email
//! confirmation and the access/refresh token lifecycle.
//!
//! [`AuthService`] is the façade the transport layer talks to; the
//! components it composes are public so they can be driven on their own.

pub mod config;
pub mod confirmation;
pub mod credentials;
pub mod email;
pub mod error;
pub mod identity;
pub mod password;
pub mod registrar;
pub mod service;
pub mod store;
pub mod token;

pub use config::AuthConfig;
pub use confirmation::{ConfirmOutcome, EmailConfirmationFlow};
pub use credentials::{CredentialValidator, LoginOutput, UserProfile};
pub use email::{EmailSender, LogEmailSender};
pub use error::AuthError;
pub use identity::{HmacIdentityTokenProvider, IdentityTokenProvider};
pub use registrar::{RegisterInput, RegisterOutput, TenantRegistrar};
pub use service::AuthService;
pub use store::MemoryRefreshTokenStore;
pub use token::{AccessTokenClaims, TokenBundle, TokenIssuer};
