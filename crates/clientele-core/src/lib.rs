//! Clientele Core — domain models, repository traits and the shared
//! error type.
//!
//! Nothing in this crate talks to a database, a mail server or the
//! network; those live behind the traits in [`repository`].

pub mod error;
pub mod models;
pub mod repository;

pub use error::{CoreError, CoreResult};
