//! Core types for the masked email bot.
//!
//! This crate holds the data model shared by every adapter (users, pending
//! authorizations, credentials, aliases), the coarse error taxonomy surfaced to
//! the orchestration layer, and the collaborator traits the core depends on:
//! [`Store`] for persistence and [`Notifier`] for messaging the user.

mod error;
mod notifier;
mod store;
mod types;

pub use error::{Error, ProviderErrorKind, Result};
pub use notifier::{Notice, Notifier};
pub use store::Store;
pub use types::{
    AliasState, MaskedEmailAlias, OAuthCredential, PendingAuthorization, User, UserId, after_seconds,
};
