//! # ExpenseAI (auth core & OAuth relay)
//!
//! `expenseai` is the non-visual core of a personal-finance application:
//! the client-side authentication/session machinery plus a thin HTTP relay
//! for Google OAuth code and credential exchange.
//!
//! ## Session model
//!
//! The current session lives in an explicitly owned [`auth::SessionStore`].
//! There is no ambient global: whoever renders the UI tree owns the store
//! and hands out clones. Changes fan out over an internal channel; a
//! subscription unsubscribes when dropped.
//!
//! ## External services
//!
//! Authentication and row storage are delegated to a hosted auth/database
//! service, reached over HTTPS and modeled as the [`auth::AuthBackend`] and
//! [`profile::ProfileTable`] traits. The crate never opens a database
//! connection of its own.
//!
//! ## Relay
//!
//! The `expenseai` binary serves `/health` and the two Google OAuth
//! endpoints, verifies credentials against Google, syncs the identity row,
//! and mints a signed session token. CORS is restricted to an allow-list
//! of development origins with credentials enabled.

pub mod auth;
pub mod cli;
pub mod profile;
pub mod relay;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
