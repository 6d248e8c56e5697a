//! Capability contract for the hosted auth service. The orchestrator only
//! sees this trait, so tests substitute an in-memory fake and the HTTP
//! client stays swappable.

use crate::auth::types::{OtpType, Session, SignUpPayload};
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Transport-level failure talking to the hosted service.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("{message}")]
    Http {
        status: u16,
        message: String,
        /// Provider error code when present (e.g. `23505` on a unique
        /// violation from the row API).
        code: Option<String>,
    },
    #[error("Response error: {0}")]
    Parse(String),
}

impl BackendError {
    /// The provider-facing message, used by the classification table.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Config(message)
            | Self::Network(message)
            | Self::Parse(message)
            | Self::Http { message, .. } => message,
        }
    }

    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Http { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Hosted auth service operations, one method per capability.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session, refreshed if the provider supports it. `Ok(None)`
    /// means "not signed in"; errors are reserved for transport failures.
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Registers a new credential. The session is withheld while email
    /// confirmation is pending.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
        email_redirect_to: Option<&str>,
    ) -> Result<SignUpPayload, BackendError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    /// Builds the provider authorize URL. The caller redirects the browser;
    /// completion is observed through the session store, never here.
    fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<Url, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError>;

    /// Sets a new password on the current session's subject. Requires an
    /// active session (typically the recovery session from an email link).
    async fn update_user_password(&self, new_password: &str) -> Result<(), BackendError>;

    async fn sign_in_with_otp(&self, email: &str, redirect_to: &str) -> Result<(), BackendError>;

    async fn verify_otp(
        &self,
        email: &str,
        token: &str,
        otp_type: OtpType,
    ) -> Result<Session, BackendError>;

    /// Hydrates a session from tokens carried out-of-band (emailed links).
    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, BackendError>;
}
