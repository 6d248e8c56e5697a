//! Session and user types shared by the store, the orchestrator, and the
//! hosted-service client. The shapes mirror the provider's token responses,
//! so they deserialize straight off the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Metadata key carrying the onboarding flag on the session user.
pub const ONBOARDING_COMPLETED_KEY: &str = "onboarding_completed";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
    /// Provider-managed metadata (e.g. `provider`).
    #[serde(default)]
    pub app_metadata: Map<String, Value>,
    /// Application-managed metadata (`full_name`, `username`,
    /// `onboarding_completed`).
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl AuthUser {
    #[must_use]
    pub fn provider(&self) -> &str {
        self.app_metadata
            .get("provider")
            .and_then(Value::as_str)
            .unwrap_or("email")
    }

    #[must_use]
    pub fn full_name(&self) -> Option<&str> {
        self.user_metadata.get("full_name").and_then(Value::as_str)
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.user_metadata.get("username").and_then(Value::as_str)
    }

    /// Cached onboarding projection carried on the session. The profile
    /// table column is the source of truth; see `profile::ProfileService`.
    #[must_use]
    pub fn onboarding_completed(&self) -> bool {
        self.user_metadata
            .get(ONBOARDING_COMPLETED_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_onboarding_completed(&mut self, completed: bool) {
        self.user_metadata.insert(
            ONBOARDING_COMPLETED_KEY.to_string(),
            Value::Bool(completed),
        );
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry as unix seconds, when the provider reports one.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| at <= Utc::now().timestamp())
    }
}

/// Result of a sign-up call: the provider withholds the session while email
/// confirmation is pending.
#[derive(Clone, Debug)]
pub struct SignUpPayload {
    pub user: AuthUser,
    pub session: Option<Session>,
}

/// Change notifications published by the session store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthChange {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
}

/// OTP verification flavor accepted by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpType {
    Email,
    Recovery,
}

impl OtpType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Recovery => "recovery",
        }
    }
}
