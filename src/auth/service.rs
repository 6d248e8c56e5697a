//! Auth orchestrator: the operations behind every credential form.
//!
//! Each operation calls the hosted capability, translates the outcome
//! through the classification table, and writes the session store
//! synchronously on success. Nothing here retries, and nothing escapes as
//! an unclassified transport error.

use crate::auth::capability::AuthBackend;
use crate::auth::classify::{
    classify_sign_in, classify_sign_up, is_username_conflict, passthrough, AuthError,
};
use crate::auth::recovery::RecoveryTokens;
use crate::auth::state::SessionStore;
use crate::auth::types::{AuthChange, AuthUser, OtpType};
use crate::auth::validate::{
    self, FieldValidation, PasswordStrength,
};
use crate::profile::{ProfileChanges, ProfileTable};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

/// Message shown when the provider withholds the session pending email
/// confirmation.
pub const CONFIRMATION_PENDING_MESSAGE: &str =
    "Please check your email and click the confirmation link to complete your registration.";

/// Sign-up result: a fully authenticated session, or a registered user
/// still waiting on the confirmation email.
#[derive(Clone, Debug)]
pub enum SignUpOutcome {
    Authenticated {
        user: AuthUser,
    },
    ConfirmationPending {
        user: AuthUser,
        message: &'static str,
    },
}

#[derive(Clone)]
pub struct AuthService {
    backend: Arc<dyn AuthBackend>,
    profiles: Arc<dyn ProfileTable>,
    store: SessionStore,
    /// Frontend base URL used for emailed redirect targets.
    site_url: String,
}

impl AuthService {
    #[must_use]
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        profiles: Arc<dyn ProfileTable>,
        store: SessionStore,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            profiles,
            store,
            site_url: site_url.into().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Resolves the initial session into the store; failures mean "no
    /// session" and never surface.
    pub async fn initialize(&self) {
        self.store.initialize(self.backend.as_ref()).await;
    }

    fn redirect(&self, path: &str) -> String {
        format!("{}{path}", self.site_url)
    }

    /// Registers a credential and seeds the identity row.
    ///
    /// # Errors
    /// `UsernameTaken` when the identity row hits the username uniqueness
    /// constraint; otherwise the classified provider failure.
    #[instrument(skip_all, fields(email, username))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        username: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        let mut metadata = Map::new();
        metadata.insert("full_name".to_string(), Value::from(full_name));
        metadata.insert("username".to_string(), Value::from(username));
        metadata.insert("onboarding_completed".to_string(), Value::Bool(false));

        let payload = self
            .backend
            .sign_up(
                email,
                password,
                metadata,
                Some(&self.redirect("/dashboard")),
            )
            .await
            .map_err(|err| classify_sign_up(&err))?;

        // Seed the identity row keyed by user id. Only the username
        // uniqueness conflict is the user's problem; anything else is ours.
        let seed = ProfileChanges {
            user_id: Some(payload.user.id),
            username: Some(username.to_string()),
            full_name: Some(full_name.to_string()),
            email: payload.user.email.clone(),
            provider: Some(payload.user.provider().to_string()),
            role: Some("user".to_string()),
            is_active: Some(true),
            email_verified: Some(payload.user.email_confirmed_at.is_some()),
            onboarding_completed: Some(false),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            ..ProfileChanges::default()
        };

        if let Err(err) = self.profiles.upsert(&seed).await {
            if is_username_conflict(&err) {
                return Err(AuthError::UsernameTaken);
            }
            warn!("identity row upsert failed: {err}");
        }

        match payload.session {
            Some(session) => {
                self.store.apply(AuthChange::SignedIn, Some(session));
                Ok(SignUpOutcome::Authenticated {
                    user: payload.user,
                })
            }
            None => {
                debug!("email confirmation required for {:?}", payload.user.email);
                Ok(SignUpOutcome::ConfirmationPending {
                    user: payload.user,
                    message: CONFIRMATION_PENDING_MESSAGE,
                })
            }
        }
    }

    /// Password sign-in. The store is written before this returns; the
    /// change notification then fans out with the same data.
    #[instrument(skip_all, fields(email))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let session = self
            .backend
            .sign_in_with_password(email, password)
            .await
            .map_err(|err| classify_sign_in(&err))?;

        let user = session.user.clone();
        self.store.apply(AuthChange::SignedIn, Some(session));

        // Best-effort bookkeeping; sign-in already succeeded.
        let stamp = ProfileChanges {
            user_id: Some(user.id),
            email: user.email.clone(),
            email_verified: Some(user.email_confirmed_at.is_some()),
            last_login_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            ..ProfileChanges::default()
        };
        if let Err(err) = self.profiles.upsert(&stamp).await {
            warn!("last-login update failed: {err}");
        }

        Ok(user)
    }

    /// Starts the provider OAuth flow. Returns the authorize URL to
    /// redirect the browser to; completion arrives through the store's
    /// change notifications, not here.
    pub fn sign_in_with_google(&self) -> Result<Url, AuthError> {
        self.backend
            .sign_in_with_oauth("google", Some(&self.redirect("/dashboard")))
            .map_err(|err| passthrough(&err))
    }

    /// Signs out remotely and clears local state. The local clear happens
    /// even when the remote call fails, so stale sessions never linger.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.backend.sign_out().await;
        self.store.clear();

        result.map_err(|err| {
            warn!("remote sign-out failed: {err}");
            passthrough(&err)
        })
    }

    /// Emails a password-reset link targeting the reset page.
    pub async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError> {
        self.backend
            .reset_password_for_email(email, &self.redirect("/reset-password"))
            .await
            .map_err(|err| passthrough(&err))
    }

    /// Legacy alias kept for callers of the older API.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.reset_password_for_email(email).await
    }

    /// Sets a new password. Valid only while the recovery session from the
    /// emailed link is active (see [`AuthService::recover_session`]).
    pub async fn update_password(&self, new_password: &str) -> Result<(), AuthError> {
        self.backend
            .update_user_password(new_password)
            .await
            .map_err(|err| passthrough(&err))
    }

    /// Passwordless path: emails a one-time code.
    pub async fn send_otp(&self, email: &str) -> Result<(), AuthError> {
        self.backend
            .sign_in_with_otp(email, &self.redirect("/reset-password"))
            .await
            .map_err(|err| passthrough(&err))
    }

    /// Exchanges the emailed code for a session.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthUser, AuthError> {
        let session = self
            .backend
            .verify_otp(email, code, OtpType::Email)
            .await
            .map_err(|err| passthrough(&err))?;

        let user = session.user.clone();
        self.store.apply(AuthChange::SignedIn, Some(session));
        Ok(user)
    }

    /// Hydrates the recovery session from tokens carried on the reset
    /// link, letting the page proceed straight to the new-password form.
    pub async fn recover_session(&self, tokens: &RecoveryTokens) -> Result<(), AuthError> {
        let session = self
            .backend
            .set_session(&tokens.access_token, &tokens.refresh_token)
            .await
            .map_err(|err| passthrough(&err))?;

        self.store
            .apply(AuthChange::PasswordRecovery, Some(session));
        Ok(())
    }

    /// Live-feedback username check: format locally, then one best-effort
    /// availability lookup. Lookup failures must never block typing, so
    /// they resolve to "no opinion" (available).
    pub async fn validate_username(&self, username: &str) -> FieldValidation {
        let format = validate::username_format(username);
        if !format.available {
            return format;
        }

        match self.profiles.find_by_username(username).await {
            Ok(Some(_)) => FieldValidation::rejected("Username is already taken"),
            Ok(None) => FieldValidation::ok(),
            Err(err) => {
                warn!("username availability check failed: {err}");
                FieldValidation::ok()
            }
        }
    }

    #[must_use]
    pub fn validate_email(&self, email: &str) -> FieldValidation {
        validate::email_format(email)
    }

    #[must_use]
    pub fn validate_password(&self, password: &str) -> PasswordStrength {
        validate::password_strength(password)
    }
}
