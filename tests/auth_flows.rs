//! End-to-end orchestrator flows against in-memory capability fakes.
//!
//! The fakes stand in for the hosted auth/database service so every flow
//! (sign-up, sign-in, sign-out, recovery, onboarding) runs without a
//! network.

use async_trait::async_trait;
use expenseai::auth::{
    capability::{AuthBackend, BackendError},
    guards::{self, paths, AuthPhase, RouteAction},
    recovery::RecoveryTokens,
    service::{AuthService, SignUpOutcome, CONFIRMATION_PENDING_MESSAGE},
    state::SessionStore,
    types::{AuthUser, OtpType, Session, SignUpPayload},
};
use expenseai::profile::{
    ProfileChanges, ProfileRecord, ProfileService, ProfileTable, QuestionnaireForm,
};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use url::Url;
use uuid::Uuid;

const SITE_URL: &str = "https://app.expenseai.dev";

fn make_user(id: Uuid, email: &str, metadata: Map<String, Value>) -> AuthUser {
    serde_json::from_value(json!({
        "id": id,
        "email": email,
        "email_confirmed_at": "2026-01-01T00:00:00Z",
        "app_metadata": { "provider": "email" },
        "user_metadata": metadata,
    }))
    .expect("user")
}

fn make_session(id: Uuid, email: &str, onboarded: bool) -> Session {
    let mut metadata = Map::new();
    metadata.insert("onboarding_completed".to_string(), Value::Bool(onboarded));
    Session {
        access_token: "access".to_string(),
        refresh_token: "refresh".to_string(),
        expires_at: None,
        user: make_user(id, email, metadata),
    }
}

#[derive(Default)]
struct FakeBackend {
    user_id: Uuid,
    grant_session_on_signup: bool,
    user_onboarded: bool,
    sign_in_error: Option<String>,
    fail_sign_out: bool,
    fail_get_session: bool,
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        if self.fail_get_session {
            return Err(BackendError::Network("connection refused".to_string()));
        }
        Ok(None)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: Map<String, Value>,
        _email_redirect_to: Option<&str>,
    ) -> Result<SignUpPayload, BackendError> {
        let user = make_user(self.user_id, email, metadata);
        let session = self
            .grant_session_on_signup
            .then(|| make_session(self.user_id, email, self.user_onboarded));
        Ok(SignUpPayload { user, session })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<Session, BackendError> {
        if let Some(message) = &self.sign_in_error {
            return Err(BackendError::Http {
                status: 400,
                message: message.clone(),
                code: None,
            });
        }
        Ok(make_session(self.user_id, email, self.user_onboarded))
    }

    fn sign_in_with_oauth(
        &self,
        provider: &str,
        _redirect_to: Option<&str>,
    ) -> Result<Url, BackendError> {
        Url::parse(&format!(
            "https://id.example.dev/auth/v1/authorize?provider={provider}"
        ))
        .map_err(|err| BackendError::Config(err.to_string()))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        if self.fail_sign_out {
            return Err(BackendError::Http {
                status: 500,
                message: "service unavailable".to_string(),
                code: None,
            });
        }
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        _email: &str,
        _redirect_to: &str,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn update_user_password(&self, _new_password: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn sign_in_with_otp(
        &self,
        _email: &str,
        _redirect_to: &str,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn verify_otp(
        &self,
        email: &str,
        _token: &str,
        _otp_type: OtpType,
    ) -> Result<Session, BackendError> {
        Ok(make_session(self.user_id, email, self.user_onboarded))
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, BackendError> {
        let mut session = make_session(self.user_id, "a@b.com", self.user_onboarded);
        session.access_token = access_token.to_string();
        session.refresh_token = refresh_token.to_string();
        Ok(session)
    }
}

#[derive(Default)]
struct FakeTable {
    rows: Mutex<Vec<ProfileRecord>>,
    taken_username: Option<String>,
    fail_all: bool,
}

impl FakeTable {
    fn row_for(&self, user_id: Uuid) -> Option<ProfileRecord> {
        self.rows
            .lock()
            .expect("rows")
            .iter()
            .find(|row| row.user_id == user_id)
            .cloned()
    }

    fn check_failure(&self) -> Result<(), BackendError> {
        if self.fail_all {
            Err(BackendError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

fn apply_changes(record: &mut ProfileRecord, changes: &ProfileChanges) {
    if let Some(value) = &changes.email {
        record.email = Some(value.clone());
    }
    if let Some(value) = &changes.username {
        record.username = Some(value.clone());
    }
    if let Some(value) = &changes.full_name {
        record.full_name = Some(value.clone());
    }
    if let Some(value) = &changes.provider {
        record.provider = Some(value.clone());
    }
    if let Some(value) = &changes.google_id {
        record.google_id = Some(value.clone());
    }
    if let Some(value) = &changes.picture_url {
        record.picture_url = Some(value.clone());
    }
    if let Some(value) = &changes.role {
        record.role = Some(value.clone());
    }
    if let Some(value) = changes.is_active {
        record.is_active = Some(value);
    }
    if let Some(value) = changes.email_verified {
        record.email_verified = Some(value);
    }
    if let Some(value) = changes.household_members {
        record.household_members = value;
    }
    if let Some(value) = changes.monthly_income {
        record.monthly_income = value;
    }
    if let Some(value) = changes.has_debt {
        record.has_debt = value;
    }
    if let Some(value) = changes.debt_amount {
        record.debt_amount = value;
    }
    if let Some(value) = &changes.savings_goal {
        record.savings_goal = value.clone();
    }
    if let Some(value) = &changes.primary_expenses {
        record.primary_expenses = Some(value.clone());
    }
    if let Some(value) = &changes.budgeting_experience {
        record.budgeting_experience = value.clone();
    }
    if let Some(value) = &changes.financial_goals {
        record.financial_goals = Some(value.clone());
    }
    if let Some(value) = changes.onboarding_completed {
        record.onboarding_completed = Some(value);
    }
    if let Some(value) = changes.last_login_at {
        record.last_login_at = Some(value);
    }
    if let Some(value) = changes.created_at {
        record.created_at = Some(value);
    }
    if let Some(value) = changes.updated_at {
        record.updated_at = Some(value);
    }
}

#[async_trait]
impl ProfileTable for FakeTable {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<ProfileRecord>, BackendError> {
        self.check_failure()?;
        Ok(self.row_for(user_id))
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        self.check_failure()?;
        if self.taken_username.as_deref() == Some(username) {
            let mut record = ProfileRecord::default();
            record.user_id = Uuid::new_v4();
            record.username = Some(username.to_string());
            return Ok(Some(record));
        }
        Ok(self
            .rows
            .lock()
            .expect("rows")
            .iter()
            .find(|row| row.username.as_deref() == Some(username))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<ProfileRecord>, BackendError> {
        self.check_failure()?;
        Ok(self
            .rows
            .lock()
            .expect("rows")
            .iter()
            .find(|row| row.email.as_deref() == Some(email))
            .cloned())
    }

    async fn upsert(&self, changes: &ProfileChanges) -> Result<(), BackendError> {
        self.check_failure()?;

        if let (Some(taken), Some(username)) = (&self.taken_username, &changes.username) {
            if taken == username {
                return Err(BackendError::Http {
                    status: 409,
                    message: format!(
                        "duplicate key value violates unique constraint: username {username}"
                    ),
                    code: Some("23505".to_string()),
                });
            }
        }

        let user_id = changes
            .user_id
            .ok_or_else(|| BackendError::Parse("upsert without user_id".to_string()))?;

        let mut rows = self.rows.lock().expect("rows");
        if let Some(existing) = rows.iter_mut().find(|row| row.user_id == user_id) {
            apply_changes(existing, changes);
        } else {
            let mut record = ProfileRecord::default();
            record.id = Some(rows.len() as i64 + 1);
            record.user_id = user_id;
            apply_changes(&mut record, changes);
            rows.push(record);
        }

        Ok(())
    }

    async fn update_by_user_id(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        self.check_failure()?;

        let mut rows = self.rows.lock().expect("rows");
        match rows.iter_mut().find(|row| row.user_id == user_id) {
            Some(existing) => {
                apply_changes(existing, changes);
                Ok(Some(existing.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_by_email(
        &self,
        email: &str,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        self.check_failure()?;

        let mut rows = self.rows.lock().expect("rows");
        match rows.iter_mut().find(|row| row.email.as_deref() == Some(email)) {
            Some(existing) => {
                apply_changes(existing, changes);
                Ok(Some(existing.clone()))
            }
            None => Ok(None),
        }
    }

    async fn insert(&self, changes: &ProfileChanges) -> Result<ProfileRecord, BackendError> {
        self.check_failure()?;

        let mut rows = self.rows.lock().expect("rows");
        let mut record = ProfileRecord::default();
        record.id = Some(rows.len() as i64 + 1);
        record.user_id = changes.user_id.unwrap_or_else(Uuid::new_v4);
        apply_changes(&mut record, changes);
        rows.push(record.clone());

        Ok(record)
    }
}

fn service_with(
    backend: FakeBackend,
    table: FakeTable,
) -> (AuthService, Arc<FakeTable>, SessionStore) {
    let table = Arc::new(table);
    let store = SessionStore::new();
    let service = AuthService::new(
        Arc::new(backend),
        table.clone(),
        store.clone(),
        SITE_URL,
    );
    (service, table, store)
}

#[tokio::test]
async fn sign_up_without_session_is_confirmation_pending() {
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        ..FakeBackend::default()
    };
    let (service, table, store) = service_with(backend, FakeTable::default());

    // The reference credential scores full marks locally before submission.
    assert_eq!(service.validate_password("Aa1!aaaa").score, 100);

    let outcome = service
        .sign_up("a@b.com", "Aa1!aaaa", "Ada Lovelace", "ada")
        .await
        .expect("sign up");

    match outcome {
        SignUpOutcome::ConfirmationPending { user, message } => {
            assert_eq!(user.email.as_deref(), Some("a@b.com"));
            assert_eq!(message, CONFIRMATION_PENDING_MESSAGE);
        }
        SignUpOutcome::Authenticated { .. } => panic!("expected confirmation pending"),
    }

    // No session means no navigation: the store stays unauthenticated.
    assert!(store.snapshot().session.is_none());

    // The identity row was still seeded.
    let row = table
        .rows
        .lock()
        .expect("rows")
        .first()
        .cloned()
        .expect("identity row");
    assert_eq!(row.username.as_deref(), Some("ada"));
    assert_eq!(row.onboarding_completed, Some(false));
    assert_eq!(row.role.as_deref(), Some("user"));
}

#[tokio::test]
async fn sign_up_with_session_authenticates_immediately() {
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        grant_session_on_signup: true,
        ..FakeBackend::default()
    };
    let (service, _table, store) = service_with(backend, FakeTable::default());

    let outcome = service
        .sign_up("a@b.com", "Aa1!aaaa", "Ada Lovelace", "ada")
        .await
        .expect("sign up");

    assert!(matches!(outcome, SignUpOutcome::Authenticated { .. }));

    let state = store.snapshot();
    assert!(state.session.is_some());
    assert_eq!(
        AuthPhase::derive(&state),
        AuthPhase::AuthenticatedIncomplete
    );
}

#[tokio::test]
async fn sign_up_surfaces_username_taken() {
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        ..FakeBackend::default()
    };
    let table = FakeTable {
        taken_username: Some("ada".to_string()),
        ..FakeTable::default()
    };
    let (service, _table, _store) = service_with(backend, table);

    let err = service
        .sign_up("a@b.com", "Aa1!aaaa", "Ada Lovelace", "ada")
        .await
        .expect_err("conflict");

    assert_eq!(err.to_string(), "Username is already taken");
}

#[tokio::test]
async fn sign_in_classifies_invalid_credentials() {
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        sign_in_error: Some("Invalid login credentials".to_string()),
        ..FakeBackend::default()
    };
    let (service, _table, store) = service_with(backend, FakeTable::default());

    let err = service.sign_in("a@b.com", "wrong").await.expect_err("err");
    assert_eq!(
        err.to_string(),
        "Invalid email or password. Please check your credentials and try again."
    );
    assert!(store.snapshot().session.is_none());
}

#[tokio::test]
async fn sign_in_unrecognized_error_passes_through_verbatim() {
    let raw = "flux capacitor depleted (code 88)";
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        sign_in_error: Some(raw.to_string()),
        ..FakeBackend::default()
    };
    let (service, _table, _store) = service_with(backend, FakeTable::default());

    let err = service.sign_in("a@b.com", "pw").await.expect_err("err");
    assert_eq!(err.to_string(), raw);
}

#[tokio::test]
async fn sign_in_updates_store_synchronously_and_stamps_last_login() {
    let user_id = Uuid::new_v4();
    let backend = FakeBackend {
        user_id,
        ..FakeBackend::default()
    };
    let (service, table, store) = service_with(backend, FakeTable::default());

    let user = service.sign_in("a@b.com", "Aa1!aaaa").await.expect("user");
    assert_eq!(user.id, user_id);

    // Store is written within the call, not only via the notification.
    let state = store.snapshot();
    assert!(!state.loading);
    assert_eq!(state.session.as_ref().map(|s| s.user.id), Some(user_id));

    let row = table.row_for(user_id).expect("identity row");
    assert!(row.last_login_at.is_some());
    assert_eq!(row.email_verified, Some(true));
}

#[tokio::test]
async fn sign_in_succeeds_even_when_bookkeeping_fails() {
    let user_id = Uuid::new_v4();
    let backend = FakeBackend {
        user_id,
        ..FakeBackend::default()
    };
    let table = FakeTable {
        fail_all: true,
        ..FakeTable::default()
    };
    let (service, _table, store) = service_with(backend, table);

    service.sign_in("a@b.com", "Aa1!aaaa").await.expect("user");
    assert!(store.snapshot().session.is_some());
}

#[tokio::test]
async fn sign_out_clears_store_even_if_backend_fails() {
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        fail_sign_out: true,
        ..FakeBackend::default()
    };
    let (service, _table, store) = service_with(backend, FakeTable::default());

    service.sign_in("a@b.com", "pw").await.expect("signed in");
    assert!(store.snapshot().session.is_some());

    let result = service.sign_out().await;
    assert!(result.is_err());
    // The local clear is unconditional.
    assert!(store.snapshot().session.is_none());
}

#[tokio::test]
async fn initialize_failure_means_no_session() {
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        fail_get_session: true,
        ..FakeBackend::default()
    };
    let (service, _table, store) = service_with(backend, FakeTable::default());

    assert!(store.snapshot().loading);
    service.initialize().await;

    let state = store.snapshot();
    assert!(!state.loading);
    assert!(state.session.is_none());
    assert_eq!(AuthPhase::derive(&state), AuthPhase::Anonymous);
}

#[tokio::test]
async fn recovery_link_in_fragment_hydrates_session() {
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        ..FakeBackend::default()
    };
    let (service, _table, store) = service_with(backend, FakeTable::default());

    let url = Url::parse(
        "https://app.expenseai.dev/reset-password#access_token=at9&refresh_token=rt9&type=recovery",
    )
    .expect("url");

    let tokens = RecoveryTokens::from_url(&url).expect("tokens in fragment");
    service
        .recover_session(&tokens)
        .await
        .expect("recovery session");

    // Straight to the new-password form: a session exists without any
    // email-entry step.
    let state = store.snapshot();
    let session = state.session.expect("session");
    assert_eq!(session.access_token, "at9");
    assert_eq!(session.refresh_token, "rt9");

    service.update_password("NewAa1!aaaa").await.expect("update");
}

#[tokio::test]
async fn verify_otp_signs_in() {
    let user_id = Uuid::new_v4();
    let backend = FakeBackend {
        user_id,
        ..FakeBackend::default()
    };
    let (service, _table, store) = service_with(backend, FakeTable::default());

    service.send_otp("a@b.com").await.expect("otp sent");
    let user = service.verify_otp("a@b.com", "123456").await.expect("user");

    assert_eq!(user.id, user_id);
    assert!(store.snapshot().session.is_some());
}

#[tokio::test]
async fn google_sign_in_returns_authorize_url_immediately() {
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        ..FakeBackend::default()
    };
    let (service, _table, store) = service_with(backend, FakeTable::default());

    let url = service.sign_in_with_google().expect("authorize url");
    assert!(url.query().unwrap_or_default().contains("provider=google"));

    // Completion is observed via the store later, never via this call.
    assert!(store.snapshot().session.is_none());
}

#[tokio::test]
async fn validate_username_checks_format_then_availability() {
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        ..FakeBackend::default()
    };
    let table = FakeTable {
        taken_username: Some("ada".to_string()),
        ..FakeTable::default()
    };
    let (service, _table, _store) = service_with(backend, table);

    // Bad format short-circuits without touching the table.
    let bad = service.validate_username("1abc").await;
    assert!(!bad.available);

    let taken = service.validate_username("ada").await;
    assert!(!taken.available);
    assert_eq!(taken.message.as_deref(), Some("Username is already taken"));

    let free = service.validate_username("grace").await;
    assert!(free.available);
}

#[tokio::test]
async fn validate_username_swallows_lookup_failures() {
    let backend = FakeBackend {
        user_id: Uuid::new_v4(),
        ..FakeBackend::default()
    };
    let table = FakeTable {
        fail_all: true,
        ..FakeTable::default()
    };
    let (service, _table, _store) = service_with(backend, table);

    // Transient errors must not block typing: "no opinion" is available.
    let result = service.validate_username("grace").await;
    assert!(result.available);
}

#[tokio::test]
async fn save_profile_completes_onboarding_and_update_never_touches_it() {
    let user_id = Uuid::new_v4();
    let backend = FakeBackend {
        user_id,
        ..FakeBackend::default()
    };
    let (auth, table, store) = service_with(backend, FakeTable::default());

    auth.sign_in("a@b.com", "Aa1!aaaa").await.expect("signed in");
    assert_eq!(
        AuthPhase::derive(&store.snapshot()),
        AuthPhase::AuthenticatedIncomplete
    );

    let profiles = ProfileService::new(table.clone(), store.clone());

    let form = QuestionnaireForm {
        household_members: "2".to_string(),
        monthly_income: "3000".to_string(),
        has_debt: "no".to_string(),
        ..QuestionnaireForm::default()
    };

    let saved = profiles.save_profile(&form, user_id).await.expect("saved");
    assert_eq!(saved.onboarding_completed, Some(true));
    assert_eq!(saved.email.as_deref(), Some("a@b.com"));

    // The session projection refreshed: the gate now routes to dashboard.
    let state = store.snapshot();
    assert_eq!(AuthPhase::derive(&state), AuthPhase::AuthenticatedComplete);
    assert_eq!(
        guards::route(AuthPhase::derive(&state), paths::DASHBOARD, false),
        RouteAction::Render
    );

    // A later update must not clear the flag, even if the caller tries.
    let sneaky = ProfileChanges {
        monthly_income: Some(Some(3500.0)),
        onboarding_completed: Some(false),
        ..ProfileChanges::default()
    };
    let updated = profiles
        .update_profile(user_id, &sneaky)
        .await
        .expect("update")
        .expect("row");

    assert_eq!(updated.monthly_income, Some(3500.0));
    assert_eq!(updated.onboarding_completed, Some(true));

    assert_eq!(
        profiles.onboarding_status(user_id).await.expect("status"),
        true
    );
}

#[tokio::test]
async fn formatted_profile_round_trips_saved_answers() {
    let user_id = Uuid::new_v4();
    let backend = FakeBackend {
        user_id,
        ..FakeBackend::default()
    };
    let (_auth, table, store) = service_with(backend, FakeTable::default());
    let profiles = ProfileService::new(table, store);

    assert!(profiles
        .get_formatted_profile(user_id)
        .await
        .expect("lookup")
        .is_none());

    let form = QuestionnaireForm {
        household_members: "4".to_string(),
        monthly_income: "5250.5".to_string(),
        has_debt: "yes".to_string(),
        debt_amount: "900".to_string(),
        savings_goal: "House deposit".to_string(),
        primary_expenses: vec!["rent".to_string()],
        budgeting_experience: "intermediate".to_string(),
        financial_goals: vec!["invest".to_string()],
    };

    profiles.save_profile(&form, user_id).await.expect("saved");

    let loaded = profiles
        .get_formatted_profile(user_id)
        .await
        .expect("lookup")
        .expect("form");
    assert_eq!(loaded, form);
}
