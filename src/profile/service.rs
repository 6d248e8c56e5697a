//! Profile operations over the table capability.
//!
//! `save_profile` is the questionnaire-completion path: it always marks
//! onboarding complete and refreshes the session's cached projection.
//! `update_profile` patches columns and never touches the flag. The table
//! column is the source of truth for onboarding; the session metadata is a
//! cached projection of it.

use crate::auth::capability::BackendError;
use crate::auth::state::SessionStore;
use crate::auth::types::AuthChange;
use crate::profile::client::ProfileTable;
use crate::profile::types::{
    form_to_changes, record_to_form, ProfileChanges, ProfileRecord, QuestionnaireForm,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct ProfileService {
    table: Arc<dyn ProfileTable>,
    store: SessionStore,
}

impl ProfileService {
    #[must_use]
    pub fn new(table: Arc<dyn ProfileTable>, store: SessionStore) -> Self {
        Self { table, store }
    }

    /// Raw profile row for a user, if one exists.
    pub async fn get_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        self.table.find_by_user_id(user_id).await
    }

    /// Saves the whole questionnaire. Update-then-insert keyed on the user
    /// id, always completing onboarding; the session email rides along when
    /// present so a NOT NULL email column stays satisfied.
    #[instrument(skip_all, fields(%user_id))]
    pub async fn save_profile(
        &self,
        form: &QuestionnaireForm,
        user_id: Uuid,
    ) -> Result<ProfileRecord, BackendError> {
        let mut changes = form_to_changes(form, user_id, true);
        changes.updated_at = Some(Utc::now());

        if let Some(session) = self.store.snapshot().session {
            if session.user.id == user_id {
                changes.email = session.user.email.clone();
            }
        }

        let saved = match self.table.update_by_user_id(user_id, &changes).await? {
            Some(record) => record,
            None => {
                debug!("no profile row yet, inserting");
                changes.created_at = Some(Utc::now());
                self.table.insert(&changes).await?
            }
        };

        self.refresh_session_projection();

        Ok(saved)
    }

    /// Patches specific columns. The onboarding flag is deliberately left
    /// untouched whatever the caller passes in `updates` carries.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        updates: &ProfileChanges,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        let mut changes = updates.clone();
        changes.onboarding_completed = None;
        changes.updated_at = Some(Utc::now());

        self.table.update_by_user_id(user_id, &changes).await
    }

    /// Questionnaire-shaped view of the stored row.
    pub async fn get_formatted_profile(
        &self,
        user_id: Uuid,
    ) -> Result<Option<QuestionnaireForm>, BackendError> {
        Ok(self
            .get_profile(user_id)
            .await?
            .as_ref()
            .map(record_to_form))
    }

    /// Onboarding status read from the source of truth (the table).
    pub async fn onboarding_status(&self, user_id: Uuid) -> Result<bool, BackendError> {
        Ok(self
            .get_profile(user_id)
            .await?
            .and_then(|record| record.onboarding_completed)
            .unwrap_or(false))
    }

    /// After a successful save the cached projection on the session is
    /// stale; republish the session with the flag set so gates re-derive.
    fn refresh_session_projection(&self) {
        let snapshot = self.store.snapshot();
        if let Some(mut session) = snapshot.session {
            if !session.user.onboarding_completed() {
                session.user.set_onboarding_completed(true);
                self.store.apply(AuthChange::UserUpdated, Some(session));
            }
        }
    }
}
