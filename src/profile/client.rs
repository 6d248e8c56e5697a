//! Row operations on the identity/profile table.
//!
//! The hosted service exposes the table over REST with equality filters and
//! an `on_conflict` upsert target. The trait keeps the orchestrator and the
//! relay independent of the wire; the HTTP implementation below is the only
//! code that knows the filter syntax.

use crate::auth::capability::BackendError;
use crate::auth::client::endpoint_url;
use crate::profile::types::{ProfileChanges, ProfileRecord};
use crate::APP_USER_AGENT;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use uuid::Uuid;

const REST_PREFIX: &str = "/rest/v1";
const TABLE: &str = "user_profiles";

/// Identity/profile table capability: select, upsert (conflict target
/// `user_id`), and update, filtered by equality.
#[async_trait]
pub trait ProfileTable: Send + Sync {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<ProfileRecord>, BackendError>;

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ProfileRecord>, BackendError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<ProfileRecord>, BackendError>;

    /// Insert-or-update keyed on `user_id`. A username-uniqueness conflict
    /// surfaces as an HTTP error carrying the provider's code.
    async fn upsert(&self, changes: &ProfileChanges) -> Result<(), BackendError>;

    async fn update_by_user_id(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileRecord>, BackendError>;

    async fn update_by_email(
        &self,
        email: &str,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileRecord>, BackendError>;

    async fn insert(&self, changes: &ProfileChanges) -> Result<ProfileRecord, BackendError>;
}

pub struct HostedProfileTable {
    http: Client,
    base_url: String,
    api_key: SecretString,
}

impl HostedProfileTable {
    /// # Errors
    /// Returns a config error when the base URL does not parse or the HTTP
    /// client cannot be constructed.
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, BackendError> {
        endpoint_url(base_url, REST_PREFIX)?;

        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .map_err(|err| BackendError::Config(format!("Error creating HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key,
        })
    }

    fn table_url(&self) -> Result<String, BackendError> {
        endpoint_url(&self.base_url, &format!("{REST_PREFIX}/{TABLE}"))
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(self.api_key.expose_secret())
    }

    async fn select_one(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        let url = self.table_url()?;
        let filter = format!("eq.{value}");
        let response = self
            .authed(self.http.get(&url))
            .query(&[("select", "*"), (column, filter.as_str()), ("limit", "1")])
            .send()
            .await
            .map_err(network_error)?;

        let rows: Vec<ProfileRecord> = decode_rows(response).await?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl ProfileTable for HostedProfileTable {
    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Option<ProfileRecord>, BackendError> {
        self.select_one("user_id", &user_id.to_string()).await
    }

    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        self.select_one("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<ProfileRecord>, BackendError> {
        self.select_one("email", email).await
    }

    async fn upsert(&self, changes: &ProfileChanges) -> Result<(), BackendError> {
        let url = self.table_url()?;
        let response = self
            .authed(self.http.post(&url))
            .query(&[("on_conflict", "user_id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(changes)
            .send()
            .await
            .map_err(network_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn update_by_user_id(
        &self,
        user_id: Uuid,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        let url = self.table_url()?;
        let response = self
            .authed(self.http.patch(&url))
            .query(&[("user_id", format!("eq.{user_id}").as_str())])
            .header("Prefer", "return=representation")
            .json(changes)
            .send()
            .await
            .map_err(network_error)?;

        let rows: Vec<ProfileRecord> = decode_rows(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn update_by_email(
        &self,
        email: &str,
        changes: &ProfileChanges,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        let url = self.table_url()?;
        let response = self
            .authed(self.http.patch(&url))
            .query(&[("email", format!("eq.{email}").as_str())])
            .header("Prefer", "return=representation")
            .json(changes)
            .send()
            .await
            .map_err(network_error)?;

        let rows: Vec<ProfileRecord> = decode_rows(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, changes: &ProfileChanges) -> Result<ProfileRecord, BackendError> {
        let url = self.table_url()?;
        let response = self
            .authed(self.http.post(&url))
            .header("Prefer", "return=representation")
            .json(changes)
            .send()
            .await
            .map_err(network_error)?;

        let rows: Vec<ProfileRecord> = decode_rows(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Parse("Insert returned no row".to_string()))
    }
}

fn network_error(err: reqwest::Error) -> BackendError {
    BackendError::Network(format!("Unable to reach the server: {err}"))
}

async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let fallback = status.to_string();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(&fallback)
        .to_string();
    let code = body
        .get("code")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    BackendError::Http {
        status: status.as_u16(),
        message,
        code,
    }
}

async fn decode_rows(response: Response) -> Result<Vec<ProfileRecord>, BackendError> {
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(Vec::new());
    }
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    response
        .json()
        .await
        .map_err(|err| BackendError::Parse(format!("Failed to decode rows: {err}")))
}
