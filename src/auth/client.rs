//! HTTP implementation of the hosted auth capability.
//!
//! Talks to the service's REST surface with an API key header plus, where a
//! subject is required, a bearer token. The client keeps the most recently
//! issued token pair so `get_session` can answer locally and refresh an
//! expired session with the refresh-token grant.

use crate::auth::capability::{AuthBackend, BackendError};
use crate::auth::types::{AuthUser, OtpType, Session, SignUpPayload};
use crate::APP_USER_AGENT;
use async_trait::async_trait;
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, instrument};
use url::Url;

const AUTH_PREFIX: &str = "/auth/v1";
const OAUTH_STATE_LENGTH: usize = 16;

pub struct HostedAuthClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    session: Mutex<Option<Session>>,
}

impl HostedAuthClient {
    /// # Errors
    /// Returns a config error when the base URL does not parse or the HTTP
    /// client cannot be constructed.
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self, BackendError> {
        // Validate early so every later call can assume a good base.
        endpoint_url(base_url, AUTH_PREFIX)?;

        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .map_err(|err| BackendError::Config(format!("Error creating HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            api_key,
            session: Mutex::new(None),
        })
    }

    fn url(&self, endpoint: &str) -> Result<String, BackendError> {
        endpoint_url(&self.base_url, &format!("{AUTH_PREFIX}{endpoint}"))
    }

    fn with_api_key(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", self.api_key.expose_secret())
    }

    async fn store_session(&self, session: Session) -> Session {
        let mut slot = self.session.lock().await;
        *slot = Some(session.clone());
        session
    }

    async fn bearer(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let url = self.url("/token")?;
        let response = self
            .with_api_key(self.http.post(&url))
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(network_error)?;

        let body = success_json(response).await?;
        let session = session_from_value(body)?;
        Ok(self.store_session(session).await)
    }
}

#[async_trait]
impl AuthBackend for HostedAuthClient {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let current = { self.session.lock().await.clone() };

        match current {
            None => Ok(None),
            Some(session) if !session.is_expired() => Ok(Some(session)),
            Some(session) => {
                debug!("session expired, attempting refresh");
                self.refresh(&session.refresh_token).await.map(Some)
            }
        }
    }

    #[instrument(skip_all, fields(email))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Map<String, Value>,
        email_redirect_to: Option<&str>,
    ) -> Result<SignUpPayload, BackendError> {
        let url = self.url("/signup")?;

        let mut request = self.with_api_key(self.http.post(&url)).json(&json!({
            "email": email,
            "password": password,
            "data": metadata,
        }));
        if let Some(redirect) = email_redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }

        let body = success_json(request.send().await.map_err(network_error)?).await?;

        // A session object means the address was pre-confirmed; a bare user
        // means confirmation is pending.
        if body.get("access_token").is_some() {
            let session = session_from_value(body)?;
            let session = self.store_session(session).await;
            return Ok(SignUpPayload {
                user: session.user.clone(),
                session: Some(session),
            });
        }

        let user: AuthUser = serde_json::from_value(body)
            .map_err(|err| BackendError::Parse(format!("Failed to decode user: {err}")))?;
        Ok(SignUpPayload {
            user,
            session: None,
        })
    }

    #[instrument(skip_all, fields(email))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let url = self.url("/token")?;
        let response = self
            .with_api_key(self.http.post(&url))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(network_error)?;

        let body = success_json(response).await?;
        let session = session_from_value(body)?;
        Ok(self.store_session(session).await)
    }

    fn sign_in_with_oauth(
        &self,
        provider: &str,
        redirect_to: Option<&str>,
    ) -> Result<Url, BackendError> {
        let raw = self.url("/authorize")?;
        let mut url = Url::parse(&raw)
            .map_err(|err| BackendError::Config(format!("Error parsing URL: {err}")))?;

        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(OAUTH_STATE_LENGTH)
            .map(char::from)
            .collect();

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("provider", provider);
            pairs.append_pair("state", &state);
            if let Some(redirect) = redirect_to {
                pairs.append_pair("redirect_to", redirect);
            }
        }

        Ok(url)
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = self.bearer().await;
        // Local tokens go away no matter what the service says.
        { self.session.lock().await.take(); }

        let Some(token) = token else {
            return Ok(());
        };

        let url = self.url("/logout")?;
        let response = self
            .with_api_key(self.http.post(&url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(network_error)?;

        success_empty(response).await
    }

    async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError> {
        let url = self.url("/recover")?;
        let response = self
            .with_api_key(self.http.post(&url))
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }))
            .send()
            .await
            .map_err(network_error)?;

        success_empty(response).await
    }

    async fn update_user_password(&self, new_password: &str) -> Result<(), BackendError> {
        let Some(token) = self.bearer().await else {
            return Err(BackendError::Config(
                "Auth session missing: follow the reset link first".to_string(),
            ));
        };

        let url = self.url("/user")?;
        let response = self
            .with_api_key(self.http.put(&url))
            .bearer_auth(token)
            .json(&json!({ "password": new_password }))
            .send()
            .await
            .map_err(network_error)?;

        success_empty(response).await
    }

    async fn sign_in_with_otp(&self, email: &str, redirect_to: &str) -> Result<(), BackendError> {
        let url = self.url("/otp")?;
        let response = self
            .with_api_key(self.http.post(&url))
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email, "create_user": true }))
            .send()
            .await
            .map_err(network_error)?;

        success_empty(response).await
    }

    async fn verify_otp(
        &self,
        email: &str,
        token: &str,
        otp_type: OtpType,
    ) -> Result<Session, BackendError> {
        let url = self.url("/verify")?;
        let response = self
            .with_api_key(self.http.post(&url))
            .json(&json!({
                "email": email,
                "token": token,
                "type": otp_type.as_str(),
            }))
            .send()
            .await
            .map_err(network_error)?;

        let body = success_json(response).await?;
        let session = session_from_value(body)?;
        Ok(self.store_session(session).await)
    }

    async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, BackendError> {
        let url = self.url("/user")?;
        let response = self
            .with_api_key(self.http.get(&url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(network_error)?;

        let body = success_json(response).await?;
        let user: AuthUser = serde_json::from_value(body)
            .map_err(|err| BackendError::Parse(format!("Failed to decode user: {err}")))?;

        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_at: None,
            user,
        };
        Ok(self.store_session(session).await)
    }
}

/// Normalizes a base URL + endpoint into an absolute URL.
pub(crate) fn endpoint_url(base_url: &str, endpoint: &str) -> Result<String, BackendError> {
    let url = Url::parse(base_url)
        .map_err(|err| BackendError::Config(format!("Error parsing URL: {err}")))?;

    let scheme = url.scheme();

    let host = url
        .host()
        .ok_or_else(|| BackendError::Config("Error parsing URL: no host specified".to_string()))?
        .to_owned();

    let port = match url.port() {
        Some(p) => p,
        None => match scheme {
            "http" => 80,
            "https" => 443,
            _ => {
                return Err(BackendError::Config(format!(
                    "Error parsing URL: unsupported scheme {scheme}"
                )))
            }
        },
    };

    Ok(format!("{scheme}://{host}:{port}{endpoint}"))
}

fn network_error(err: reqwest::Error) -> BackendError {
    BackendError::Network(format!("Unable to reach the server: {err}"))
}

/// Provider error payloads vary between `error_description`, `msg`,
/// `message`, and `error`; the first one present wins.
fn extract_message(body: &Value, fallback: &str) -> String {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .unwrap_or(fallback)
        .to_string()
}

fn extract_code(body: &Value) -> Option<String> {
    ["error_code", "code"].iter().find_map(|key| {
        let value = body.get(*key)?;
        match value {
            Value::String(code) => Some(code.clone()),
            Value::Number(code) => Some(code.to_string()),
            _ => None,
        }
    })
}

async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let fallback = status.to_string();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    BackendError::Http {
        status: status.as_u16(),
        message: extract_message(&body, &fallback),
        code: extract_code(&body),
    }
}

async fn success_json(response: Response) -> Result<Value, BackendError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }

    response
        .json()
        .await
        .map_err(|err| BackendError::Parse(format!("Failed to decode response: {err}")))
}

async fn success_empty(response: Response) -> Result<(), BackendError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(response).await)
    }
}

/// Token responses report `expires_in` (seconds); an absolute `expires_at`
/// is synthesized when absent so expiry checks stay local.
fn session_from_value(mut body: Value) -> Result<Session, BackendError> {
    if body.get("expires_at").and_then(Value::as_i64).is_none() {
        if let Some(expires_in) = body.get("expires_in").and_then(Value::as_i64) {
            if let Some(object) = body.as_object_mut() {
                object.insert(
                    "expires_at".to_string(),
                    Value::from(Utc::now().timestamp() + expires_in),
                );
            }
        }
    }

    serde_json::from_value(body)
        .map_err(|err| BackendError::Parse(format!("Failed to decode session: {err}")))
}
