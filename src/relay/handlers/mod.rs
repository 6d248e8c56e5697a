pub mod health;
pub use self::health::health;

pub mod google;
pub use self::google::google;

pub mod google_code;
pub use self::google_code::google_code;

// common functions for the handlers
use crate::cli::globals::GlobalArgs;
use crate::profile::{ProfileChanges, ProfileRecord, ProfileTable};
use crate::relay::token::{self, SessionTokenClaims};
use crate::APP_USER_AGENT;
use anyhow::{anyhow, Result};
use chrono::Utc;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, instrument};

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Google account facts the relay cares about, however they were obtained.
#[derive(Clone, Debug)]
pub struct GoogleProfile {
    pub google_id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub picture: Option<String>,
    pub email_verified: bool,
}

fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(APP_USER_AGENT)
        .build()
        .map_err(|err| anyhow!("Error creating HTTP client: {err}"))
}

/// Verifies a Google ID token against the tokeninfo endpoint and checks the
/// audience matches the configured client id.
#[instrument(skip_all)]
pub async fn verify_id_token(globals: &GlobalArgs, credential: &str) -> Result<GoogleProfile> {
    let client = http_client()?;

    let response = client
        .get(GOOGLE_TOKENINFO_URL)
        .query(&[("id_token", credential)])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        error!("Google token validation failed: {status}");
        return Err(anyhow!("Google token validation failed: {status}"));
    }

    let payload: Value = response.json().await?;

    let audience = payload["aud"].as_str().unwrap_or_default();
    if audience != globals.google_client_id {
        error!("Google token audience mismatch");
        return Err(anyhow!("Google token audience mismatch"));
    }

    let email = payload["email"]
        .as_str()
        .ok_or_else(|| anyhow!("Error parsing token info: no email found"))?
        .to_string();

    debug!("Google token verified for {email}");

    Ok(GoogleProfile {
        google_id: payload["sub"].as_str().unwrap_or_default().to_string(),
        email,
        full_name: payload["name"].as_str().map(ToString::to_string),
        picture: payload["picture"].as_str().map(ToString::to_string),
        // tokeninfo reports booleans as strings
        email_verified: payload["email_verified"].as_str() == Some("true")
            || payload["email_verified"].as_bool() == Some(true),
    })
}

/// Exchanges an authorization code for an access token.
#[instrument(skip_all)]
pub async fn exchange_code(globals: &GlobalArgs, code: &str) -> Result<String> {
    let client = http_client()?;

    let response = client
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("client_id", globals.google_client_id.as_str()),
            (
                "client_secret",
                globals.google_client_secret.expose_secret(),
            ),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", "postmessage"),
        ])
        .send()
        .await?;

    let tokens: Value = response.json().await?;

    tokens["access_token"].as_str().map_or_else(
        || {
            error!("Failed to get access token: {tokens}");
            Err(anyhow!("Failed to exchange code for tokens"))
        },
        |token| Ok(token.to_string()),
    )
}

/// Fetches the account behind an access token.
#[instrument(skip_all)]
pub async fn fetch_user_info(access_token: &str) -> Result<GoogleProfile> {
    let client = http_client()?;

    let response = client
        .get(GOOGLE_USERINFO_URL)
        .query(&[("access_token", access_token)])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(anyhow!("Failed to fetch user info: {}", response.status()));
    }

    let payload: Value = response.json().await?;

    let email = payload["email"]
        .as_str()
        .ok_or_else(|| anyhow!("Error parsing user info: no email found"))?
        .to_string();

    Ok(GoogleProfile {
        google_id: payload["id"].as_str().unwrap_or_default().to_string(),
        email,
        full_name: payload["name"].as_str().map(ToString::to_string),
        picture: payload["picture"].as_str().map(ToString::to_string),
        email_verified: payload["verified_email"].as_bool().unwrap_or(true),
    })
}

/// Upserts the identity row by email: existing accounts get their Google
/// facts refreshed, new accounts start with onboarding incomplete.
pub async fn sync_identity(
    profiles: &Arc<dyn ProfileTable>,
    account: &GoogleProfile,
) -> Result<ProfileRecord, crate::auth::BackendError> {
    let now = Utc::now();

    if let Some(_existing) = profiles.find_by_email(&account.email).await? {
        let changes = ProfileChanges {
            full_name: account.full_name.clone(),
            picture_url: account.picture.clone(),
            provider: Some("google".to_string()),
            google_id: Some(account.google_id.clone()),
            email_verified: Some(account.email_verified),
            updated_at: Some(now),
            ..ProfileChanges::default()
        };

        let updated = profiles.update_by_email(&account.email, &changes).await?;
        updated.ok_or_else(|| {
            crate::auth::BackendError::Parse("Update returned no row".to_string())
        })
    } else {
        let row = ProfileChanges {
            email: Some(account.email.clone()),
            full_name: account.full_name.clone(),
            picture_url: account.picture.clone(),
            provider: Some("google".to_string()),
            google_id: Some(account.google_id.clone()),
            email_verified: Some(account.email_verified),
            onboarding_completed: Some(false),
            created_at: Some(now),
            updated_at: Some(now),
            ..ProfileChanges::default()
        };

        profiles.insert(&row).await
    }
}

/// The `{success, data: {user, token}}` payload both Google endpoints
/// return; user fields are camelCase for the frontend.
pub fn auth_success_body(
    globals: &GlobalArgs,
    record: &ProfileRecord,
    picture: Option<&str>,
) -> Result<Value, token::Error> {
    let subject = record
        .id
        .map(|id| id.to_string())
        .unwrap_or_else(|| record.user_id.to_string());
    let email = record.email.clone().unwrap_or_default();

    let claims = SessionTokenClaims::new(
        subject,
        email.clone(),
        "google".to_string(),
        globals.session_ttl_days,
    );
    let signed = token::sign(&claims, globals.session_secret.expose_secret().as_bytes())?;

    Ok(json!({
        "success": true,
        "data": {
            "user": {
                "id": record.id,
                "email": email,
                "fullName": record.full_name,
                "picture": picture.map(ToString::to_string).or_else(|| record.picture_url.clone()),
                "onboardingCompleted": record.onboarding_completed.unwrap_or(false),
                "provider": record.provider.clone().unwrap_or_else(|| "google".to_string()),
            },
            "token": signed,
        }
    }))
}
