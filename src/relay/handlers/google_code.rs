use crate::cli::globals::GlobalArgs;
use crate::profile::ProfileTable;
use crate::relay::handlers::{auth_success_body, exchange_code, fetch_user_info, sync_identity};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GoogleCodeExchange {
    code: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/google-code",
    request_body = GoogleCodeExchange,
    responses(
        (status = 200, description = "Code exchanged, session token issued"),
        (status = 400, description = "Missing or unexchangeable authorization code"),
        (status = 500, description = "Exchange or profile sync failed"),
    ),
    tag = "auth"
)]
// axum handler for Google authorization-code exchange
#[instrument(skip_all)]
pub async fn google_code(
    profiles: Extension<Arc<dyn ProfileTable>>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<GoogleCodeExchange>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Authorization code is required",
            })),
        );
    };

    if request.code.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Authorization code is required",
            })),
        );
    }

    let access_token = match exchange_code(&globals, &request.code).await {
        Ok(token) => token,
        Err(err) => {
            error!("Google OAuth code exchange error: {err}");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "success": false,
                    "message": "Failed to exchange code for tokens",
                })),
            );
        }
    };

    let account = match fetch_user_info(&access_token).await {
        Ok(account) => account,
        Err(err) => {
            error!("Google user info error: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Google authentication failed",
                })),
            );
        }
    };

    debug!("Google user info retrieved for {}", account.email);

    let record = match sync_identity(&profiles, &account).await {
        Ok(record) => record,
        Err(err) => {
            error!("Error syncing user profile: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": format!("Failed to sync user profile: {err}"),
                })),
            );
        }
    };

    match auth_success_body(&globals, &record, account.picture.as_deref()) {
        Ok(body) => (StatusCode::OK, Json(body)),
        Err(err) => {
            error!("Error signing session token: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Google authentication failed",
                })),
            )
        }
    }
}
