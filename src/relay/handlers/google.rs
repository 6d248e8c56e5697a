use crate::cli::globals::GlobalArgs;
use crate::profile::ProfileTable;
use crate::relay::handlers::{auth_success_body, sync_identity, verify_id_token};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct GoogleSignIn {
    credential: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/google",
    request_body = GoogleSignIn,
    responses(
        (status = 200, description = "Credential verified, session token issued"),
        (status = 400, description = "Missing Google credential"),
        (status = 500, description = "Verification or profile sync failed"),
    ),
    tag = "auth"
)]
// axum handler for Google ID-token sign-in
#[instrument(skip_all)]
pub async fn google(
    profiles: Extension<Arc<dyn ProfileTable>>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<GoogleSignIn>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Google credential is required",
            })),
        );
    };

    if request.credential.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Google credential is required",
            })),
        );
    }

    let account = match verify_id_token(&globals, &request.credential).await {
        Ok(account) => account,
        Err(err) => {
            error!("Google OAuth error: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Google authentication failed",
                })),
            );
        }
    };

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

    debug!("Google sign-in for {:?}", record.email);

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
