//! Login, logout and session lookup

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::ApiJson;
use crate::AppState;
use noe_common::{
    auth::{AuthSession, Session},
    errors::Result,
    response::ApiResponse,
};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 200))]
    pub username: String,

    #[validate(length(min = 1, max = 1000))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>> {
    request.validate()?;

    let issued = state.sessions.login(&request.username, &request.password).await?;

    Ok(ApiResponse::ok(LoginResponse {
        token: issued.token,
        username: issued.session.username,
        expires_at: issued.session.expires_at,
    })
    .with_message("Login successful"))
}

/// End the caller's session
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<ApiResponse<()>> {
    state.sessions.logout(&auth.token).await;
    tracing::info!(username = %auth.session.username, "Session closed");

    Ok(ApiResponse::ok(()).with_message("Logged out"))
}

/// The caller's session
pub async fn me(auth: AuthSession) -> Json<ApiResponse<Session>> {
    Json(ApiResponse::ok(auth.session))
}
