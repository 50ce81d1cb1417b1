use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::api::auth::AuthSession;
use crate::api::models::LoginRequest;
use crate::api::AppState;
use crate::errors::DeskError;

/// Authenticates against the scanner appliance and issues a dashboard
/// session token. The reviewer flag in the response is advisory for the
/// UI; authorization is re-checked on every admin route.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<Value>, DeskError> {
    let username = req
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| DeskError::MalformedInput("username is required".to_string()))?;
    let password = req
        .password
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| DeskError::MalformedInput("password is required".to_string()))?;

    let scanner_token = state.scanner.login(username, password).await?;
    let is_admin = state.scanner.is_admin(&scanner_token).await.unwrap_or(false);
    let token = state.sessions.create(username, &scanner_token);

    info!(username = %username, admin = is_admin, "user logged in");
    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "isAdmin": is_admin,
    })))
}

/// Drops the dashboard session and tears down the scanner session behind
/// it. Scanner-side failures only get logged; the local session is gone
/// either way.
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Value>, DeskError> {
    state.sessions.remove(&auth.token);
    if let Err(e) = state.scanner.logout(&auth.scanner_token).await {
        debug!(username = %auth.username, error = %e, "scanner logout failed");
    }
    info!(username = %auth.username, "user logged out");
    Ok(Json(json!({
        "success": true,
        "message": "Logout successful",
    })))
}
