use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::api::auth::AuthSession;
use crate::api::models::CreateGroupRequest;
use crate::api::AppState;
use crate::errors::DeskError;

/// Looks up the agent group named after the caller. Returns `null` when
/// the user has no group yet, so the dashboard knows to create one.
pub async fn list_groups(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Value>, DeskError> {
    let group = state
        .scanner
        .find_agent_group(&auth.scanner_token, &auth.username)
        .await?;
    Ok(Json(group.unwrap_or(Value::Null)))
}

/// Creates the named agent group, reusing an existing one with the same
/// name rather than duplicating it.
pub async fn create_group(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Json<Value>, DeskError> {
    let name = req
        .group_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| DeskError::MalformedInput("group_name is required".to_string()))?;
    let group = state
        .scanner
        .ensure_agent_group(&auth.scanner_token, name)
        .await?;
    Ok(Json(group))
}

/// Group detail, including its agent roster.
pub async fn group_details(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(group_id): Path<i64>,
) -> Result<Json<Value>, DeskError> {
    let group = state
        .scanner
        .agent_group_details(&auth.scanner_token, group_id)
        .await?;
    Ok(Json(group))
}

/// Unassigns an agent from a group.
pub async fn remove_agent(
    State(state): State<AppState>,
    auth: AuthSession,
    Path((group_id, agent_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, DeskError> {
    state
        .scanner
        .remove_agent(&auth.scanner_token, group_id, agent_id)
        .await?;
    Ok(Json(json!({ "message": "Agent removed successfully" })))
}
