use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use crate::api::auth::AuthSession;
use crate::api::models::{parse_id, CheckExistingQuery, CreateScanRequest};
use crate::api::AppState;
use crate::errors::DeskError;
use crate::scanner::reshape;

/// `POST /api/scans`: creates an agent scan for a server, targeted at the
/// caller's agent group.
pub async fn create_scan(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<CreateScanRequest>,
) -> Result<(StatusCode, Json<Value>), DeskError> {
    let server_name = req
        .server_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let (server_name, folder_id, agent_group_id) =
        match (server_name, req.folder_id(), req.agent_group_id()) {
            (Some(s), Some(f), Some(g)) => (s, f, g),
            _ => {
                return Err(DeskError::MalformedInput(
                    "Missing required parameters".to_string(),
                ))
            }
        };

    let scan = state
        .scanner
        .create_internal_scan(
            &auth.scanner_token,
            &auth.username,
            server_name,
            folder_id,
            agent_group_id,
        )
        .await?;
    info!(server = %server_name, user = %auth.username, "scan created");
    Ok((StatusCode::CREATED, Json(scan)))
}

/// `GET /api/scans/check-existing`: duplicate probe before creating a
/// scan, matching on exact name within the folder.
pub async fn check_existing(
    State(state): State<AppState>,
    auth: AuthSession,
    Query(query): Query<CheckExistingQuery>,
) -> Result<Json<Value>, DeskError> {
    let agent_name = query
        .agent_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let folder_id = query.folder_id.as_deref().and_then(parse_id);
    let (agent_name, folder_id) = match (agent_name, folder_id) {
        (Some(n), Some(f)) => (n, f),
        _ => {
            return Err(DeskError::MalformedInput(
                "Missing required parameters".to_string(),
            ))
        }
    };

    let scan = state
        .scanner
        .find_scan_exact(&auth.scanner_token, folder_id, agent_name)
        .await?;
    Ok(Json(json!({
        "exists": scan.is_some(),
        "scan": scan.unwrap_or(Value::Null),
    })))
}

/// `GET /api/scans/status/{scan_id}`: condensed status for polling. A
/// queued agent scan reports as `pending` until progress begins.
pub async fn scan_status(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(scan_id): Path<i64>,
) -> Result<Json<Value>, DeskError> {
    let details = state
        .scanner
        .scan_details(&auth.scanner_token, scan_id)
        .await?;
    Ok(Json(reshape::status_report(&details)))
}

/// `GET /api/scans/find/{server_name}`: substring lookup across all
/// folders, used by the dashboard to locate a server's scan.
pub async fn find_scan(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(server_name): Path<String>,
) -> Result<Json<Value>, DeskError> {
    let scan = state
        .scanner
        .find_scan_by_name(&auth.scanner_token, None, &server_name)
        .await?
        .ok_or_else(|| DeskError::NotFound("Scan not found".to_string()))?;
    Ok(Json(scan))
}

pub async fn launch_scan(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(scan_id): Path<i64>,
) -> Result<Json<Value>, DeskError> {
    state
        .scanner
        .launch_scan(&auth.scanner_token, scan_id)
        .await?;
    info!(scan_id, user = %auth.username, "scan launched");
    Ok(Json(json!({ "message": "Scan launched successfully" })))
}

pub async fn stop_scan(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(scan_id): Path<i64>,
) -> Result<Json<Value>, DeskError> {
    state
        .scanner
        .stop_scan(&auth.scanner_token, scan_id)
        .await?;
    info!(scan_id, user = %auth.username, "scan stopped");
    Ok(Json(json!({ "message": "Scan stopped successfully" })))
}
