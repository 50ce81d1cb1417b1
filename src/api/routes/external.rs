use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::auth::AuthSession;
use crate::api::models::{parse_id, CreateExternalScanRequest, ExternalCheckQuery};
use crate::api::AppState;
use crate::errors::DeskError;
use crate::scanner::reshape;

fn folder_id_of(folder: &Value) -> Option<i64> {
    folder.get("id").and_then(Value::as_i64)
}

/// `GET /api/external-scans`: every scan in the external folder with its
/// host severity rollup. An empty list when the folder does not exist
/// yet; scans whose detail fetch fails are skipped.
pub async fn list_external_scans(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Value>, DeskError> {
    let folder = match state.scanner.external_folder(&auth.scanner_token).await? {
        Some(folder) => folder,
        None => return Ok(Json(json!({ "scans": [] }))),
    };
    let folder_id = folder_id_of(&folder)
        .ok_or_else(|| DeskError::Scanner("Folder entry is missing an id".to_string()))?;

    let scans = state
        .scanner
        .list_scans(&auth.scanner_token, Some(folder_id))
        .await?;
    let scanner = &state.scanner;
    let token = &auth.scanner_token;
    let fetches = scans.iter().filter_map(|scan| {
        let scan_id = scan.get("id").and_then(Value::as_i64)?;
        Some(async move { (scan, scan_id, scanner.scan_details(token, scan_id).await) })
    });

    let mut rows = Vec::with_capacity(scans.len());
    for (scan, scan_id, details) in futures::future::join_all(fetches).await {
        match details {
            Ok(details) => rows.push(reshape::scan_overview(scan, &details)),
            Err(e) => warn!(scan_id, error = %e, "skipping scan with unreadable details"),
        }
    }
    Ok(Json(json!({ "scans": rows })))
}

/// `POST /api/external-scans`: creates a network vulnerability scan in
/// the external folder.
pub async fn create_external_scan(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(req): Json<CreateExternalScanRequest>,
) -> Result<(StatusCode, Json<Value>), DeskError> {
    let server_name = req
        .server_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let (server_name, folder_id) = match (server_name, req.folder_id()) {
        (Some(s), Some(f)) => (s, f),
        _ => {
            return Err(DeskError::MalformedInput(
                "Missing required parameters".to_string(),
            ))
        }
    };

    let scan = state
        .scanner
        .create_external_scan(&auth.scanner_token, &auth.username, server_name, folder_id)
        .await?;
    info!(server = %server_name, user = %auth.username, "external scan created");
    Ok((StatusCode::CREATED, Json(scan)))
}

/// `GET /api/external-scans/folder`: the external folder, created on
/// first use.
pub async fn external_folder(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Value>, DeskError> {
    let folder = state
        .scanner
        .ensure_external_folder(&auth.scanner_token)
        .await?;
    Ok(Json(folder))
}

/// `GET /api/external-scans/check-existing`: duplicate probe by exact
/// name within the external folder.
pub async fn check_existing(
    State(state): State<AppState>,
    auth: AuthSession,
    Query(query): Query<ExternalCheckQuery>,
) -> Result<Json<Value>, DeskError> {
    let server_name = query
        .server_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let folder_id = query.folder_id.as_deref().and_then(parse_id);
    let (server_name, folder_id) = match (server_name, folder_id) {
        (Some(s), Some(f)) => (s, f),
        _ => {
            return Err(DeskError::MalformedInput(
                "Missing required parameters".to_string(),
            ))
        }
    };

    let scan = state
        .scanner
        .find_scan_exact(&auth.scanner_token, folder_id, server_name)
        .await?;
    Ok(Json(json!({
        "exists": scan.is_some(),
        "scan": scan.unwrap_or(Value::Null),
    })))
}

pub async fn stop_external_scan(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(scan_id): Path<i64>,
) -> Result<Json<Value>, DeskError> {
    state
        .scanner
        .stop_scan(&auth.scanner_token, scan_id)
        .await?;
    info!(scan_id, user = %auth.username, "external scan stopped");
    Ok(Json(json!({ "message": "Scan stopped successfully" })))
}

/// Locates the external scan for a server and assembles the full
/// per-host vulnerability listing. Hosts whose detail fetch fails are
/// skipped rather than failing the whole report.
async fn assemble_vulnerability_report(
    state: &AppState,
    auth: &AuthSession,
    server_name: &str,
) -> Result<Value, DeskError> {
    let folder = state
        .scanner
        .external_folder(&auth.scanner_token)
        .await?
        .ok_or_else(|| DeskError::NotFound("External scans folder not found".to_string()))?;
    let folder_id = folder_id_of(&folder)
        .ok_or_else(|| DeskError::Scanner("Folder entry is missing an id".to_string()))?;

    let scan = state
        .scanner
        .find_scan_by_name(&auth.scanner_token, Some(folder_id), server_name)
        .await?
        .ok_or_else(|| {
            DeskError::NotFound(format!("No external scan found for {}", server_name))
        })?;
    let scan_id = scan
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| DeskError::Scanner("Scan entry is missing an id".to_string()))?;

    let details = state
        .scanner
        .scan_details(&auth.scanner_token, scan_id)
        .await?;
    let mut report = reshape::scan_report_shell(&scan, &details);

    let hosts = details
        .get("hosts")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let scanner = &state.scanner;
    let token = &auth.scanner_token;
    let fetches = hosts.iter().filter_map(|host| {
        let host_id = host.get("host_id").and_then(Value::as_i64)?;
        Some(async move { (host, host_id, scanner.host_details(token, scan_id, host_id, None).await) })
    });

    let mut blocks = Vec::with_capacity(hosts.len());
    for (host, host_id, result) in futures::future::join_all(fetches).await {
        match result {
            Ok(host_details) => blocks.push(reshape::host_report(host, &host_details)),
            Err(e) => warn!(scan_id, host_id, error = %e, "skipping host with unreadable details"),
        }
    }
    report["hosts"] = Value::Array(blocks);
    Ok(report)
}

/// `GET /api/external-scans/vulnerabilities/{server_name}`: full listing
/// of findings per host for the server's external scan.
pub async fn external_vulnerabilities(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(server_name): Path<String>,
) -> Result<Json<Value>, DeskError> {
    let report = assemble_vulnerability_report(&state, &auth, &server_name).await?;
    Ok(Json(report))
}

/// `GET /api/external-scans/vulnerability-summary/{server_name}`:
/// severity rollup of the same listing.
pub async fn vulnerability_summary(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(server_name): Path<String>,
) -> Result<Json<Value>, DeskError> {
    let report = assemble_vulnerability_report(&state, &auth, &server_name).await?;
    Ok(Json(reshape::vulnerability_summary(&report)))
}
