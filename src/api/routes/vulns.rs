use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::api::auth::AuthSession;
use crate::api::AppState;
use crate::errors::DeskError;
use crate::scanner::reshape;

/// `GET /api/scans/{scan_id}/hosts/{host_id}/vulnerabilities`: one host's
/// findings, merged from the scan detail's host row and the host's own
/// detail fetch.
pub async fn host_vulnerabilities(
    State(state): State<AppState>,
    auth: AuthSession,
    Path((scan_id, host_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, DeskError> {
    let details = state
        .scanner
        .scan_details(&auth.scanner_token, scan_id)
        .await?;
    let host_row = details
        .get("hosts")
        .and_then(Value::as_array)
        .and_then(|hs| {
            hs.iter()
                .find(|h| h.get("host_id").and_then(Value::as_i64) == Some(host_id))
        })
        .cloned()
        .unwrap_or_else(|| json!({ "host_id": host_id }));
    let history_id = details
        .get("info")
        .and_then(|info| info.get("history_id"))
        .and_then(Value::as_i64);

    let host_details = state
        .scanner
        .host_details(&auth.scanner_token, scan_id, host_id, history_id)
        .await?;
    Ok(Json(reshape::host_report(&host_row, &host_details)))
}

/// `GET /api/vulnerability-details/{scan_id}/{host_id}/{plugin_id}`:
/// flattened plugin detail for one finding.
pub async fn plugin_details(
    State(state): State<AppState>,
    auth: AuthSession,
    Path((scan_id, host_id, plugin_id)): Path<(i64, i64, i64)>,
) -> Result<Json<Value>, DeskError> {
    let data = state
        .scanner
        .plugin_details(&auth.scanner_token, scan_id, host_id, plugin_id)
        .await?;
    let report = reshape::plugin_report(&data)
        .ok_or_else(|| DeskError::NotFound("No plugin data available".to_string()))?;
    Ok(Json(report))
}
