use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use serde_json::Value;
use tracing::info;

use crate::api::auth::AuthSession;
use crate::api::AppState;
use crate::errors::DeskError;
use crate::scanner::reshape;

fn pdf_attachment(filename: String, bytes: Vec<u8>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
}

/// `GET /api/scan-report/{server_name}`: exports the server's agent scan
/// as a PDF attachment. Blocks while the appliance renders the file.
pub async fn internal_report(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(server_name): Path<String>,
) -> Result<impl IntoResponse, DeskError> {
    let scan = state
        .scanner
        .find_scan_by_name(&auth.scanner_token, None, &server_name)
        .await?
        .ok_or_else(|| DeskError::NotFound("Scan not found".to_string()))?;
    let scan_id = scan
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| DeskError::Scanner("Scan entry is missing an id".to_string()))?;

    info!(scan_id, server = %server_name, "exporting scan report");
    let bytes = state
        .scanner
        .export_report(&auth.scanner_token, scan_id)
        .await?;
    Ok(pdf_attachment(
        reshape::report_filename("scan_report", &server_name),
        bytes,
    ))
}

/// `GET /api/external-scan-report/{server_name}`: same export for the
/// server's external scan, scoped to the external folder.
pub async fn external_report(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(server_name): Path<String>,
) -> Result<impl IntoResponse, DeskError> {
    let folder = state
        .scanner
        .external_folder(&auth.scanner_token)
        .await?
        .ok_or_else(|| DeskError::NotFound("External scans folder not found".to_string()))?;
    let folder_id = folder
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| DeskError::Scanner("Folder entry is missing an id".to_string()))?;

    let scan = state
        .scanner
        .find_scan_by_name(&auth.scanner_token, Some(folder_id), &server_name)
        .await?
        .ok_or_else(|| {
            DeskError::NotFound(format!("No external scan found for {}", server_name))
        })?;
    let scan_id = scan
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| DeskError::Scanner("Scan entry is missing an id".to_string()))?;

    info!(scan_id, server = %server_name, "exporting external scan report");
    let bytes = state
        .scanner
        .export_report(&auth.scanner_token, scan_id)
        .await?;
    Ok(pdf_attachment(
        reshape::report_filename("external_scan_report", &server_name),
        bytes,
    ))
}
