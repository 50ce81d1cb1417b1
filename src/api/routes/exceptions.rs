use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::api::auth::{admin_caller, AuthSession};
use crate::api::models::{DecideRequest, RequestInfoBody};
use crate::api::AppState;
use crate::errors::DeskError;
use crate::models::{RequestStatus, SubmitExceptionPayload};

/// `POST /api/exception-requests`: validates the form and files it as
/// `Pending`, kicking off the confirmation and review notifications.
pub async fn submit_request(
    State(state): State<AppState>,
    auth: AuthSession,
    Json(payload): Json<SubmitExceptionPayload>,
) -> Result<(StatusCode, Json<Value>), DeskError> {
    let record = state.workflow.submit(&auth.caller(), &payload)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "request": record })),
    ))
}

/// `GET /api/exception-requests`: the caller's own submissions.
pub async fn list_own(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Value>, DeskError> {
    let requests = state.workflow.list(&auth.caller())?;
    Ok(Json(json!({ "success": true, "requests": requests })))
}

/// `GET /api/exception-requests/{id}`: visible to the requester; any
/// other caller needs the reviewer role, checked against the scanner
/// only after ownership fails.
pub async fn get_request(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(id): Path<i64>,
) -> Result<Json<Value>, DeskError> {
    let record = match state.workflow.get(&auth.caller(), id) {
        Err(DeskError::Forbidden(_)) => {
            let caller = admin_caller(&state, &auth).await?;
            state.workflow.get(&caller, id)?
        }
        other => other?,
    };
    Ok(Json(json!({ "success": true, "request": record })))
}

/// `PUT /api/exception-requests/{id}`: reviewer decision.
pub async fn decide_request(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(id): Path<i64>,
    Json(body): Json<DecideRequest>,
) -> Result<Json<Value>, DeskError> {
    let status = body
        .status
        .as_deref()
        .ok_or_else(|| DeskError::MalformedInput("status is required".to_string()))?;
    let status = RequestStatus::parse(status)?;
    let caller = admin_caller(&state, &auth).await?;
    let record = state
        .workflow
        .decide(&caller, id, status, body.decline_reason.as_deref())?;
    Ok(Json(json!({ "success": true, "request": record })))
}

/// `GET /api/admin/exception-requests`: the full review queue.
pub async fn list_all(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Value>, DeskError> {
    let caller = admin_caller(&state, &auth).await?;
    let requests = state.workflow.list_all(&caller)?;
    Ok(Json(json!({ "success": true, "requests": requests })))
}

/// `POST /api/admin/exception-requests/{id}/request-info`: asks the
/// requester for more detail without closing the request out.
pub async fn request_info(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(id): Path<i64>,
    Json(body): Json<RequestInfoBody>,
) -> Result<Json<Value>, DeskError> {
    let comments = body
        .comments
        .as_deref()
        .ok_or_else(|| DeskError::MalformedInput("comments are required".to_string()))?;
    let caller = admin_caller(&state, &auth).await?;
    let record = state.workflow.request_more_info(&caller, id, comments)?;
    Ok(Json(json!({ "success": true, "request": record })))
}
