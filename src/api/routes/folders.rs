use axum::{extract::State, Json};
use serde_json::Value;

use crate::api::auth::AuthSession;
use crate::api::AppState;
use crate::errors::DeskError;

/// Returns the caller's default scan folder on the appliance.
pub async fn my_scans_folder(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<Value>, DeskError> {
    let folder = state.scanner.my_scans_folder(&auth.scanner_token).await?;
    Ok(Json(folder))
}
