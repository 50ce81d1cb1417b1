use axum::{extract::FromRequestParts, http::header, http::request::Parts};

use crate::errors::DeskError;
use crate::models::Caller;

use super::AppState;

/// Authenticated dashboard session, extracted from the bearer token the
/// login route issued.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub username: String,
    pub scanner_token: String,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = DeskError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| DeskError::Unauthorized("Missing authorization header".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| DeskError::Unauthorized("Invalid authorization header".to_string()))?;
        let session = state
            .sessions
            .get(token)
            .ok_or_else(|| DeskError::Unauthorized("Invalid or expired session".to_string()))?;
        Ok(AuthSession {
            token: token.to_string(),
            username: session.username,
            scanner_token: session.scanner_token,
        })
    }
}

impl AuthSession {
    /// Caller identity without the reviewer capability.
    pub fn caller(&self) -> Caller {
        Caller {
            username: self.username.clone(),
            admin: false,
        }
    }
}

/// Derives the reviewer capability from live scanner group membership, so
/// a revoked membership takes effect on the next request.
pub async fn admin_caller(state: &AppState, auth: &AuthSession) -> Result<Caller, DeskError> {
    if !state.scanner.is_admin(&auth.scanner_token).await? {
        return Err(DeskError::Forbidden(format!(
            "User '{}' is not in the reviewer group",
            auth.username
        )));
    }
    Ok(Caller {
        username: auth.username.clone(),
        admin: true,
    })
}
