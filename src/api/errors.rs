use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::errors::DeskError;

impl IntoResponse for DeskError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            DeskError::MalformedInput(_)
            | DeskError::MissingFields(_)
            | DeskError::MissingCustomDate
            | DeskError::InvalidDurationType(_)
            | DeskError::InvalidClassification(_)
            | DeskError::InvalidStatus(_)
            | DeskError::MissingDeclineReason
            | DeskError::InvalidTransition { .. }
            | DeskError::Config(_) => StatusCode::BAD_REQUEST,
            DeskError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DeskError::Forbidden(_) => StatusCode::FORBIDDEN,
            DeskError::NotFound(_) => StatusCode::NOT_FOUND,
            DeskError::Scanner(_) | DeskError::Network(_) => StatusCode::BAD_GATEWAY,
            DeskError::ScannerTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({"success": false, "error": self.to_string()});
        if let DeskError::MissingFields(fields) = &self {
            body["missingFields"] = json!(fields);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                DeskError::MissingFields(vec!["serverName".to_string()]),
                StatusCode::BAD_REQUEST,
            ),
            (DeskError::MissingCustomDate, StatusCode::BAD_REQUEST),
            (
                DeskError::Unauthorized("no session".to_string()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                DeskError::Forbidden("not a reviewer".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (
                DeskError::NotFound("request 9".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                DeskError::Scanner("upstream 500".to_string()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                DeskError::ScannerTimeout("report".to_string()),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                DeskError::Database("locked".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
