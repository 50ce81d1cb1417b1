use serde::Deserialize;
use serde_json::Value;

/// Dashboard login credentials.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Reviewer decision body for `PUT /api/exception-requests/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecideRequest {
    pub status: Option<String>,
    pub decline_reason: Option<String>,
}

/// Body for the need-more-info loopback.
#[derive(Debug, Deserialize)]
pub struct RequestInfoBody {
    pub comments: Option<String>,
}

/// Scan creation body. Ids arrive as numbers or numeric strings depending
/// on which dashboard form submitted them, so they are coerced on read.
#[derive(Debug, Deserialize)]
pub struct CreateScanRequest {
    pub server_name: Option<String>,
    pub folder_id: Option<Value>,
    pub agent_group_id: Option<Value>,
}

impl CreateScanRequest {
    pub fn folder_id(&self) -> Option<i64> {
        self.folder_id.as_ref().and_then(loose_i64)
    }

    pub fn agent_group_id(&self) -> Option<i64> {
        self.agent_group_id.as_ref().and_then(loose_i64)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateExternalScanRequest {
    pub server_name: Option<String>,
    pub folder_id: Option<Value>,
}

impl CreateExternalScanRequest {
    pub fn folder_id(&self) -> Option<i64> {
        self.folder_id.as_ref().and_then(loose_i64)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub group_name: Option<String>,
}

/// Query parameters for the internal check-existing probe.
#[derive(Debug, Deserialize)]
pub struct CheckExistingQuery {
    pub agent_name: Option<String>,
    pub folder_id: Option<String>,
}

/// Query parameters for the external check-existing probe.
#[derive(Debug, Deserialize)]
pub struct ExternalCheckQuery {
    pub server_name: Option<String>,
    pub folder_id: Option<String>,
}

fn loose_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parses a query-string id, which always arrives as text.
pub fn parse_id(s: &str) -> Option<i64> {
    s.trim().parse().ok()
}
