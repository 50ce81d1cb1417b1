use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DeskError;

/// Lifecycle state of an exception request. `Pending` is the only state that
/// accepts transitions; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Declined,
    NeedMoreInfo,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Declined => "Declined",
            Self::NeedMoreInfo => "NeedMoreInfo",
        }
    }

    /// Case-insensitive parse. The previous dashboard sent lowercase status
    /// values, so both spellings are accepted.
    pub fn parse(s: &str) -> Result<Self, DeskError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "declined" => Ok(Self::Declined),
            "needmoreinfo" | "need more info" | "need_more_info" => Ok(Self::NeedMoreInfo),
            _ => Err(DeskError::InvalidStatus(s.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Highest data classification present on the affected system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataClassification {
    Confidential,
    Controlled,
    Published,
}

impl DataClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confidential => "confidential",
            Self::Controlled => "controlled",
            Self::Published => "published",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DeskError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confidential" => Ok(Self::Confidential),
            "controlled" => Ok(Self::Controlled),
            "published" => Ok(Self::Published),
            _ => Err(DeskError::InvalidClassification(s.to_string())),
        }
    }
}

impl std::fmt::Display for DataClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact details captured on the request form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub job_title: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A vulnerability reference as the dashboard submits it: either a bare
/// display string or a structured scanner entry whose keys vary by source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VulnerabilityRef {
    Name(String),
    Entry {
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(alias = "pluginName", skip_serializing_if = "Option::is_none")]
        plugin_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<serde_json::Value>,
        #[serde(alias = "pluginId", skip_serializing_if = "Option::is_none")]
        plugin_id: Option<serde_json::Value>,
    },
}

impl VulnerabilityRef {
    /// Canonical display string: the name, else the plugin name, else a
    /// `Vulnerability ID: {id}` fallback. Returns an empty string only when
    /// a bare string entry was itself empty; callers drop those.
    pub fn display_name(&self) -> String {
        match self {
            Self::Name(s) => s.trim().to_string(),
            Self::Entry {
                name,
                plugin_name,
                id,
                plugin_id,
            } => {
                if let Some(n) = nonblank(name) {
                    return n.to_string();
                }
                if let Some(n) = nonblank(plugin_name) {
                    return n.to_string();
                }
                let raw = id
                    .as_ref()
                    .and_then(loose_id)
                    .or_else(|| plugin_id.as_ref().and_then(loose_id))
                    .unwrap_or_else(|| "unknown".to_string());
                format!("Vulnerability ID: {raw}")
            }
        }
    }
}

fn nonblank(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Scanner ids arrive as numbers or strings depending on the endpoint.
fn loose_id(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Raw submission body from the dashboard. Every field is optional so the
/// validator can enumerate all missing fields in a single pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmitExceptionPayload {
    pub server_name: Option<String>,
    pub requester_first_name: Option<String>,
    pub requester_last_name: Option<String>,
    pub requester_department: Option<String>,
    pub requester_job_title: Option<String>,
    pub requester_email: Option<String>,
    pub requester_phone: Option<String>,
    pub department_head_username: Option<String>,
    pub department_head_first_name: Option<String>,
    pub department_head_last_name: Option<String>,
    pub department_head_department: Option<String>,
    pub department_head_job_title: Option<String>,
    pub department_head_email: Option<String>,
    pub department_head_phone: Option<String>,
    pub data_classification: Option<String>,
    pub exception_duration_type: Option<String>,
    pub custom_expiration_date: Option<NaiveDate>,
    pub users_affected: Option<String>,
    pub data_at_risk: Option<String>,
    pub vulnerabilities: Option<Vec<VulnerabilityRef>>,
    pub justification: Option<String>,
    pub mitigation: Option<String>,
    pub terms_accepted: Option<bool>,
    pub exception_type: Option<String>,
}

/// A validated submission, ready for insertion with status `Pending`.
#[derive(Debug, Clone)]
pub struct NewExceptionRequest {
    pub server_name: String,
    pub requester: ContactInfo,
    pub department_head: ContactInfo,
    pub department_head_username: String,
    pub data_classification: DataClassification,
    pub duration_type: String,
    pub expiration_date: NaiveDate,
    pub users_affected: String,
    pub data_at_risk: String,
    pub vulnerabilities: Vec<String>,
    pub justification: String,
    pub mitigation: String,
    pub requested_by: String,
    pub exception_type: String,
}

/// A persisted exception request. After creation only `status`,
/// `decline_reason`, `approver_username` and `updated_at` ever change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRequest {
    pub id: i64,
    pub server_name: String,
    pub requester: ContactInfo,
    pub department_head: ContactInfo,
    pub department_head_username: String,
    pub approver_username: Option<String>,
    pub data_classification: DataClassification,
    pub duration_type: String,
    pub expiration_date: NaiveDate,
    pub users_affected: String,
    pub data_at_risk: String,
    pub vulnerabilities: Vec<String>,
    pub justification: String,
    pub mitigation: String,
    pub status: RequestStatus,
    pub decline_reason: Option<String>,
    pub requested_by: String,
    pub exception_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Authenticated identity attached to each workflow call. The `admin` flag
/// is derived fresh from the scanner's group membership at the HTTP layer,
/// never cached on the session.
#[derive(Debug, Clone)]
pub struct Caller {
    pub username: String,
    pub admin: bool,
}
