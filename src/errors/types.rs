use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid exception duration type: {0}")]
    InvalidDurationType(String),

    #[error("Custom expiration date is required for custom duration")]
    MissingCustomDate,

    #[error("Invalid data classification: {0}")]
    InvalidClassification(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Decline reason is required when declining a request")]
    MissingDeclineReason,

    #[error("Request is already {from}, cannot move to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Permission error: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Scanner error: {0}")]
    Scanner(String),

    #[error("Scanner timeout: {0}")]
    ScannerTimeout(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
