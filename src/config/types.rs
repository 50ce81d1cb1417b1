use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DeskConfig {
    pub server: ServerConfig,
    pub scanner: ScannerConfig,
    pub database: DatabaseConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origin: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub url: String,
    /// Accept the appliance's self-signed certificate.
    pub insecure: bool,
    pub timeout_secs: u64,
    /// Scanner group whose members may review exception requests.
    pub admin_group_id: i64,
    pub templates: ScanTemplates,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            url: "https://localhost:8834".to_string(),
            insecure: false,
            timeout_secs: 30,
            admin_group_id: 4,
            templates: ScanTemplates::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanTemplates {
    pub internal_uuid: String,
    pub internal_policy_id: String,
    pub external_uuid: String,
    pub external_policy_id: String,
    pub report_template_id: String,
}

impl Default for ScanTemplates {
    fn default() -> Self {
        Self {
            internal_uuid: "e785b26c-5b4d-5da8-6643-007ea1f8ee1c8f23937a4bd45a1d".to_string(),
            internal_policy_id: "26729".to_string(),
            external_uuid: "ad629e16-03b6-8c1d-cef6-ef8c9dd3c658d24bd260ef5f9e66".to_string(),
            external_policy_id: "67766".to_string(),
            report_template_id: "2493".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "vulndesk.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub mode: NotifyMode,
    /// HTTP mail relay endpoint, required in relay mode.
    pub relay_url: Option<String>,
    pub from_address: String,
    /// Base URL of the dashboard, embedded in notification bodies.
    pub dashboard_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            mode: NotifyMode::Log,
            relay_url: None,
            from_address: "security-dashboard@localhost".to_string(),
            dashboard_url: "http://localhost:5173".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    #[default]
    Log,
    Relay,
}

impl NotifyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Relay => "relay",
        }
    }
}

impl std::fmt::Display for NotifyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desk_config_defaults() {
        let config = DeskConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.scanner.url, "https://localhost:8834");
        assert!(!config.scanner.insecure);
        assert_eq!(config.scanner.admin_group_id, 4);
        assert_eq!(config.database.path, "vulndesk.db");
        assert_eq!(config.notifications.mode, NotifyMode::Log);
    }

    #[test]
    fn test_notify_mode_deserialize() {
        let parsed: NotifyMode = serde_json::from_str("\"relay\"").unwrap();
        assert_eq!(parsed, NotifyMode::Relay);
        let parsed: NotifyMode = serde_json::from_str("\"log\"").unwrap();
        assert_eq!(parsed, NotifyMode::Log);
    }

    #[test]
    fn test_notify_mode_display() {
        assert_eq!(format!("{}", NotifyMode::Log), "log");
        assert_eq!(format!("{}", NotifyMode::Relay), "relay");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "server:\n  port: 8080\n";
        let config: DeskConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.scanner.timeout_secs, 30);
    }

    #[test]
    fn test_scan_templates_defaults_nonempty() {
        let templates = ScanTemplates::default();
        assert!(!templates.internal_uuid.is_empty());
        assert!(!templates.external_uuid.is_empty());
        assert!(!templates.report_template_id.is_empty());
    }
}
