use std::path::Path;
use crate::errors::DeskError;
use super::types::{DeskConfig, NotifyMode};
use tracing::debug;

/// Load configuration from an explicit path, or from `vulndesk.yaml` in the
/// working directory when none is given. A missing default file is not an
/// error; built-in defaults apply.
pub async fn load_config(path: Option<&Path>) -> Result<DeskConfig, DeskError> {
    match path {
        Some(p) => parse_config(p).await,
        None => {
            let fallback = Path::new("vulndesk.yaml");
            if fallback.exists() {
                parse_config(fallback).await
            } else {
                debug!("No config file found, using defaults");
                let config = DeskConfig::default();
                validate(&config)?;
                Ok(config)
            }
        }
    }
}

pub async fn parse_config(path: &Path) -> Result<DeskConfig, DeskError> {
    if !path.exists() {
        return Err(DeskError::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(DeskError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: DeskConfig = serde_yaml::from_str(&content)?;

    validate(&config)?;

    Ok(config)
}

/// Cross-field checks after parsing.
fn validate(config: &DeskConfig) -> Result<(), DeskError> {
    let url = &config.scanner.url;
    if url.is_empty() {
        return Err(DeskError::Config("scanner.url must not be empty".into()));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(DeskError::Config(format!(
            "scanner.url must be an http(s) URL, got '{url}'"
        )));
    }

    if config.scanner.timeout_secs == 0 {
        return Err(DeskError::Config("scanner.timeout_secs must be nonzero".into()));
    }

    if config.database.path.is_empty() {
        return Err(DeskError::Config("database.path must not be empty".into()));
    }

    if config.notifications.mode == NotifyMode::Relay {
        let has_relay = config
            .notifications
            .relay_url
            .as_ref()
            .map_or(false, |u| !u.is_empty());
        if !has_relay {
            return Err(DeskError::Config(
                "notifications.relay_url is required in relay mode".into(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate(&DeskConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_scanner_url() {
        let mut config = DeskConfig::default();
        config.scanner.url = "localhost:8834".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = DeskConfig::default();
        config.scanner.timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_relay_mode_requires_url() {
        let mut config = DeskConfig::default();
        config.notifications.mode = NotifyMode::Relay;
        assert!(validate(&config).is_err());

        config.notifications.relay_url = Some("http://relay.internal/send".to_string());
        assert!(validate(&config).is_ok());
    }

    #[tokio::test]
    async fn test_parse_config_missing_file() {
        let result = parse_config(Path::new("/nonexistent/vulndesk.yaml")).await;
        assert!(matches!(result, Err(DeskError::Config(_))));
    }

    #[tokio::test]
    async fn test_parse_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vulndesk.yaml");
        tokio::fs::write(
            &path,
            "scanner:\n  url: https://scanner.example.com:8834\n  insecure: true\n",
        )
        .await
        .unwrap();

        let config = parse_config(&path).await.unwrap();
        assert_eq!(config.scanner.url, "https://scanner.example.com:8834");
        assert!(config.scanner.insecure);
        assert_eq!(config.server.port, 5000);
    }

    #[tokio::test]
    async fn test_load_config_defaults_when_absent() {
        let config = load_config(None).await.unwrap();
        assert_eq!(config.server.port, 5000);
    }
}
