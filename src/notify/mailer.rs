use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::errors::DeskError;

/// Outbound mail seam. Delivery guarantees live behind this boundary; the
/// dispatcher only cares that `send` resolves.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeskError>;

    /// Transport name for logging
    fn transport_name(&self) -> &str;
}

/// Records the rendered message in the log instead of delivering it. Default
/// transport when no relay is configured.
pub struct LogMailer;

#[async_trait]
impl MailTransport for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeskError> {
        info!(to = %to, subject = %subject, body_bytes = html_body.len(), "Notification (log transport)");
        Ok(())
    }

    fn transport_name(&self) -> &str {
        "log"
    }
}

/// Posts messages to an internal HTTP mail relay.
pub struct RelayMailer {
    client: Client,
    relay_url: String,
    from_address: String,
}

impl RelayMailer {
    pub fn new(relay_url: &str, from_address: &str, timeout_secs: u64) -> Result<Self, DeskError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DeskError::Network(format!("Failed to build relay client: {}", e)))?;

        Ok(Self {
            client,
            relay_url: relay_url.to_string(),
            from_address: from_address.to_string(),
        })
    }
}

#[async_trait]
impl MailTransport for RelayMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeskError> {
        let body = json!({
            "from": self.from_address,
            "to": to,
            "subject": subject,
            "html": html_body,
        });

        let resp = self
            .client
            .post(&self.relay_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeskError::Network(format!("Mail relay request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(DeskError::Notification(format!(
                "Mail relay returned {}",
                resp.status()
            )));
        }

        Ok(())
    }

    fn transport_name(&self) -> &str {
        "relay"
    }
}
