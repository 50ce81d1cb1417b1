use std::sync::Arc;

use handlebars::Handlebars;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{NotificationConfig, NotifyMode};
use crate::errors::DeskError;
use super::mailer::{LogMailer, MailTransport, RelayMailer};
use super::templates::{self, Notice};

/// Renders notices and hands them to the configured transport on a spawned
/// task. Workflow callers never wait on delivery and never see failures.
pub struct Notifier {
    registry: Handlebars<'static>,
    transport: Arc<dyn MailTransport>,
    dashboard_url: String,
}

impl Notifier {
    pub fn new(config: &NotificationConfig, timeout_secs: u64) -> Result<Self, DeskError> {
        let transport: Arc<dyn MailTransport> = match config.mode {
            NotifyMode::Relay => {
                let relay_url = config.relay_url.as_deref().ok_or_else(|| {
                    DeskError::Config("notifications.relay_url is required in relay mode".into())
                })?;
                Arc::new(RelayMailer::new(relay_url, &config.from_address, timeout_secs)?)
            }
            NotifyMode::Log => Arc::new(LogMailer),
        };
        Self::with_transport(transport, &config.dashboard_url)
    }

    /// Build a notifier around an arbitrary transport. Used by tests and by
    /// callers that inject their own delivery path.
    pub fn with_transport(
        transport: Arc<dyn MailTransport>,
        dashboard_url: &str,
    ) -> Result<Self, DeskError> {
        Ok(Self {
            registry: templates::registry()?,
            transport,
            dashboard_url: dashboard_url.to_string(),
        })
    }

    pub fn render(&self, notice: Notice, data: &Value) -> Result<(String, String), DeskError> {
        let subject = self
            .registry
            .render(&notice.subject_name(), data)
            .map_err(|e| DeskError::Template(e.to_string()))?;
        let body = self
            .registry
            .render(notice.template_name(), data)
            .map_err(|e| DeskError::Template(e.to_string()))?;
        Ok((subject, body))
    }

    /// Fire-and-forget dispatch. The dashboard URL is injected into the
    /// substitution map unless the caller already set one.
    pub fn dispatch(&self, notice: Notice, recipient: &str, mut data: Value) {
        if recipient.trim().is_empty() {
            warn!(notice = notice.template_name(), "No recipient for notification, skipping");
            return;
        }

        if let Value::Object(map) = &mut data {
            map.entry("dashboardUrl")
                .or_insert_with(|| Value::String(self.dashboard_url.clone()));
        }

        let (subject, body) = match self.render(notice, &data) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, notice = notice.template_name(), "Failed to render notification");
                return;
            }
        };

        let transport = Arc::clone(&self.transport);
        let to = recipient.to_string();
        tokio::spawn(async move {
            match transport.send(&to, &subject, &body).await {
                Ok(()) => {
                    debug!(to = %to, transport = transport.transport_name(), "Notification sent")
                }
                Err(e) => warn!(error = %e, to = %to, "Failed to send notification"),
            }
        });
    }
}
