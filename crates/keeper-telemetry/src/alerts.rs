//! Alert dispatch.
//!
//! Alerts are fire-and-forget: the keeper never blocks on delivery and
//! gets no delivery guarantee. Production wires the webhook sink;
//! development and tests use the log sink or the recording mock.

use std::sync::Arc;

use tracing::{error, info, warn};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Fatal,
}

impl AlertLevel {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Fatal => "fatal",
        }
    }
}

/// Receiver of alert notifications.
pub trait AlertSink: Send + Sync {
    /// Dispatch an alert. Must not block the caller.
    fn send_alert(&self, level: AlertLevel, title: &str, details: &str);
}

/// Arc wrapper for alert sink trait objects.
pub type DynAlertSink = Arc<dyn AlertSink>;

/// Sink that only writes to the log. Used in development and as the
/// fallback when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn send_alert(&self, level: AlertLevel, title: &str, details: &str) {
        match level {
            AlertLevel::Info => info!(title, details, "alert"),
            AlertLevel::Warning => warn!(title, details, "alert"),
            AlertLevel::Fatal => error!(title, details, "alert"),
        }
    }
}

/// Sink that POSTs alerts to a webhook as JSON.
///
/// Delivery happens on a spawned task; failures are logged and dropped.
pub struct WebhookAlertSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookAlertSink {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

impl AlertSink for WebhookAlertSink {
    fn send_alert(&self, level: AlertLevel, title: &str, details: &str) {
        let payload = serde_json::json!({
            "level": level.as_str(),
            "title": title,
            "details": details,
        });
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            match client.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    warn!(status = %resp.status(), "alert webhook rejected payload");
                }
                Err(e) => {
                    warn!(error = %e, "alert webhook delivery failed");
                }
            }
        });
    }
}

/// Recording sink for tests.
#[derive(Debug, Default)]
pub struct MockAlertSink {
    alerts: parking_lot::Mutex<Vec<(AlertLevel, String, String)>>,
}

impl MockAlertSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts received so far, in dispatch order.
    pub fn alerts(&self) -> Vec<(AlertLevel, String, String)> {
        self.alerts.lock().clone()
    }

    /// Alerts at the given level.
    pub fn alerts_at(&self, level: AlertLevel) -> usize {
        self.alerts.lock().iter().filter(|(l, _, _)| *l == level).count()
    }
}

impl AlertSink for MockAlertSink {
    fn send_alert(&self, level: AlertLevel, title: &str, details: &str) {
        self.alerts
            .lock()
            .push((level, title.to_string(), details.to_string()));
    }
}
