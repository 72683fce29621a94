//! Incident notifications.
//!
//! The engine hands every OPENED/CLOSED transition to a [`Notifier`]. Delivery
//! is best effort: a failed notification is logged by the caller and never
//! rolls back the probe's persistence.

pub mod message;
pub mod webhook;

pub use message::AlertMessage;
pub use webhook::WebhookNotifier;

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::NotifierConfig;
use crate::database::models::Endpoint;
use crate::monitoring::{Incident, StatusCode};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Notification relay rejected the alert with status {status}")]
    Rejected { status: u16 },
}

/// One incident transition for one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub endpoint_id: Uuid,
    pub name: String,
    pub url: String,
    pub kind: Incident,
    pub status: StatusCode,
}

impl Alert {
    pub fn new(endpoint: &Endpoint, kind: Incident, status: StatusCode) -> Self {
        Self { endpoint_id: endpoint.id, name: endpoint.name.clone(), url: endpoint.url.clone(), kind, status }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Writes alerts to the log instead of delivering them
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let message = AlertMessage::render(alert);
        info!(endpoint_id = %alert.endpoint_id, subject = %message.subject, "Alert not delivered, no notifier configured");
        Ok(())
    }
}

/// Pick the notifier the configuration asks for
pub fn from_config(config: &NotifierConfig) -> Result<Arc<dyn Notifier>> {
    match config.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            Ok(Arc::new(WebhookNotifier::new(url, config.sender.clone(), config.recipients.clone())?))
        }
        _ => {
            warn!("Notifier webhook not set. Alerts will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let endpoint = Endpoint::new("shop", "http://shop.example", 5);
        let alert = Alert::new(&endpoint, Incident::Opened, StatusCode::Unreachable);
        assert!(LogNotifier.notify(&alert).await.is_ok());
    }

    #[test]
    fn test_blank_webhook_falls_back_to_log() {
        let config = NotifierConfig { webhook_url: Some("  ".into()), ..Default::default() };
        assert!(from_config(&config).is_ok());

        let config = NotifierConfig { webhook_url: Some("not a url".into()), ..Default::default() };
        assert!(from_config(&config).is_err());
    }
}
