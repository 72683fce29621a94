use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{Alert, AlertMessage, Notifier, NotifyError};
use crate::monitoring::{Incident, StatusCode};

/// Posts alerts as JSON to a mail relay or chat webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Url,
    sender: String,
    recipients: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    body: &'a str,
    endpoint_id: String,
    url: &'a str,
    transition: Incident,
    status: StatusCode,
}

impl WebhookNotifier {
    pub fn new(url: &str, sender: String, recipients: Vec<String>) -> anyhow::Result<Self> {
        let url = Url::parse(url)?;
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self { client, url, sender, recipients })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let message = AlertMessage::render(alert);
        let payload = Payload {
            from: &self.sender,
            to: &self.recipients,
            subject: &message.subject,
            body: &message.body,
            endpoint_id: alert.endpoint_id.to_string(),
            url: &alert.url,
            transition: alert.kind,
            status: alert.status,
        };

        let response = self.client.post(self.url.clone()).json(&payload).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected { status: response.status().as_u16() });
        }

        debug!(subject = %message.subject, recipients = self.recipients.len(), "Notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Endpoint;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> Alert {
        Alert::new(&Endpoint::new("Shop", "http://shop.example", 5), Incident::Opened, StatusCode::Http(500))
    }

    #[tokio::test]
    async fn test_posts_rendered_alert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .and(body_partial_json(json!({
                "from": "ping@example.com",
                "to": ["ops@example.com"],
                "subject": "Incident OPEN (Alert) for http://shop.example",
                "transition": "opened",
                "status": { "kind": "http", "code": 500 }
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(
            &format!("{}/alerts", server.uri()),
            "ping@example.com".into(),
            vec!["ops@example.com".into()],
        )
        .unwrap();

        notifier.notify(&alert()).await.unwrap();
    }

    #[tokio::test]
    async fn test_relay_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(503)).mount(&server).await;

        let notifier = WebhookNotifier::new(&server.uri(), String::new(), Vec::new()).unwrap();

        let err = notifier.notify(&alert()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected { status: 503 }));
    }
}
