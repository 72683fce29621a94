use super::Alert;
use crate::monitoring::{Incident, StatusCode};

/// Rendered subject and body of an alert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
}

/// Severity label for a failing status
pub fn severity(status: StatusCode) -> &'static str {
    match status {
        StatusCode::Unreachable => "Fatal Error",
        StatusCode::Http(500) => "Alert",
        StatusCode::Http(_) => "Warning",
    }
}

impl AlertMessage {
    pub fn render(alert: &Alert) -> Self {
        match alert.kind {
            Incident::Closed => Self {
                subject: format!("Incident CLOSED for {}", alert.url),
                body: format!(
                    "Hi there,\n\n\
                     This is a notification sent by Ping.\n\n\
                     Incident CLOSED for {url} ({name}), the page answers with {status} again.\n\n\
                     Best regards,\n\
                     Ping\r\n",
                    url = alert.url,
                    name = alert.name,
                    status = alert.status,
                ),
            },
            Incident::Opened => {
                let severity = severity(alert.status);
                Self {
                    subject: format!("Incident OPEN ({severity}) for {}", alert.url),
                    body: format!(
                        "Hi there,\n\n\
                         This is a notification sent by Ping.\n\n\
                         Incident ({severity}) for {url} ({name}), has been assigned to you.\n\
                         Last status: {status}.\n\n\
                         You will be notified when the page goes live back again.\n\n\
                         Best regards,\n\
                         Ping\r\n",
                        url = alert.url,
                        name = alert.name,
                        status = alert.status,
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Endpoint;

    fn alert(kind: Incident, status: StatusCode) -> Alert {
        Alert::new(&Endpoint::new("Shop", "http://shop.example", 5), kind, status)
    }

    #[test]
    fn test_open_subject_carries_severity() {
        let message = AlertMessage::render(&alert(Incident::Opened, StatusCode::Http(500)));
        assert_eq!(message.subject, "Incident OPEN (Alert) for http://shop.example");
        assert!(message.body.contains("Last status: 500."));

        let message = AlertMessage::render(&alert(Incident::Opened, StatusCode::Unreachable));
        assert_eq!(message.subject, "Incident OPEN (Fatal Error) for http://shop.example");

        let message = AlertMessage::render(&alert(Incident::Opened, StatusCode::Http(404)));
        assert_eq!(message.subject, "Incident OPEN (Warning) for http://shop.example");
    }

    #[test]
    fn test_closed_subject() {
        let message = AlertMessage::render(&alert(Incident::Closed, StatusCode::Http(200)));
        assert_eq!(message.subject, "Incident CLOSED for http://shop.example");
        assert!(message.body.contains("answers with 200 again"));
    }
}
