use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Last observed status of an endpoint.
///
/// Unreachable targets get their own variant so an alert can tell "nothing
/// answered" apart from "the server answered with an error".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "lowercase")]
pub enum StatusCode {
    Http(u16),
    Unreachable,
}

impl StatusCode {
    /// Only the exact success code is healthy. Redirects and every other code
    /// count as incidents.
    pub fn is_success(self, success_code: u16) -> bool {
        matches!(self, StatusCode::Http(code) if code == success_code)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusCode::Http(code) => write!(f, "{code}"),
            StatusCode::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// How a single probe ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    /// The server answered with this HTTP status
    Responded(u16),
    /// DNS, connect, TLS or timeout failure before any status was seen
    Unreachable(String),
}

impl ProbeStatus {
    pub fn code(&self) -> StatusCode {
        match self {
            ProbeStatus::Responded(code) => StatusCode::Http(*code),
            ProbeStatus::Unreachable(_) => StatusCode::Unreachable,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ProbeStatus::Responded(_) => None,
            ProbeStatus::Unreachable(reason) => Some(reason),
        }
    }
}

/// Result of probing one URL
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// URL actually dispatched (after scheme normalization)
    pub url: String,

    /// Wall-clock time right before dispatch
    pub started_at: DateTime<Utc>,

    /// Dispatch to end of body (or to the failure)
    pub elapsed: Duration,

    pub status: ProbeStatus,

    pub content_type: String,

    pub body: String,
}

impl ProbeOutcome {
    pub fn responded(
        url: String,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        code: u16,
        content_type: String,
        body: String,
    ) -> Self {
        Self { url, started_at, elapsed, status: ProbeStatus::Responded(code), content_type, body }
    }

    pub fn unreachable(
        url: String,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            url,
            started_at,
            elapsed,
            status: ProbeStatus::Unreachable(reason.into()),
            content_type: String::new(),
            body: String::new(),
        }
    }

    pub fn code(&self) -> StatusCode {
        self.status.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exact_success_code_is_healthy() {
        assert!(StatusCode::Http(200).is_success(200));
        assert!(!StatusCode::Http(204).is_success(200));
        assert!(!StatusCode::Http(301).is_success(200));
        assert!(!StatusCode::Unreachable.is_success(200));
        assert!(StatusCode::Http(204).is_success(204));
    }

    #[test]
    fn unreachable_outcome_has_no_body() {
        let outcome = ProbeOutcome::unreachable(
            "http://nowhere.invalid".to_string(),
            Utc::now(),
            Duration::from_millis(3),
            "dns error",
        );
        assert_eq!(outcome.code(), StatusCode::Unreachable);
        assert_eq!(outcome.status.reason(), Some("dns error"));
        assert!(outcome.body.is_empty());
        assert_eq!(outcome.code().to_string(), "unreachable");
    }
}
