use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::monitoring::types::{ProbeOutcome, StatusCode};

/// A monitored page.
///
/// The engine only advances `last_status`, `modified_at`, `last_probed_at`,
/// `next_due` and `content`; everything else belongs to whoever administers
/// the endpoint and must come back out of the engine unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub url: String,
    pub rescue_url: Option<String>,
    pub interval_minutes: u32,
    pub last_status: Option<StatusCode>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub last_probed_at: Option<DateTime<Utc>>,
    pub next_due: DateTime<Utc>,
    /// Body of the last probe, kept only while the endpoint is failing
    pub content: String,
    pub enabled: bool,
}

impl Endpoint {
    /// Create an enabled endpoint that is due right away
    pub fn new(name: impl Into<String>, url: impl Into<String>, interval_minutes: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            url: url.into(),
            rescue_url: None,
            interval_minutes,
            last_status: None,
            created_at: now,
            modified_at: now,
            last_probed_at: None,
            next_due: now,
            content: String::new(),
            enabled: true,
        }
    }

    /// Polling interval, never shorter than a minute
    pub fn interval(&self) -> Duration {
        Duration::minutes(i64::from(self.interval_minutes.max(1)))
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_due <= now
    }
}

/// Immutable record of one probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub status: StatusCode,
    /// Transport failure description for unreachable probes
    pub error: Option<String>,
    /// Elapsed fetch time in seconds
    pub load_seconds: f64,
    /// Response body, empty unless the probe was unsuccessful
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_outcome(
        endpoint_id: Uuid,
        outcome: &ProbeOutcome,
        success_code: u16,
        created_at: DateTime<Utc>,
    ) -> Self {
        let status = outcome.code();
        let content =
            if status.is_success(success_code) { String::new() } else { outcome.body.clone() };

        Self {
            id: Uuid::new_v4(),
            endpoint_id,
            status,
            error: outcome.status.reason().map(str::to_string),
            load_seconds: outcome.elapsed.as_secs_f64(),
            content,
            created_at,
        }
    }
}

/// Convert a timestamp to unix seconds
pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
    time.timestamp()
}

/// Convert unix seconds back to a timestamp
pub fn i64_to_timestamp(timestamp: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp, 0).unwrap_or_default()
}

/// Split a status into its (kind, code) columns
pub fn status_to_columns(status: Option<StatusCode>) -> (Option<String>, Option<i64>) {
    match status {
        Some(StatusCode::Http(code)) => (Some("http".to_string()), Some(i64::from(code))),
        Some(StatusCode::Unreachable) => (Some("unreachable".to_string()), None),
        None => (None, None),
    }
}

/// Rebuild a status from its (kind, code) columns
pub fn status_from_columns(kind: Option<String>, code: Option<i64>) -> Option<StatusCode> {
    match (kind.as_deref(), code) {
        (Some("http"), Some(code)) => u16::try_from(code).ok().map(StatusCode::Http),
        (Some("unreachable"), _) => Some(StatusCode::Unreachable),
        _ => None,
    }
}
