use anyhow::Result;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use super::types::ProbeOutcome;
use crate::database::Repository;
use crate::database::models::Endpoint;

/// Which endpoints a pass picks up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Enabled endpoints whose `next_due` has passed
    #[default]
    Due,
    /// Every enabled endpoint on every pass
    EveryRun,
}

/// Decides what is due and when it is due again
#[derive(Debug, Clone, Copy)]
pub struct MonitoringScheduler {
    mode: SelectionMode,
    success_code: u16,
}

impl MonitoringScheduler {
    pub fn new(mode: SelectionMode, success_code: u16) -> Self {
        Self { mode, success_code }
    }

    /// Snapshot of endpoints to probe in this pass
    pub async fn select(&self, repository: &dyn Repository, now: DateTime<Utc>) -> Result<Vec<Endpoint>> {
        let endpoints: Vec<Endpoint> = match self.mode {
            SelectionMode::Due => {
                repository.fetch_due(now).await?.into_iter().filter(|endpoint| endpoint.is_due(now)).collect()
            }
            SelectionMode::EveryRun => {
                repository.fetch_enabled().await?.into_iter().filter(|endpoint| endpoint.enabled).collect()
            }
        };

        Ok(endpoints)
    }

    /// Fold a probe result into the endpoint's scheduling and status fields
    pub fn advance(&self, endpoint: &mut Endpoint, outcome: &ProbeOutcome, now: DateTime<Utc>) {
        let status = outcome.code();

        endpoint.last_status = Some(status);
        endpoint.modified_at = now;
        endpoint.last_probed_at = Some(outcome.started_at);
        endpoint.next_due = next_due_after(outcome.started_at, endpoint.interval());

        // The last error body is kept for diagnostics until the endpoint recovers.
        if status.is_success(self.success_code) {
            endpoint.content.clear();
        } else {
            endpoint.content = outcome.body.clone();
        }
    }
}

/// Next due time counted from the start of the probe's minute.
///
/// Anchoring on the whole minute keeps a one-minute interval firing every
/// minute instead of drifting by the seconds the pass itself took.
pub fn next_due_after(probe_started: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    let anchor = probe_started.duration_trunc(Duration::minutes(1)).unwrap_or(probe_started);
    anchor + interval
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    fn outcome(code: u16, body: &str, started_at: DateTime<Utc>) -> ProbeOutcome {
        ProbeOutcome::responded(
            "http://example.com".into(),
            started_at,
            StdDuration::from_millis(120),
            code,
            "text/plain".into(),
            body.into(),
        )
    }

    #[test]
    fn test_next_due_anchors_on_minute() {
        assert_eq!(next_due_after(at(10, 0, 59), Duration::minutes(1)), at(10, 1, 0));
        assert_eq!(next_due_after(at(10, 0, 0), Duration::minutes(5)), at(10, 5, 0));
    }

    #[test]
    fn test_next_due_is_after_probe_time() {
        let started = at(23, 59, 59);
        assert!(next_due_after(started, Duration::minutes(1)) > started);
    }

    #[test]
    fn test_advance_on_failure_keeps_body() {
        let scheduler = MonitoringScheduler::new(SelectionMode::Due, 200);
        let mut endpoint = Endpoint::new("shop", "example.com", 5);
        endpoint.last_status = Some(crate::monitoring::types::StatusCode::Http(200));

        let now = at(12, 0, 30);
        scheduler.advance(&mut endpoint, &outcome(500, "oops", at(12, 0, 0)), now);

        assert_eq!(endpoint.last_status, Some(crate::monitoring::types::StatusCode::Http(500)));
        assert_eq!(endpoint.content, "oops");
        assert_eq!(endpoint.next_due, at(12, 5, 0));
        assert_eq!(endpoint.last_probed_at, Some(at(12, 0, 0)));
        assert_eq!(endpoint.modified_at, now);
    }

    #[test]
    fn test_advance_on_recovery_clears_body() {
        let scheduler = MonitoringScheduler::new(SelectionMode::Due, 200);
        let mut endpoint = Endpoint::new("shop", "example.com", 1);
        endpoint.content = "old failure".into();

        scheduler.advance(&mut endpoint, &outcome(200, "<html>ok</html>", at(8, 0, 10)), at(8, 0, 11));

        assert!(endpoint.content.is_empty());
        assert_eq!(endpoint.next_due, at(8, 1, 0));
    }

    #[test]
    fn test_advance_leaves_admin_fields_alone() {
        let scheduler = MonitoringScheduler::new(SelectionMode::Due, 200);
        let mut endpoint = Endpoint::new("shop", "example.com", 3);
        endpoint.description = "storefront".into();
        endpoint.rescue_url = Some("http://backup.example.com".into());
        let before = endpoint.clone();

        scheduler.advance(&mut endpoint, &outcome(404, "", at(9, 0, 0)), at(9, 0, 1));

        assert_eq!(endpoint.id, before.id);
        assert_eq!(endpoint.name, before.name);
        assert_eq!(endpoint.description, before.description);
        assert_eq!(endpoint.url, before.url);
        assert_eq!(endpoint.rescue_url, before.rescue_url);
        assert_eq!(endpoint.interval_minutes, before.interval_minutes);
        assert_eq!(endpoint.created_at, before.created_at);
        assert_eq!(endpoint.enabled, before.enabled);
    }
}
