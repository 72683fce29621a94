use serde::{Deserialize, Serialize};

use super::types::StatusCode;

/// Health change between two consecutive probes of one endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// Healthy before, failing now
    Opened,
    /// Failing before, healthy now
    Closed,
    Stable,
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Transition::Opened => write!(f, "opened"),
            Transition::Closed => write!(f, "closed"),
            Transition::Stable => write!(f, "stable"),
        }
    }
}

impl Transition {
    /// The incident this transition starts or ends, if any
    pub fn incident(self) -> Option<Incident> {
        match self {
            Transition::Opened => Some(Incident::Opened),
            Transition::Closed => Some(Incident::Closed),
            Transition::Stable => None,
        }
    }
}

/// A transition that is worth an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Incident {
    Opened,
    Closed,
}

/// Classify a new status against the previous one.
///
/// Only the first failure and the first recovery produce a transition;
/// repeated failures stay `Stable`. An endpoint with no previous status is
/// considered healthy.
pub fn classify(previous: Option<StatusCode>, current: StatusCode, success_code: u16) -> Transition {
    let was_healthy = previous.is_none_or(|status| status.is_success(success_code));
    let is_healthy = current.is_success(success_code);

    match (was_healthy, is_healthy) {
        (true, false) => Transition::Opened,
        (false, true) => Transition::Closed,
        _ => Transition::Stable,
    }
}
