//! Probing and transition-detection engine
//!
//! This module is responsible for:
//! - Probing endpoints over HTTP (`checker`)
//! - Fanning probes out over a bounded worker pool (`executor`)
//! - Classifying health changes (`detector`)
//! - Selecting due endpoints and computing their next due time (`scheduler`)
pub mod checker;
pub mod detector;
pub mod executor;
pub mod scheduler;
pub mod types;

pub use checker::{Checker, HttpChecker};
pub use detector::{Incident, Transition, classify};
pub use executor::MonitoringExecutor;
pub use scheduler::{MonitoringScheduler, SelectionMode};
pub use types::{ProbeOutcome, StatusCode};
