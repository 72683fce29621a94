//! Orchestrator module - runs monitoring passes
//!
//! One pass:
//! - selects the due endpoints from the repository (a failure here aborts the pass)
//! - probes them on the worker pool
//! - classifies each result against the endpoint's previous status
//! - appends a history entry and upserts the advanced endpoint
//! - notifies on OPENED/CLOSED transitions
//!
//! Per-endpoint persistence and notification failures are logged and counted
//! in the [`RunReport`]; they never fail the pass.


use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::{Config, EngineConfig};
use crate::database::models::{Endpoint, HistoryEntry};
use crate::database::Repository;
use crate::monitoring::{
    Checker, HttpChecker, Incident, MonitoringExecutor, MonitoringScheduler, ProbeOutcome, classify,
};
use crate::notify::{self, Alert, Notifier};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to select due endpoints: {0}")]
    Selection(String),
}

/// Counters for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub selected: usize,
    pub probed: usize,
    pub opened: usize,
    pub closed: usize,
    pub history_failures: usize,
    pub upsert_failures: usize,
    pub notify_failures: usize,
}

/// Probing and transition-detection engine
pub struct Orchestrator {
    config: EngineConfig,
    repository: Arc<dyn Repository>,
    executor: MonitoringExecutor,
    scheduler: MonitoringScheduler,
    notifier: Arc<dyn Notifier>,
}

impl Orchestrator {
    pub fn new(
        config: EngineConfig,
        repository: Arc<dyn Repository>,
        checker: Arc<dyn Checker>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let scheduler = MonitoringScheduler::new(config.selection, config.success_code);
        Self { config, repository, executor: MonitoringExecutor::new(checker), scheduler, notifier }
    }

    /// Build the HTTP checker and notifier the configuration asks for
    pub fn from_config(config: &Config, repository: Arc<dyn Repository>) -> Result<Self> {
        let checker = Arc::new(HttpChecker::from_config(&config.engine)?);
        let notifier = notify::from_config(&config.notifier)?;

        Ok(Self::new(config.engine.clone(), repository, checker, notifier))
    }

    /// Execute one monitoring pass
    pub async fn run_once(&self) -> Result<RunReport, EngineError> {
        self.run_at(Utc::now()).await
    }

    /// Execute one monitoring pass selecting against `now`
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport, EngineError> {
        let endpoints = self
            .scheduler
            .select(self.repository.as_ref(), now)
            .await
            .map_err(|e| EngineError::Selection(format!("{e:#}")))?;

        let mut report = RunReport { selected: endpoints.len(), ..Default::default() };

        if endpoints.is_empty() {
            info!("No endpoints due");
            return Ok(report);
        }

        debug!(count = endpoints.len(), concurrency = self.config.concurrency, "Probing endpoints");
        let results = self.executor.run(endpoints, self.config.concurrency).await;

        for (endpoint, outcome) in results {
            self.process(endpoint, outcome, now, &mut report).await;
        }

        info!(
            selected = report.selected,
            probed = report.probed,
            opened = report.opened,
            closed = report.closed,
            history_failures = report.history_failures,
            upsert_failures = report.upsert_failures,
            notify_failures = report.notify_failures,
            "Monitoring pass finished"
        );

        Ok(report)
    }

    /// Run a pass every `period` until the task is dropped
    pub async fn run_forever(&self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Monitoring pass aborted");
            }
        }
    }

    async fn process(
        &self,
        mut endpoint: Endpoint,
        outcome: ProbeOutcome,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) {
        report.probed += 1;

        let status = outcome.code();
        let transition = classify(endpoint.last_status, status, self.config.success_code);

        info!(
            endpoint_id = %endpoint.id,
            url = %outcome.url,
            status = %status,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            transition = %transition,
            "Probed endpoint"
        );

        let entry = HistoryEntry::from_outcome(endpoint.id, &outcome, self.config.success_code, now);
        if let Err(e) = self.repository.insert_history(&entry).await {
            report.history_failures += 1;
            error!(endpoint_id = %endpoint.id, error = %e, "Failed to store history entry");
        }

        self.scheduler.advance(&mut endpoint, &outcome, now);
        if let Err(e) = self.repository.upsert_endpoint(&endpoint).await {
            report.upsert_failures += 1;
            error!(endpoint_id = %endpoint.id, error = %e, "Failed to update endpoint");
        }

        let Some(incident) = transition.incident() else {
            return;
        };
        match incident {
            Incident::Opened => report.opened += 1,
            Incident::Closed => report.closed += 1,
        }

        let alert = Alert::new(&endpoint, incident, status);
        if let Err(e) = self.notifier.notify(&alert).await {
            report.notify_failures += 1;
            warn!(endpoint_id = %endpoint.id, url = %endpoint.url, error = %e, "Failed to send notification");
        }
    }
}
