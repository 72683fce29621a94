use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error};

use super::checker::Checker;
use super::types::ProbeOutcome;
use crate::database::models::Endpoint;

/// Fixed-size pool of probe workers
pub struct MonitoringExecutor {
    checker: Arc<dyn Checker>,
}

impl MonitoringExecutor {
    pub fn new(checker: Arc<dyn Checker>) -> Self {
        Self { checker }
    }

    /// Probe every endpoint with at most `concurrency` probes in flight.
    ///
    /// Exactly one outcome comes back per endpoint, in completion order.
    pub async fn run(&self, endpoints: Vec<Endpoint>, concurrency: usize) -> Vec<(Endpoint, ProbeOutcome)> {
        let total = endpoints.len();
        if total == 0 {
            return Vec::new();
        }

        let concurrency = concurrency.max(1);
        let (work_tx, work_rx) = mpsc::channel::<Endpoint>(2 * concurrency);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();

        let workers: Vec<_> = (0..concurrency)
            .map(|worker| {
                let checker = Arc::clone(&self.checker);
                let work_rx = Arc::clone(&work_rx);
                let result_tx = result_tx.clone();

                tokio::spawn(async move {
                    loop {
                        let next = work_rx.lock().await.recv().await;
                        let Some(endpoint) = next else { break };

                        let outcome = probe_isolated(checker.as_ref(), &endpoint.url).await;
                        if result_tx.send((endpoint, outcome)).is_err() {
                            break;
                        }
                    }
                    debug!(worker, "Probe worker drained queue");
                })
            })
            .collect();
        drop(result_tx);

        for endpoint in endpoints {
            if work_tx.send(endpoint).await.is_err() {
                error!("All probe workers exited before the queue was drained");
                break;
            }
        }
        drop(work_tx);

        for joined in futures::future::join_all(workers).await {
            if let Err(e) = joined {
                error!(error = %e, "Probe worker terminated abnormally");
            }
        }

        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }
        results
    }
}

/// A panicking checker still yields an outcome for its endpoint
async fn probe_isolated(checker: &dyn Checker, url: &str) -> ProbeOutcome {
    let started_at = Utc::now();
    let start = Instant::now();

    match AssertUnwindSafe(checker.probe(url)).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => {
            error!(url, "Probe panicked");
            ProbeOutcome::unreachable(url.to_string(), started_at, start.elapsed(), "probe panicked")
        }
    }
}
