use anyhow::Result;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::types::ProbeOutcome;
use crate::config::EngineConfig;

/// A single attempt against a URL.
///
/// Implementations never fail: transport problems are folded into an
/// unreachable outcome so one bad endpoint cannot abort a pass.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeOutcome;
}

/// Prefix `http://` when the URL carries no scheme at all
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if has_scheme(trimmed) { trimmed.to_string() } else { format!("http://{trimmed}") }
}

/// RFC 3986 scheme followed by `://`, so a URL nested in the query is ignored
fn has_scheme(url: &str) -> bool {
    let Some((scheme, _)) = url.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// HTTP GET checker
pub struct HttpChecker {
    client: reqwest::Client,
    timeout: Duration,
    normalize_scheme: bool,
    max_body_bytes: usize,
}

impl HttpChecker {
    pub fn new(timeout: Duration, normalize_scheme: bool, max_body_bytes: usize) -> Result<Self> {
        // Redirects are observed, not followed: a 301 is reported as a 301.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client, timeout, normalize_scheme, max_body_bytes })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(
            Duration::from_secs(config.timeout_seconds),
            config.normalize_scheme,
            config.max_body_bytes,
        )
    }

    /// Drain the whole body so the elapsed time covers the full fetch, keeping
    /// at most `max_body_bytes` of it.
    ///
    /// Only a timeout is returned as an error; any other read failure keeps
    /// the partial content.
    async fn read_body(&self, mut response: reqwest::Response, url: &str) -> Result<String, reqwest::Error> {
        let mut buf = Vec::new();

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let room = self.max_body_bytes.saturating_sub(buf.len());
                    buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
                }
                Ok(None) => break,
                Err(e) if e.is_timeout() => return Err(e),
                Err(e) => {
                    warn!(url, error = %e, "Failed to read response body, keeping partial content");
                    break;
                }
            }
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn describe(&self, error: &reqwest::Error) -> String {
        if error.is_timeout() {
            format!("timed out after {:?}", self.timeout)
        } else if error.is_connect() {
            format!("connection failed: {error}")
        } else {
            format!("request failed: {error}")
        }
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn probe(&self, url: &str) -> ProbeOutcome {
        let url = if self.normalize_scheme { normalize_url(url) } else { url.trim().to_string() };

        let started_at = Utc::now();
        let start = Instant::now();

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = self.describe(&e);
                warn!(url = %url, reason = %reason, "Probe could not reach endpoint");
                return ProbeOutcome::unreachable(url, started_at, start.elapsed(), reason);
            }
        };

        let code = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = match self.read_body(response, &url).await {
            Ok(body) => body,
            Err(e) => {
                let reason = self.describe(&e);
                warn!(url = %url, status = code, reason = %reason, "Probe timed out reading the body");
                return ProbeOutcome::unreachable(url, started_at, start.elapsed(), reason);
            }
        };
        let elapsed = start.elapsed();

        debug!(url = %url, status = code, elapsed_ms = elapsed.as_millis() as u64, "Probe finished");

        ProbeOutcome::responded(url, started_at, elapsed, code, content_type, body)
    }
}
