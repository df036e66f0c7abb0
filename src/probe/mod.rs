//! Probe module for HTTP health checks.
//!
//! A probe never fails: every outcome, including timeouts and refused
//! connections, is classified into a [`CheckResult`].

mod http;

pub use http::*;

use crate::db::{CheckResult, Status, Target};

use chrono::Utc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Responses slower than this are reported as degraded.
pub const SLOW_RESPONSE_MS: u64 = 3000;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Upper bound of the random delay before a probe starts.
    pub max_jitter: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_jitter: Duration::from_millis(100),
        }
    }
}

impl ProbeConfig {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// Status and reason assigned to one probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub status: Status,
    pub status_text: &'static str,
}

impl Classification {
    const fn new(status: Status, status_text: &'static str) -> Self {
        Self { status, status_text }
    }
}

/// Classify a probe outcome.
///
/// Rules apply in order: no response, 5xx, 4xx, slow, 2xx, anything else.
/// A slow 4xx/5xx is therefore classified by its code.
pub fn classify(status_code: Option<u16>, response_time_ms: u64) -> Classification {
    let code = match status_code {
        None => return Classification::new(Status::Outage, "Connection Failed"),
        Some(code) => code,
    };

    if code >= 500 {
        Classification::new(Status::Outage, "Server Error")
    } else if code >= 400 {
        Classification::new(Status::Degraded, "Client Error")
    } else if response_time_ms > SLOW_RESPONSE_MS {
        Classification::new(Status::Degraded, "Slow Response")
    } else if (200..300).contains(&code) {
        Classification::new(Status::Operational, "Operational")
    } else {
        Classification::new(Status::Degraded, "Unusual Response")
    }
}

/// Issues probes with a shared HTTP client.
#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
    config: ProbeConfig,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Result<Self, ProbeError> {
        let client = build_http_client(config.timeout)?;
        Ok(Self { client, config })
    }

    /// Probe a single target once.
    pub async fn probe(&self, target: &Target) -> CheckResult {
        // Spread a fleet's requests out a little
        let max_jitter = self.config.max_jitter.as_millis() as u64;
        if max_jitter > 0 {
            let jitter = rand::random::<u64>() % max_jitter;
            tokio::time::sleep(Duration::from_millis(jitter)).await;
        }

        let checked_at = Utc::now();
        let start = Instant::now();
        let outcome = run_http_probe(&self.client, &target.url, self.config.timeout).await;
        let response_time = start.elapsed().as_millis() as u64;

        let (status_code, error) = match outcome {
            Ok(code) => (Some(code), None),
            Err(e) => (None, Some(e.to_string())),
        };
        let class = classify(status_code, response_time);

        match &error {
            Some(e) => tracing::debug!("Probe {} failed after {}ms: {}", target.id, response_time, e),
            None => tracing::debug!(
                "Probe {} -> {} ({}) in {}ms",
                target.id,
                class.status,
                status_code.unwrap_or_default(),
                response_time
            ),
        }

        CheckResult {
            id: target.id.clone(),
            name: target.name.clone(),
            url: target.url.clone(),
            icon: target.icon.clone(),
            description: target.description.clone(),
            status: class.status,
            status_text: class.status_text.to_string(),
            status_code,
            response_time,
            error,
            last_checked: checked_at,
        }
    }
}
