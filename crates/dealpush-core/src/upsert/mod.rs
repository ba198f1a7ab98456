//! Single-record upsert: one POST per attempt, transient-aware retry loop,
//! outcome classification.

mod body;
mod outcome;

pub use outcome::{DeliveryOutcome, DeliveryReport, FailureReason};

use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::record::Record;
use crate::retry::{
    classify_http_status, classify_transport_error, Backoff, ErrorKind, RetryDecision, RetryPolicy,
    DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS,
};

use self::body::{drain, read_snippet, BODY_SNIPPET_LIMIT};

/// Header carrying the optional API key.
pub const API_KEY_HEADER: &str = "X-API-Key";
/// Path appended to the base URL.
pub const DEALS_PATH: &str = "/deals";

/// Plain parameters for building an [`UpsertClient`].
#[derive(Debug, Clone)]
pub struct UpsertConfig {
    /// Base URL; requests go to `{base_url}/deals`.
    pub base_url: String,
    pub api_key: Option<String>,
    /// Bounds one request/response cycle, not the whole retry sequence.
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Fixed jitter seed; `None` seeds from the OS.
    pub jitter_seed: Option<u64>,
}

impl Default for UpsertConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001/api".to_string(),
            api_key: None,
            timeout: Duration::from_secs(8),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            jitter_seed: None,
        }
    }
}

/// Result of a single attempt.
enum Attempt {
    Decided(DeliveryOutcome),
    Failed { kind: ErrorKind, reason: FailureReason },
}

/// Delivers records to the upsert endpoint over a shared connection pool.
///
/// Safe to share across tasks; the pool and the backoff RNG are the only
/// shared state.
#[derive(Debug)]
pub struct UpsertClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    policy: RetryPolicy,
}

impl UpsertClient {
    pub fn new(config: UpsertConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(100)
            .build()
            .context("build HTTP client")?;
        let backoff = match config.jitter_seed {
            Some(seed) => Backoff::seeded(config.base_delay, seed),
            None => Backoff::new(config.base_delay),
        };
        Ok(Self {
            http,
            endpoint: format!("{}{}", config.base_url.trim_end_matches('/'), DEALS_PATH),
            api_key: config.api_key,
            policy: RetryPolicy::new(config.max_attempts, backoff),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver one record, retrying transient failures with backoff.
    ///
    /// The payload is serialized once and reused for every attempt. Cancelling
    /// `cancel` stops the sequence at the next suspension point (before a
    /// request, during a request, or during a backoff sleep) with
    /// [`FailureReason::Cancelled`].
    pub async fn deliver(&self, record: &Record, cancel: &CancellationToken) -> DeliveryReport {
        let payload = match serde_json::to_vec(record) {
            Ok(p) => p,
            Err(e) => return DeliveryReport::failed(FailureReason::Encode(e.to_string()), 0),
        };

        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return DeliveryReport::failed(FailureReason::Cancelled, attempt);
            }
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return DeliveryReport::failed(FailureReason::Cancelled, attempt + 1);
                }
                r = self.attempt_once(payload.clone()) => r,
            };
            let attempts = attempt + 1;

            let (kind, reason) = match result {
                Attempt::Decided(outcome) => return DeliveryReport::new(outcome, attempts),
                Attempt::Failed { kind, reason } => (kind, reason),
            };

            match self.policy.decide(attempt, kind) {
                RetryDecision::NoRetry => return DeliveryReport::failed(reason, attempts),
                RetryDecision::Exhausted => {
                    let reason = FailureReason::RetriesExhausted {
                        attempts,
                        last: Box::new(reason),
                    };
                    return DeliveryReport::failed(reason, attempts);
                }
                RetryDecision::RetryAfter(delay) => {
                    tracing::debug!(
                        id = record.id,
                        attempt,
                        ?kind,
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying: {}",
                        reason
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return DeliveryReport::failed(FailureReason::Cancelled, attempts);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Issue one POST and classify the result. The response body is always
    /// consumed before returning.
    async fn attempt_once(&self, payload: Vec<u8>) -> Attempt {
        let mut req = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(payload);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) => {
                let kind = classify_transport_error(&e);
                let reason = FailureReason::Transport(format!("{:#}", anyhow::Error::from(e)));
                return Attempt::Failed { kind, reason };
            }
        };

        let code = resp.status().as_u16();
        match code {
            200 => {
                drain(resp).await;
                Attempt::Decided(DeliveryOutcome::Sent)
            }
            202 => {
                drain(resp).await;
                Attempt::Decided(DeliveryOutcome::Suppressed)
            }
            _ => {
                let body = read_snippet(resp, BODY_SNIPPET_LIMIT).await;
                Attempt::Failed {
                    kind: classify_http_status(code),
                    reason: FailureReason::Status { code, body },
                }
            }
        }
    }
}
