//! Retrying, timeout-bounded JSON fetcher

use crate::rate_gate::RateGate;
use crate::request::FetchRequest;
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, RawResponse, TransportError};
use caststats_common::CastStatsError;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Why a single attempt failed
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("upstream returned HTTP {status}")]
    Status {
        status: u16,
        retry_after: Option<Duration>,
    },

    #[error("response body is not valid JSON: {0}")]
    MalformedBody(#[source] serde_json::Error),
}

impl AttemptError {
    /// How long the shared rate gate should hold off after this failure
    pub fn rate_limit_delay(&self, policy: &RetryPolicy) -> Option<Duration> {
        match self {
            AttemptError::Status {
                status: HTTP_TOO_MANY_REQUESTS,
                retry_after,
            } => Some(policy.rate_limit_deferral(*retry_after)),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AttemptError::Timeout(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Terminal failure of a fetch
#[derive(Debug, Error)]
pub enum FetchError {
    /// Every attempt failed; carries the last attempt's error
    #[error("{url}: gave up after {attempts} attempt(s)")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last_error: AttemptError,
    },
}

impl FetchError {
    pub fn attempts(&self) -> u32 {
        match self {
            FetchError::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn last_error(&self) -> &AttemptError {
        match self {
            FetchError::Exhausted { last_error, .. } => last_error,
        }
    }
}

impl From<FetchError> for CastStatsError {
    fn from(err: FetchError) -> Self {
        CastStatsError::network_with_source("Upstream fetch failed", err)
    }
}

/// Fetches JSON documents with retries, per-attempt timeouts and shared pacing
#[derive(Clone)]
pub struct ResilientFetcher {
    transport: Arc<dyn HttpTransport>,
    gate: Arc<RateGate>,
    policy: RetryPolicy,
}

impl ResilientFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, gate: Arc<RateGate>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            gate,
            policy,
        }
    }

    /// The policy used by [`ResilientFetcher::fetch_json`]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn gate(&self) -> &Arc<RateGate> {
        &self.gate
    }

    /// Fetch with the configured policy
    pub async fn fetch_json(&self, request: &FetchRequest) -> Result<Value, FetchError> {
        self.fetch(request, &self.policy).await
    }

    /// Fetch `request`, retrying sequentially until it yields a JSON document
    /// or `policy.max_attempts` attempts have failed
    #[instrument(skip(self, request, policy), fields(url = %request.url(), max_attempts = policy.attempts()))]
    pub async fn fetch(&self, request: &FetchRequest, policy: &RetryPolicy) -> Result<Value, FetchError> {
        let attempts = policy.attempts();
        let mut backoff = policy.backoff_schedule();
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.gate.wait_ready().await;

            let err = match self.attempt(request, policy.attempt_timeout).await {
                Ok(value) => {
                    debug!("Attempt {}/{} succeeded", attempt, attempts);
                    return Ok(value);
                }
                Err(err) => err,
            };

            warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, request.url(), err);

            // A 429 holds every caller back, including after the final attempt.
            let rate_limited = err.rate_limit_delay(policy);
            if let Some(delay) = rate_limited {
                self.gate.defer_for(delay);
            }

            if attempt >= attempts {
                return Err(FetchError::Exhausted {
                    url: request.url().to_string(),
                    attempts,
                    last_error: err,
                });
            }

            if rate_limited.is_none() {
                let delay = backoff.next().unwrap_or(policy.max_backoff);
                debug!("Backing off {:?} before attempt {}", delay, attempt + 1);
                sleep(delay).await;
            }
        }
    }

    async fn attempt(&self, request: &FetchRequest, limit: Duration) -> Result<Value, AttemptError> {
        // Dropping the send future on timeout cancels the in-flight request.
        let response: RawResponse = timeout(limit, self.transport.send(request))
            .await
            .map_err(|_| AttemptError::Timeout(limit))??;

        if !response.is_success() {
            return Err(AttemptError::Status {
                status: response.status,
                retry_after: response.retry_after,
            });
        }

        serde_json::from_str(&response.body).map_err(AttemptError::MalformedBody)
    }
}

impl std::fmt::Debug for ResilientFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientFetcher")
            .field("gate", &self.gate)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
