//! HTTP transport seam and the reqwest-backed production transport

use crate::request::{FetchRequest, Method};
use async_trait::async_trait;
use caststats_common::{CastStatsError, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// A response as seen by the fetcher, before any JSON parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, when present and well formed
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response (DNS, connect, TLS, reset, body read)
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_connect() {
            "Connection error"
        } else if err.is_timeout() {
            "Transport timeout"
        } else if err.is_body() || err.is_decode() {
            "Failed to read response body"
        } else {
            "Request failed"
        };
        TransportError::with_source(message, err)
    }
}

/// Sends one HTTP request and returns the raw response
///
/// Implementations perform a single attempt. Retries, timeouts and pacing
/// belong to [`crate::ResilientFetcher`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &FetchRequest) -> std::result::Result<RawResponse, TransportError>;
}

/// Production transport backed by a pooled [`reqwest::Client`]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a pooled client identifying itself with `user_agent`
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| CastStatsError::network_with_source("Failed to create HTTP client", e))?;

        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip(self, request), fields(method = request.method().as_str(), url = %request.url()))]
    async fn send(&self, request: &FetchRequest) -> std::result::Result<RawResponse, TransportError> {
        let mut builder = match request.method() {
            Method::Get => self.client.get(request.url()),
            Method::Post => self.client.post(request.url()),
        };

        builder = builder
            .query(request.query_pairs())
            .header(ACCEPT, "application/json");

        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }

        if let Some(token) = request.bearer_token() {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_retry_after(value, Utc::now()));

        let body = response.text().await?;
        debug!("Received {} ({} bytes)", status, body.len());

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date
///
/// Dates in the past yield a zero delay. Anything else is ignored.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delay = date.with_timezone(&Utc) - now;
    Some(delay.to_std().unwrap_or(Duration::ZERO))
}
