//! Test doubles for the transport seam.
//!
//! [`ScriptedTransport`] answers requests from per-route scripts so fetcher,
//! source and aggregator tests run without a network and, combined with
//! tokio's paused clock, without real waiting.

use crate::rate_gate::RateGate;
use crate::request::FetchRequest;
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, RawResponse, TransportError};
use crate::ResilientFetcher;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize logging for tests once per test binary.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = fmt().with_test_writer().with_env_filter(filter).try_init();
    });
}

/// One scripted reaction to a request.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Respond with `status` and a raw body
    Respond { status: u16, body: String },
    /// Respond 429, optionally with a parsed `Retry-After`
    RateLimited(Option<Duration>),
    /// Never respond; only a timeout ends the attempt
    Hang,
    /// Fail before any response arrives
    Fail(String),
}

impl Scripted {
    /// A 200 response carrying `value`
    pub fn json(value: Value) -> Self {
        Self::Respond {
            status: 200,
            body: value.to_string(),
        }
    }

    /// An empty response with the given status
    pub fn status(status: u16) -> Self {
        Self::Respond {
            status,
            body: String::new(),
        }
    }

    pub fn body(status: u16, body: impl Into<String>) -> Self {
        Self::Respond {
            status,
            body: body.into(),
        }
    }

    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited(retry_after)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

#[derive(Debug)]
struct Route {
    pattern: String,
    script: VecDeque<Scripted>,
    /// Replayed once the script runs dry
    last: Option<Scripted>,
}

/// A transport that replays scripted responses per URL pattern.
///
/// A request matches the first route whose pattern is a substring of its
/// full URL (query included). Each route plays its script in order and then
/// keeps repeating the final entry. Unmatched requests fail at the transport.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route answering requests whose URL contains `pattern`.
    pub fn route(self, pattern: impl Into<String>, script: impl IntoIterator<Item = Scripted>) -> Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(Route {
                pattern: pattern.into(),
                script: script.into_iter().collect(),
                last: None,
            });
        }
        self
    }

    /// Full URLs of every request received, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    /// Number of requests whose URL contains `pattern`.
    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|url| url.contains(pattern))
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls().len()
    }

    fn next_for(&self, url: &str) -> Option<Scripted> {
        let mut routes = self.routes.lock().ok()?;
        let route = routes.iter_mut().find(|route| url.contains(&route.pattern))?;

        match route.script.pop_front() {
            Some(step) => {
                route.last = Some(step.clone());
                Some(step)
            }
            None => route.last.clone(),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &FetchRequest) -> Result<RawResponse, TransportError> {
        let url = request.full_url();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.clone());
        }

        match self.next_for(&url) {
            Some(Scripted::Respond { status, body }) => Ok(RawResponse {
                status,
                retry_after: None,
                body,
            }),
            Some(Scripted::RateLimited(retry_after)) => Ok(RawResponse {
                status: 429,
                retry_after,
                body: String::new(),
            }),
            Some(Scripted::Hang) => {
                std::future::pending::<()>().await;
                Err(TransportError::new("hang ended"))
            }
            Some(Scripted::Fail(message)) => Err(TransportError::new(message)),
            None => Err(TransportError::new(format!("no scripted response for {url}"))),
        }
    }
}

/// A fetcher over `transport` with an unlimited rate gate.
pub fn scripted_fetcher(transport: Arc<ScriptedTransport>, policy: RetryPolicy) -> ResilientFetcher {
    ResilientFetcher::new(transport, Arc::new(RateGate::unlimited()), policy)
}

/// Short timeouts and backoff so paused-clock tests stay readable.
pub fn test_policy() -> RetryPolicy {
    RetryPolicy::default()
        .with_attempt_timeout(Duration::from_secs(1))
        .with_backoff(Duration::from_millis(100), Duration::from_secs(1))
        .with_rate_limit_cooldown(Duration::from_secs(5))
}
