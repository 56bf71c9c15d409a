//! Resilient upstream fetching for caststats
//!
//! [`ResilientFetcher`] wraps an [`HttpTransport`] with a hard per-attempt
//! timeout, sequential retries with exponential backoff, `Retry-After`
//! handling for HTTP 429 and a process-wide [`RateGate`]. Its only failure
//! is [`FetchError::Exhausted`].

pub mod fetcher;
pub mod rate_gate;
pub mod request;
pub mod retry;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use fetcher::{AttemptError, FetchError, ResilientFetcher};
pub use rate_gate::{RateGate, MAX_DEFERRAL};
pub use request::{FetchRequest, Method};
pub use retry::RetryPolicy;
pub use transport::{parse_retry_after, HttpTransport, RawResponse, ReqwestTransport, TransportError};
