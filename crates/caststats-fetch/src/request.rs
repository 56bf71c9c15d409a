//! Outbound request description

use serde_json::Value;
use std::fmt;
use url::Url;

/// HTTP method used by a [`FetchRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Clone)]
struct Header {
    name: String,
    value: String,
    sensitive: bool,
}

/// A transport-independent HTTP request
///
/// Built fluently and reused across retry attempts, so every attempt sends
/// exactly the same request.
#[derive(Clone)]
pub struct FetchRequest {
    method: Method,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<Header>,
    bearer_token: Option<String>,
    body: Option<Value>,
}

impl FetchRequest {
    /// Start a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Start a POST request carrying a JSON body
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        let mut request = Self::new(Method::Post, url);
        request.body = Some(body);
        request
    }

    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            bearer_token: None,
            body: None,
        }
    }

    /// Append a query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Append a query parameter only when a value is present
    pub fn query_opt(self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header {
            name: name.into(),
            value: value.into(),
            sensitive: false,
        });
        self
    }

    /// Append a header whose value never appears in logs
    pub fn secret_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header {
            name: name.into(),
            value: value.into(),
            sensitive: true,
        });
        self
    }

    /// Authenticate with `Authorization: Bearer <token>` when a token is given
    pub fn bearer(mut self, token: Option<impl Into<String>>) -> Self {
        self.bearer_token = token.map(Into::into);
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The URL without query parameters
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// The URL with its query string, as sent on the wire
    ///
    /// Falls back to the raw URL when it does not parse; the transport
    /// reports that failure when the request is actually sent.
    pub fn full_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut url) => {
                if !self.query.is_empty() {
                    url.query_pairs_mut().extend_pairs(self.query.iter());
                }
                url.into()
            }
            Err(_) => self.url.clone(),
        }
    }
}

impl fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|h| {
                let value = if h.sensitive { "<redacted>" } else { h.value.as_str() };
                (h.name.as_str(), value)
            })
            .collect();

        f.debug_struct("FetchRequest")
            .field("method", &self.method.as_str())
            .field("url", &self.full_url())
            .field("headers", &headers)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("has_body", &self.body.is_some())
            .finish()
    }
}
