//! The HTTP session used to reach the hosting service.
//!
//! [`Transport`] is the seam between the fetcher and the network: production code uses
//! [`HttpTransport`] (a thin wrapper over `reqwest`), tests substitute scripted fakes.

use chrono::{DateTime, Utc};
use core::time::Duration;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};

/// What the fetcher needs to know about one HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,

    /// How long the service asked us to wait, from `Retry-After` or `x-ratelimit-reset`.
    pub retry_after: Option<Duration>,

    /// Whether `x-ratelimit-remaining` reported an exhausted quota.
    pub quota_exhausted: bool,
}

impl Response {
    /// A response with no rate-limit headers.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
            quota_exhausted: false,
        }
    }
}

/// Why a request produced no response.
#[derive(Debug)]
pub enum TransportError {
    /// The request did not complete within its time budget.
    TimedOut,

    /// Any other failure: DNS, connection reset, TLS, body decoding...
    Failed(ohno::AppError),
}

/// Issues GET requests on behalf of the fetcher.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

/// Production transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport, optionally authenticating with a personal access token.
    ///
    /// `timeout` bounds each request from connect to the last body byte.
    pub fn new(token: Option<&str>, timeout: Duration) -> crate::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("awesome-rank/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout);

        if let Some(token) = token {
            let mut auth = HeaderValue::from_str(&format!("token {token}"))?;
            auth.set_sensitive(true);

            let mut headers = HeaderMap::new();
            let _ = headers.insert(AUTHORIZATION, auth);
            builder = builder.default_headers(headers);
        }

        Ok(Self { client: builder.build()? })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Response, TransportError> {
        let resp = self.client.get(url).send().await.map_err(classify_error)?;

        let status = resp.status().as_u16();
        let retry_after = retry_after_from_headers(resp.headers(), Utc::now());
        let quota_exhausted = quota_exhausted(resp.headers());
        let body = resp.text().await.map_err(classify_error)?;

        Ok(Response {
            status,
            body,
            retry_after,
            quota_exhausted,
        })
    }
}

fn classify_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::TimedOut
    } else {
        TransportError::Failed(e.into())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

/// Work out how long the service wants us to back off, if it said so.
///
/// `Retry-After` (in seconds) wins; otherwise an `x-ratelimit-reset` epoch timestamp
/// is turned into a delay relative to `now`.
fn retry_after_from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(secs) = header_str(headers, RETRY_AFTER.as_str()).and_then(|s| s.trim().parse::<u64>().ok()) {
        return Some(Duration::from_secs(secs));
    }

    let reset = header_str(headers, "x-ratelimit-reset")?.trim().parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset, 0)?;
    (reset_at - now).to_std().ok()
}

fn quota_exhausted(headers: &HeaderMap) -> bool {
    header_str(headers, "x-ratelimit-remaining")
        .and_then(|s| s.trim().parse::<u64>().ok())
        .is_some_and(|remaining| remaining == 0)
}
