use super::transport::{Response, TransportError};
use core::time::Duration;
use ohno::app_err;

/// How a single request attempt turned out, from the fetcher's point of view.
#[derive(Debug)]
pub enum Outcome {
    /// The resource exists; carries the raw body and whether the quota is now spent.
    Found { body: String, quota_exhausted: bool, retry_after: Option<Duration> },

    /// The service says the resource doesn't exist (404).
    NotFound,

    /// The service refused to answer right now (403 or 429); carries its backoff hint, if any.
    RateLimited(Option<Duration>),

    /// The request ran out of time.
    TimedOut,

    /// Anything else. Not retried.
    Fatal(ohno::AppError),
}

impl Outcome {
    /// Classify the result of one transport call.
    #[must_use]
    pub fn classify(result: Result<Response, TransportError>) -> Self {
        let resp = match result {
            Ok(resp) => resp,
            Err(TransportError::TimedOut) => return Self::TimedOut,
            Err(TransportError::Failed(e)) => return Self::Fatal(e),
        };

        match resp.status {
            200..=299 => Self::Found {
                body: resp.body,
                quota_exhausted: resp.quota_exhausted,
                retry_after: resp.retry_after,
            },
            404 => Self::NotFound,
            403 | 429 => Self::RateLimited(resp.retry_after),
            status => Self::Fatal(app_err!("unexpected HTTP status {status}")),
        }
    }
}
