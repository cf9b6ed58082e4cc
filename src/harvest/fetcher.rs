//! Turning one repository identifier into one [`FetchResult`].
//!
//! Every request goes through the shared [`Throttler`] and is bounded by a per-request
//! timeout. Rate-limit replies halt dispatch for everyone and are retried after a backoff,
//! with no cap on the number of attempts. A 404 or a timeout yields an absent result;
//! anything else unexpected is fatal.

use super::outcome::Outcome;
use super::repository::Repository;
use super::request_tracker::{RequestTracker, TopicStatus, TrackedTopic};
use super::throttler::Throttler;
use super::transport::{Transport, TransportError};
use super::{CacheStore, FetchResult, RepoId};
use crate::Result;
use chrono::{Local, TimeDelta};
use core::time::Duration;
use ohno::{EnrichableExt, bail};
use std::sync::Arc;

const LOG_TARGET: &str = "   fetcher";

/// Upper bound on a server-suggested wait.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(3600);

/// Knobs for a [`Fetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Base of the REST API, without a trailing slash.
    pub api_base_url: String,
    pub max_concurrent_requests: usize,
    /// How long to wait after a rate-limit reply that carries no usable hint.
    pub rate_limit_backoff: Duration,
    pub request_timeout: Duration,
}

/// A request that came back with something other than a fatal error.
#[derive(Debug)]
enum Reply {
    Found(String),
    NotFound,
    TimedOut,
}

#[derive(Debug)]
pub struct Fetcher<T, C> {
    transport: T,
    cache: C,
    throttler: Arc<Throttler>,
    api_base_url: String,
    rate_limit_backoff: Duration,
    request_timeout: Duration,
}

impl<T: Transport, C: CacheStore> Fetcher<T, C> {
    pub fn new(transport: T, cache: C, settings: &FetchSettings) -> Result<Self> {
        if settings.max_concurrent_requests == 0 {
            bail!("max_concurrent_requests must be at least 1");
        }

        Ok(Self {
            transport,
            cache,
            throttler: Throttler::new(settings.max_concurrent_requests),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            rate_limit_backoff: settings.rate_limit_backoff,
            request_timeout: settings.request_timeout,
        })
    }

    /// The URL of a repository resource; also its cache key.
    #[must_use]
    pub fn repo_url(&self, id: &RepoId) -> String {
        format!("{}/repos/{id}", self.api_base_url)
    }

    #[must_use]
    pub const fn throttler(&self) -> &Arc<Throttler> {
        &self.throttler
    }

    #[cfg(test)]
    pub(crate) const fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub const fn cache(&self) -> &C {
        &self.cache
    }

    /// Get the star count of `id`, from the cache when possible.
    pub async fn fetch(&self, id: &RepoId, tracker: &RequestTracker) -> Result<FetchResult> {
        let url = self.repo_url(id);

        if let Some(entry) = self.cache.get(&url) {
            match Repository::parse(&entry.payload) {
                Ok(repo) => {
                    log::debug!(target: LOG_TARGET, "Using cached star count for '{id}'");
                    return Ok(FetchResult::found(id.clone(), repo.stargazers_count));
                }
                Err(e) => log::debug!(target: LOG_TARGET, "Ignoring unreadable cached response for '{id}': {e:#}"),
            }
        }

        log::info!(target: LOG_TARGET, "Querying star count for repository '{id}'");

        let enrich = |e: ohno::AppError| e.enrich_with(|| format!("could not fetch star count for repository '{id}'"));
        match self.request(&url, tracker, TrackedTopic::Repos).await.map_err(enrich)? {
            Reply::Found(body) => {
                let repo = Repository::parse(&body).map_err(enrich)?;
                if let Err(e) = self.cache.put(&url, &body) {
                    log::warn!(target: LOG_TARGET, "Could not cache response for '{id}': {e:#}");
                }
                Ok(FetchResult::found(id.clone(), repo.stargazers_count))
            }
            Reply::NotFound => {
                log::info!(target: LOG_TARGET, "Repository '{id}' not found (404)");
                Ok(FetchResult::absent(id.clone()))
            }
            Reply::TimedOut => {
                log::warn!(target: LOG_TARGET, "Request for repository '{id}' timed out, counting it as absent");
                Ok(FetchResult::absent(id.clone()))
            }
        }
    }

    /// Look up a repository's metadata, bypassing the cache.
    ///
    /// Returns `None` when the repository doesn't exist. A timeout is an error here.
    pub async fn repository(&self, id: &RepoId, tracker: &RequestTracker) -> Result<Option<Repository>> {
        let url = self.repo_url(id);
        let enrich = |e: ohno::AppError| e.enrich_with(|| format!("could not fetch metadata for repository '{id}'"));

        match self.request(&url, tracker, TrackedTopic::Source).await.map_err(enrich)? {
            Reply::Found(body) => Repository::parse(&body).map(Some).map_err(enrich),
            Reply::NotFound => Ok(None),
            Reply::TimedOut => Err(enrich(ohno::app_err!("request timed out"))),
        }
    }

    /// Download an arbitrary document, bypassing the cache.
    ///
    /// Returns `None` on a 404. A timeout is an error here.
    pub async fn text(&self, url: &str, tracker: &RequestTracker) -> Result<Option<String>> {
        let enrich = |e: ohno::AppError| e.enrich_with(|| format!("could not download '{url}'"));

        match self.request(url, tracker, TrackedTopic::Source).await.map_err(enrich)? {
            Reply::Found(body) => Ok(Some(body)),
            Reply::NotFound => Ok(None),
            Reply::TimedOut => Err(enrich(ohno::app_err!("request timed out"))),
        }
    }

    /// Issue a GET until it produces a non-rate-limited answer.
    async fn request(&self, url: &str, tracker: &RequestTracker, topic: TrackedTopic) -> Result<Reply> {
        loop {
            let permit = self.throttler.acquire().await?;
            let attempt = tokio::time::timeout(self.request_timeout, self.transport.get(url))
                .await
                .unwrap_or(Err(TransportError::TimedOut));

            // any pause is in place before the permit goes back to the pool
            let delay = match Outcome::classify(attempt) {
                Outcome::Found {
                    body,
                    quota_exhausted,
                    retry_after,
                } => {
                    // the quota is spent; hold everyone else back until it resets
                    if quota_exhausted && let Some(wait) = retry_after {
                        self.pause_dispatch(wait.min(MAX_RATE_LIMIT_WAIT), url, tracker, topic);
                    }
                    return Ok(Reply::Found(body));
                }
                Outcome::NotFound => return Ok(Reply::NotFound),
                Outcome::TimedOut => return Ok(Reply::TimedOut),
                Outcome::Fatal(e) => return Err(e),
                Outcome::RateLimited(hint) => {
                    let delay = self.backoff_delay(hint);
                    log::warn!(target: LOG_TARGET, "Hit rate limit requesting '{url}', retrying in {}s", delay.as_secs());
                    self.pause_dispatch(delay, url, tracker, topic);
                    delay
                }
            };
            drop(permit);

            tokio::time::sleep(delay).await;

            if !self.throttler.is_paused() {
                tracker.set_topic_status(topic, TopicStatus::Active);
            }
        }
    }

    /// The configured backoff, stretched to honor a longer server hint.
    fn backoff_delay(&self, hint: Option<Duration>) -> Duration {
        hint.map_or(self.rate_limit_backoff, |h| h.min(MAX_RATE_LIMIT_WAIT).max(self.rate_limit_backoff))
    }

    fn pause_dispatch(&self, delay: Duration, url: &str, tracker: &RequestTracker, topic: TrackedTopic) {
        if !self.throttler.pause_for(delay) {
            return;
        }

        tracker.set_topic_status(topic, TopicStatus::Blocked);

        let resume_at = Local::now() + TimeDelta::from_std(delay).unwrap_or(TimeDelta::zero());
        log::info!(target: LOG_TARGET, "Pausing all requests until {} after '{url}'", resume_at.format("%T"));
        if !log::log_enabled!(log::Level::Info) {
            tracker.println(&format!("Rate limit hit: waiting until {}...", resume_at.format("%T")));
        }
    }
}
