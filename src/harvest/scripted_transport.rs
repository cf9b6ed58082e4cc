//! An in-process [`Transport`] that replays canned replies, for unit tests.

use super::transport::{Response, Transport, TransportError};
use core::sync::atomic::{AtomicUsize, Ordering};
use core::time::Duration;
use ohno::app_err;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub enum Step {
    Reply(Response),
    /// Reply after holding the request open for a while.
    SlowReply(Duration, Response),
    TimeOut,
    Fail(&'static str),
    /// Never answer.
    Stall,
}

/// Replays the steps queued for each URL in order; once a URL's queue is down to its
/// last step, that step repeats. Unknown URLs get a 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, url: impl Into<String>, steps: impl IntoIterator<Item = Step>) -> Self {
        let _ = self.scripts.lock().unwrap().insert(url.into(), steps.into_iter().collect());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.dispatch_times(url).len()
    }

    /// When each request for `url` was issued, in order.
    pub fn dispatch_times(&self, url: &str) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().filter(|(u, _)| u == url).map(|(_, at)| *at).collect()
    }

    /// Requests currently in flight.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn next_step(&self, url: &str) -> Step {
        self.calls.lock().unwrap().push((url.to_string(), Instant::now()));

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Step::Reply(Response::new(404, r#"{"message":"Not Found"}"#)),
        }
    }
}

/// Counts a request as in flight until dropped, so cancelled requests are released too.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let _ = self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<Response, TransportError> {
        let step = self.next_step(url);

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _in_flight = InFlight(&self.active);

        match step {
            Step::Reply(resp) => Ok(resp),
            Step::SlowReply(delay, resp) => {
                tokio::time::sleep(delay).await;
                Ok(resp)
            }
            Step::TimeOut => Err(TransportError::TimedOut),
            Step::Fail(msg) => Err(TransportError::Failed(app_err!("{msg}"))),
            Step::Stall => {
                core::future::pending::<()>().await;
                Err(TransportError::Failed(app_err!("unreachable")))
            }
        }
    }
}

/// A repository resource body with the given star count.
pub fn repo_body(stars: u64) -> String {
    format!(r#"{{"stargazers_count":{stars},"default_branch":"main"}}"#)
}

pub fn ok(stars: u64) -> Step {
    Step::Reply(Response::new(200, repo_body(stars)))
}

pub fn rate_limited() -> Step {
    Step::Reply(Response::new(403, r#"{"message":"API rate limit exceeded"}"#))
}
