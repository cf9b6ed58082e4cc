use crate::Result;
use core::time::Duration;
use ohno::IntoAppError;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Caps the number of requests in flight and lets any worker halt dispatch for a while.
///
/// Every request holds a permit from [`Throttler::acquire`] while it is on the wire. When a
/// worker hits a rate limit it calls [`Throttler::pause_for`]; until the pause expires no
/// new permits are handed out, though requests already in flight run to completion.
/// Overlapping pauses don't stack: the one that ends last wins.
#[derive(Debug)]
pub struct Throttler {
    semaphore: Arc<Semaphore>,
    resume_at: Mutex<Option<Instant>>,
}

impl Throttler {
    /// A new pause must end at least this much later than the active one to replace it,
    /// so workers that observed the same rate-limit window don't keep extending it.
    const MIN_PAUSE_EXTENSION: Duration = Duration::from_secs(1);

    #[must_use]
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            resume_at: Mutex::new(None),
        })
    }

    /// Wait out any active pause, then claim a concurrency slot.
    ///
    /// A slot granted while a pause is in effect (because the pause began while this caller
    /// was queued) is handed back and the wait starts over.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        loop {
            while let Some(resume_at) = self.pending_resume() {
                tokio::time::sleep_until(resume_at).await;
            }

            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .into_app_err("request throttler was closed")?;

            if self.pending_resume().is_none() {
                return Ok(permit);
            }
        }
    }

    /// Whether dispatch is currently halted.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pending_resume().is_some()
    }

    /// Halt dispatch for `duration` from now.
    ///
    /// Returns `false` without changing anything when an active pause already ends at
    /// about the same time or later.
    pub fn pause_for(&self, duration: Duration) -> bool {
        let new_resume_at = Instant::now() + duration;
        let mut guard = self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);

        if guard.is_some_and(|existing| existing > Instant::now() && existing + Self::MIN_PAUSE_EXTENSION >= new_resume_at) {
            return false;
        }

        *guard = Some(new_resume_at);
        true
    }

    fn pending_resume(&self) -> Option<Instant> {
        let mut guard = self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);
        match *guard {
            Some(at) if at > Instant::now() => Some(at),
            Some(_) => {
                *guard = None;
                None
            }
            None => None,
        }
    }
}
