use super::request_tracker::{RequestTracker, TrackedTopic};
use super::transport::Transport;
use super::{CacheStore, FetchResult, Fetcher, RepoId};
use crate::Result;
use futures_util::future::try_join_all;

const LOG_TARGET: &str = " harvester";

/// Runs the [`Fetcher`] over a whole set of identifiers.
///
/// All fetches are started together and the fetcher's throttler keeps the number of
/// requests in flight bounded. The first fatal error ends the harvest: every other
/// fetch is dropped (cancelling its request or backoff sleep) and the results gathered
/// so far are discarded. Responses already written to the cache stay there.
#[derive(Debug)]
pub struct Harvester<T, C> {
    fetcher: Fetcher<T, C>,
}

impl<T: Transport, C: CacheStore> Harvester<T, C> {
    #[must_use]
    pub const fn new(fetcher: Fetcher<T, C>) -> Self {
        Self { fetcher }
    }

    #[must_use]
    pub const fn fetcher(&self) -> &Fetcher<T, C> {
        &self.fetcher
    }

    /// Fetch every identifier in `ids`, which must not contain duplicates.
    ///
    /// Results come back in no particular order.
    pub async fn harvest(&self, ids: impl IntoIterator<Item = RepoId>, tracker: &RequestTracker) -> Result<Vec<FetchResult>> {
        let ids: Vec<RepoId> = ids.into_iter().collect();
        debug_assert!(
            ids.len() == super::dedup::unique(ids.iter().cloned()).len(),
            "identifiers passed to harvest must be unique"
        );

        log::info!(target: LOG_TARGET, "Harvesting star counts for {} repositories", ids.len());
        tracker.progress().set_phase("Fetching");
        tracker.add_requests(TrackedTopic::Repos, ids.len() as u64);

        let fetches = ids.iter().map(|id| async move {
            let result = self.fetcher.fetch(id, tracker).await;
            tracker.complete_request(TrackedTopic::Repos);
            result
        });

        match try_join_all(fetches).await {
            Ok(results) => {
                let absent = results.iter().filter(|r| !r.present).count();
                log::info!(target: LOG_TARGET, "Harvested {} repositories ({absent} absent)", results.len());
                Ok(results)
            }
            Err(e) => {
                log::error!(target: LOG_TARGET, "Harvest aborted: {e:#}");
                Err(e)
            }
        }
    }
}
