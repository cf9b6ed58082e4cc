//! Obtaining the text of the awesome list to harvest.

use super::request_tracker::{RequestTracker, TrackedTopic};
use super::transport::Transport;
use super::{CacheStore, Fetcher, RepoId};
use crate::Result;
use camino::Utf8PathBuf;
use core::fmt::{Display, Formatter};
use ohno::{IntoAppError, bail};
use std::fs;

const LOG_TARGET: &str = "    source";

/// Branch used when the repository metadata doesn't name a default branch.
const FALLBACK_BRANCH: &str = "HEAD";

/// Where the awesome list comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The `README.md` on the default branch of a hosted repository.
    Repository(RepoId),

    /// A local Markdown file.
    File(Utf8PathBuf),
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Repository(id) => write!(f, "{id}"),
            Self::File(path) => write!(f, "{path}"),
        }
    }
}

impl Source {
    /// Read the document.
    ///
    /// For a repository this takes two requests: one for the metadata to learn the default
    /// branch, one for the raw README under `raw_base_url`. A missing repository or README
    /// is an error, and so is a timeout on either request.
    pub async fn load<T: Transport, C: CacheStore>(
        &self,
        fetcher: &Fetcher<T, C>,
        raw_base_url: &str,
        tracker: &RequestTracker,
    ) -> Result<String> {
        match self {
            Self::File(path) => {
                log::info!(target: LOG_TARGET, "Reading awesome list from '{path}'");
                fs::read_to_string(path).into_app_err_with(|| format!("reading awesome list file '{path}'"))
            }
            Self::Repository(id) => {
                tracker.progress().set_phase("Resolving");
                tracker.add_requests(TrackedTopic::Source, 2);

                let Some(repo) = fetcher.repository(id, tracker).await? else {
                    bail!("repository '{id}' was not found");
                };
                tracker.complete_request(TrackedTopic::Source);

                let branch = repo.default_branch.as_deref().unwrap_or(FALLBACK_BRANCH);
                let url = format!("{}/{id}/{branch}/README.md", raw_base_url.trim_end_matches('/'));
                log::info!(target: LOG_TARGET, "Downloading awesome list from '{url}'");

                let Some(text) = fetcher.text(&url, tracker).await? else {
                    bail!("README.md was not found for awesome list repository '{id}'");
                };
                tracker.complete_request(TrackedTopic::Source);

                Ok(text)
            }
        }
    }
}
