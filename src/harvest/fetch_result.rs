use super::RepoId;
use serde::Serialize;

/// The harvested metric for one repository.
///
/// Repositories confirmed missing, or whose request timed out, are kept with
/// `present == false` and a zero metric so that they still show up in the ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchResult {
    pub identifier: RepoId,
    pub metric: u64,
    pub present: bool,
}

impl FetchResult {
    #[must_use]
    pub fn found(identifier: RepoId, metric: u64) -> Self {
        Self {
            identifier,
            metric,
            present: true,
        }
    }

    #[must_use]
    pub fn absent(identifier: RepoId) -> Self {
        Self {
            identifier,
            metric: 0,
            present: false,
        }
    }
}
