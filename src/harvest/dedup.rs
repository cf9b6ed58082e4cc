use super::RepoId;
use std::collections::HashSet;

/// Reduce a sequence of identifiers to its distinct members.
#[must_use]
pub fn unique(ids: impl IntoIterator<Item = RepoId>) -> HashSet<RepoId> {
    ids.into_iter().collect()
}

/// Like [`unique`], but keeps the position of each identifier's first appearance.
///
/// Used when the identifier set is capped, so that the same prefix of a document
/// is processed on every run.
#[must_use]
pub fn unique_in_order(ids: impl IntoIterator<Item = RepoId>) -> Vec<RepoId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
