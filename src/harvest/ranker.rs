use super::FetchResult;
use core::cmp::Ordering;

/// Highest metric first; equal metrics fall back to identifier order so the output is deterministic.
fn by_rank(a: &FetchResult, b: &FetchResult) -> Ordering {
    b.metric.cmp(&a.metric).then_with(|| a.identifier.cmp(&b.identifier))
}

/// Order results best-first and keep the leading `top_n` (all of them when `None`).
///
/// When only a small prefix is wanted, that prefix is selected first so that only it
/// needs sorting.
#[must_use]
pub fn rank(mut results: Vec<FetchResult>, top_n: Option<usize>) -> Vec<FetchResult> {
    let n = top_n.unwrap_or(results.len()).min(results.len());
    if n == 0 {
        return Vec::new();
    }

    if n < results.len() / 4 {
        let _ = results.select_nth_unstable_by(n - 1, by_rank);
        results.truncate(n);
    }

    results.sort_unstable_by(by_rank);
    results.truncate(n);
    results
}
