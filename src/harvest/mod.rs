//! Harvesting star counts for the repositories an awesome list links to.
//!
//! # Implementation Model
//!
//! The pipeline runs leaves first:
//!
//! - [`Source`] produces the document text, either from a local file or from the
//!   `README.md` of a hosted repository.
//! - [`Extractor`] scans the text for parenthesized repository links and yields a
//!   [`RepoId`] per link, repeats included; [`unique`] collapses the repeats.
//! - [`Harvester`] drives a [`Fetcher`] over the unique identifiers concurrently. Each
//!   fetch consults the [`CacheStore`] first, then goes to the network through the
//!   injected [`Transport`], holding a [`Throttler`] permit for the duration of the
//!   request. Rate-limit replies pause every worker and are retried after a backoff.
//! - [`rank`] orders the [`FetchResult`]s by star count.
//!
//! The only state shared between concurrent fetches is the cache, the throttler's
//! dispatch gate, and the progress counters.

mod cache;
mod cache_lock;
mod dedup;
mod extractor;
mod fetch_result;
mod fetcher;
mod harvester;
mod outcome;
mod progress;
mod ranker;
mod repo_id;
mod repository;
mod request_tracker;
#[cfg(test)]
mod scripted_transport;
mod source;
mod throttler;
mod transport;

pub use cache::{CacheEntry, CacheStore, DiskCache, MemoryCache};
pub use cache_lock::LOCK_FILE_NAME;
pub use dedup::{unique, unique_in_order};
pub use extractor::{DEFAULT_LINK_HOST, Extractor};
pub use fetch_result::FetchResult;
pub use fetcher::{FetchSettings, Fetcher};
pub use harvester::Harvester;
pub use outcome::Outcome;
pub use progress::{Progress, SilentProgress};
pub use ranker::rank;
pub use repo_id::RepoId;
pub use repository::Repository;
pub use request_tracker::{RequestTracker, TopicStatus, TrackedTopic};
pub use source::Source;
pub use throttler::Throttler;
pub use transport::{HttpTransport, Response, Transport, TransportError};
