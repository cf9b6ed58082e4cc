//! Persistent storage of raw API responses, keyed by request URL.
//!
//! [`DiskCache`] keeps one JSON envelope per key inside a cache directory so that
//! repeated runs over the same awesome list avoid re-issuing identical requests.
//! Entries never expire; a stale star count is an accepted tradeoff for a batch tool.

use super::cache_lock::{CacheDirLock, lock_cache_dir};
use crate::Result;
use chrono::{DateTime, Utc};
use core::sync::atomic::{AtomicU64, Ordering};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

const LOG_TARGET: &str = "     cache";

/// A cached response together with the key it was stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: String,
    pub fetched_at: DateTime<Utc>,
}

/// Key/value persistence used by the fetcher.
///
/// Implementations must tolerate concurrent callers. Two writers racing on the same
/// key resolve as last-write-wins.
pub trait CacheStore: Send + Sync {
    /// Look up an entry, returning `None` when the key is absent or unreadable.
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store `payload` under `key`, replacing any previous entry.
    fn put(&self, key: &str, payload: &str) -> Result<()>;
}

impl<C: CacheStore + ?Sized> CacheStore for Arc<C> {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        (**self).get(key)
    }

    fn put(&self, key: &str, payload: &str) -> Result<()> {
        (**self).put(key, payload)
    }
}

/// A directory-backed cache holding one JSON file per key.
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    ignore_cached: bool,
    _lock: CacheDirLock,
}

/// Disambiguates temporary files written concurrently by this process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl DiskCache {
    /// Open (creating if needed) the cache rooted at `dir`.
    ///
    /// The directory stays locked against other processes until the cache is dropped.
    /// With `ignore_cached`, lookups always miss but fresh responses are still written,
    /// which refreshes the cache.
    pub async fn open(dir: impl Into<PathBuf>, ignore_cached: bool) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).into_app_err_with(|| format!("creating cache directory '{}'", dir.display()))?;
        let lock = lock_cache_dir(&dir).await?;

        Ok(Self {
            dir,
            ignore_cached,
            _lock: lock,
        })
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name_for_key(key))
    }

    fn read_entry(path: &Path) -> Result<CacheEntry> {
        let file = File::open(path).into_app_err_with(|| format!("opening cache file '{}'", path.display()))?;
        serde_json::from_reader(BufReader::new(file)).into_app_err_with(|| format!("parsing cache file '{}'", path.display()))
    }

    fn write_entry(&self, path: &Path, entry: &CacheEntry) -> Result<()> {
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let temp_path = self.dir.join(format!(
            ".{file_name}.{}-{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let result = Self::write_file(&temp_path, entry)
            .and_then(|()| fs::rename(&temp_path, path).into_app_err_with(|| format!("replacing cache file '{}'", path.display())));

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }

        result
    }

    fn write_file(path: &Path, entry: &CacheEntry) -> Result<()> {
        let file = File::create(path).into_app_err_with(|| format!("creating cache file '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);

        #[cfg(debug_assertions)]
        let result = serde_json::to_writer_pretty(&mut writer, entry);
        #[cfg(not(debug_assertions))]
        let result = serde_json::to_writer(&mut writer, entry);

        result.into_app_err_with(|| format!("writing cache file '{}'", path.display()))?;
        writer
            .flush()
            .into_app_err_with(|| format!("flushing cache file '{}'", path.display()))
    }
}

impl CacheStore for DiskCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        if self.ignore_cached {
            log::debug!(target: LOG_TARGET, "Ignoring cached data for {key}");
            return None;
        }

        let entry = match Self::read_entry(&self.path_for(key)) {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Cache miss for {key}: {e:#}");
                return None;
            }
        };

        // distinct keys can sanitize to the same file name
        if entry.key != key {
            log::debug!(target: LOG_TARGET, "Cache miss for {key}: file holds '{}'", entry.key);
            return None;
        }

        log::debug!(target: LOG_TARGET, "Cache hit for {key} (fetched {})", entry.fetched_at.format("%F %T"));
        Some(entry)
    }

    fn put(&self, key: &str, payload: &str) -> Result<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            payload: payload.to_string(),
            fetched_at: Utc::now(),
        };

        self.write_entry(&self.path_for(key), &entry)?;
        log::debug!(target: LOG_TARGET, "Cached response for {key}");
        Ok(())
    }
}

/// A process-local cache, used when persistence is turned off and in tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn put(&self, key: &str, payload: &str) -> Result<()> {
        let entry = CacheEntry {
            key: key.to_string(),
            payload: payload.to_string(),
            fetched_at: Utc::now(),
        };

        let _ = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry);
        Ok(())
    }
}

/// Map a cache key onto a single, portable file name.
///
/// Characters outside `[A-Za-z0-9._-]` become `_` and `..` sequences are broken up,
/// so a key can never escape the cache directory.
fn file_name_for_key(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '.') { c } else { '_' })
        .collect();

    while name.contains("..") {
        name = name.replace("..", "._");
    }

    name.push_str(".json");
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_for_key() {
        assert_eq!(
            file_name_for_key("https://api.github.com/repos/tokio-rs/tokio"),
            "https___api.github.com_repos_tokio-rs_tokio.json"
        );
        assert_eq!(file_name_for_key("../../etc/passwd"), ".__.__etc_passwd.json");
        assert!(!file_name_for_key("a/..../b").contains(".."));
    }

    #[test]
    fn test_file_name_is_stable() {
        let key = "https://api.github.com/repos/a/b";
        assert_eq!(file_name_for_key(key), file_name_for_key(key));
    }

    #[tokio::test]
    async fn test_put_then_get_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path(), false).await.unwrap();

        let payload = "{\"stargazers_count\": 42, \"note\": \"ünïcödé\"}";
        cache.put("https://api.github.com/repos/a/b", payload).unwrap();

        let entry = cache.get("https://api.github.com/repos/a/b").unwrap();
        assert_eq!(entry.payload, payload);
        assert_eq!(entry.key, "https://api.github.com/repos/a/b");
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path(), false).await.unwrap();
        assert!(cache.get("https://api.github.com/repos/nobody/nothing").is_none());
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let cache = DiskCache::open(tmp.path(), false).await.unwrap();
            cache.put("k", "v1").unwrap();
        }

        let cache = DiskCache::open(tmp.path(), false).await.unwrap();
        assert_eq!(cache.get("k").unwrap().payload, "v1");
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path(), false).await.unwrap();
        cache.put("k", "first").unwrap();
        cache.put("k", "second").unwrap();
        assert_eq!(cache.get("k").unwrap().payload, "second");
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path(), false).await.unwrap();
        fs::write(tmp.path().join(file_name_for_key("k")), "not json").unwrap();
        assert!(cache.get("k").is_none());
    }

    #[tokio::test]
    async fn test_colliding_file_name_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path(), false).await.unwrap();
        cache.put("a/b_c", "payload").unwrap();
        assert_eq!(file_name_for_key("a/b_c"), file_name_for_key("a_b/c"));
        assert!(cache.get("a_b/c").is_none());
        assert!(cache.get("a/b_c").is_some());
    }

    #[tokio::test]
    async fn test_ignore_cached_misses_but_still_writes() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let cache = DiskCache::open(tmp.path(), true).await.unwrap();
            cache.put("k", "fresh").unwrap();
            assert!(cache.get("k").is_none());
        }

        let cache = DiskCache::open(tmp.path(), false).await.unwrap();
        assert_eq!(cache.get("k").unwrap().payload, "fresh");
    }

    #[tokio::test]
    async fn test_no_temporary_files_left_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = DiskCache::open(tmp.path(), false).await.unwrap();
        cache.put("k", "v").unwrap();

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_corrupt() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Arc::new(DiskCache::open(tmp.path(), false).await.unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        cache.put("shared", &format!("payload-{i}")).unwrap();
                        cache.put(&format!("own-{i}"), &format!("payload-{i}")).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let shared = cache.get("shared").unwrap();
        assert!(shared.payload.starts_with("payload-"));
        for i in 0..16 {
            assert_eq!(cache.get(&format!("own-{i}")).unwrap().payload, format!("payload-{i}"));
        }
    }

    #[test]
    fn test_memory_cache_round_trips() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());
        cache.put("k", "v").unwrap();
        assert_eq!(cache.get("k").unwrap().payload, "v");
        assert_eq!(cache.len(), 1);
        assert!(cache.get("other").is_none());
    }

    #[test]
    fn test_arc_delegates() {
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        cache.put("k", "v").unwrap();
        assert_eq!(cache.get("k").unwrap().payload, "v");
    }
}
