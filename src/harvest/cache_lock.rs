use crate::Result;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{File, OpenOptions};
use std::path::Path;

const LOG_TARGET: &str = "     cache";

/// Name of the advisory lock file kept inside the cache directory.
pub const LOCK_FILE_NAME: &str = "awesome-rank.lock";

/// Holds an exclusive advisory lock on a cache directory; released when dropped.
#[derive(Debug)]
pub struct CacheDirLock(File);

impl Drop for CacheDirLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.0) {
            log::warn!(target: LOG_TARGET, "Could not release cache directory lock: {e:#}");
        }
    }
}

/// Wait until no other process is using the cache directory, then claim it.
pub async fn lock_cache_dir(dir: &Path) -> Result<CacheDirLock> {
    let lock_path = dir.join(LOCK_FILE_NAME);

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .into_app_err_with(|| format!("opening cache lock file '{}'", lock_path.display()))?;

    // blocking wait, kept off the async worker threads
    let file = tokio::task::spawn_blocking(move || {
        FileExt::lock_exclusive(&file).into_app_err_with(|| format!("locking cache directory via '{}'", lock_path.display()))?;
        Ok::<_, ohno::AppError>(file)
    })
    .await
    .into_app_err("cache lock task panicked")??;

    log::debug!(target: LOG_TARGET, "Locked cache directory '{}'", dir.display());
    Ok(CacheDirLock(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicBool, Ordering};
    use core::time::Duration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lock_creates_lock_file() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = lock_cache_dir(tmp.path()).await.unwrap();
        assert!(tmp.path().join(LOCK_FILE_NAME).exists());
        drop(lock);
    }

    #[tokio::test]
    async fn test_lock_can_be_reacquired_after_drop() {
        let tmp = tempfile::tempdir().unwrap();
        drop(lock_cache_dir(tmp.path()).await.unwrap());
        let _again = lock_cache_dir(tmp.path()).await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_in_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let _ = lock_cache_dir(&tmp.path().join("missing")).await.unwrap_err();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_second_holder_waits_for_first() {
        let tmp = tempfile::tempdir().unwrap();
        let first = lock_cache_dir(tmp.path()).await.unwrap();
        let released = Arc::new(AtomicBool::new(false));

        let dir = tmp.path().to_path_buf();
        let released_clone = Arc::clone(&released);
        let waiter = tokio::spawn(async move {
            let _second = lock_cache_dir(&dir).await.unwrap();
            assert!(released_clone.load(Ordering::SeqCst));
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        released.store(true, Ordering::SeqCst);
        drop(first);

        waiter.await.unwrap();
    }
}
