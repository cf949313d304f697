//! Advisory file locking for the beads daemon's single-writer arbitration.
//!
//! A workspace has at most one daemon process. Before binding the RPC socket
//! or opening the store for writing, the daemon takes an exclusive advisory
//! lock on a file inside `.beads/`. Any process that cannot acquire the lock
//! within the configured timeout treats the workspace as already owned.
//!
//! Built on `fs2`, which wraps `flock`/`LockFileEx` -- the same primitive the
//! daemon relies on for `BD_LOCK_TIMEOUT`-governed busy-wait behavior on the
//! SQLite connection itself.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

/// Errors that can occur while acquiring or holding a lock file.
#[derive(Debug, Error)]
pub enum LockError {
    /// The lock file could not be opened or created.
    #[error("failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The lock is held by another process and the timeout elapsed.
    #[error("timed out after {0:?} waiting for lock")]
    Timeout(Duration),

    /// The underlying OS lock call failed for a reason other than contention.
    #[error("lock operation failed: {0}")]
    Os(#[from] std::io::Error),
}

/// An exclusive advisory lock on a file, released on drop.
///
/// Holding one of these guarantees no other `FileLock::acquire` call on the
/// same path (from any process on the same host) will succeed until this
/// value is dropped.
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Try to acquire the lock once, without blocking.
    ///
    /// Returns `Ok(None)` if another process currently holds it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>, LockError> {
        let path = path.as_ref().to_path_buf();
        let file = open_lock_file(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if is_contention(&e) => Ok(None),
            Err(e) => Err(LockError::Os(e)),
        }
    }

    /// Acquire the lock, retrying with a short backoff until `timeout` elapses.
    ///
    /// A `timeout` of zero is treated as a single non-blocking attempt.
    pub fn acquire(path: impl AsRef<Path>, timeout: Duration) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        let file = open_lock_file(&path)?;

        if timeout.is_zero() {
            return match file.try_lock_exclusive() {
                Ok(()) => Ok(Self { file, path }),
                Err(e) if is_contention(&e) => Err(LockError::Timeout(timeout)),
                Err(e) => Err(LockError::Os(e)),
            };
        }

        let deadline = Instant::now() + timeout;
        let backoff = Duration::from_millis(25);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file, path }),
                Err(e) if is_contention(&e) => {
                    if Instant::now() >= deadline {
                        return Err(LockError::Timeout(timeout));
                    }
                    std::thread::sleep(backoff);
                }
                Err(e) => return Err(LockError::Os(e)),
            }
        }
    }

    /// Path of the lock file this handle holds.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> Result<File, LockError> {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| LockError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn is_contention(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::PermissionDenied
    ) || e.raw_os_error() == Some(11) // EAGAIN, returned by flock on contention on some platforms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bd.lock");

        let lock = FileLock::try_acquire(&path).unwrap();
        assert!(lock.is_some());
        drop(lock);

        let lock2 = FileLock::try_acquire(&path).unwrap();
        assert!(lock2.is_some());
    }

    #[test]
    fn try_acquire_none_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bd.lock");

        let _held = FileLock::try_acquire(&path).unwrap().unwrap();
        let second = FileLock::try_acquire(&path).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn acquire_times_out_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bd.lock");

        let _held = FileLock::try_acquire(&path).unwrap().unwrap();
        let result = FileLock::acquire(&path, Duration::from_millis(80));
        assert!(matches!(result, Err(LockError::Timeout(_))));
    }

    #[test]
    fn acquire_zero_timeout_is_single_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bd.lock");

        let _held = FileLock::try_acquire(&path).unwrap().unwrap();
        let result = FileLock::acquire(&path, Duration::ZERO);
        assert!(matches!(result, Err(LockError::Timeout(_))));
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("bd.lock");
        let lock = FileLock::try_acquire(&path).unwrap();
        assert!(lock.is_some());
        assert!(path.parent().unwrap().is_dir());
    }
}
