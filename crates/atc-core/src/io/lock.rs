//! Team-scoped exclusive file locking with bounded backoff

use crate::io::error::StoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default bounded wait for acquiring a team lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Exclusive lock guard; the lock is released when dropped
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to release lock on {}: {e}", self.path.display());
        }
    }
}

/// Acquire an exclusive advisory lock on `path`, waiting at most `timeout`.
///
/// The lock file is created if missing. Between attempts the wait doubles
/// from 50ms up to 500ms. Contention past the deadline is reported as
/// `StoreError::LockTimeout`; the caller decides whether to retry.
pub fn acquire_lock(path: &Path, timeout: Duration) -> Result<FileLock, StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;

    let start = Instant::now();
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match file.try_lock_exclusive() {
            Ok(()) => {
                return Ok(FileLock {
                    file,
                    path: path.to_path_buf(),
                });
            }
            Err(e) if is_contended(&e) => {
                let waited = start.elapsed();
                if waited >= timeout {
                    return Err(StoreError::LockTimeout {
                        path: path.to_path_buf(),
                        waited,
                    });
                }
                let remaining = timeout - waited;
                std::thread::sleep(backoff.min(remaining));
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(e) => return Err(StoreError::io(path, e)),
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
