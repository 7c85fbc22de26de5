//! File locking and atomic writes for the file storage adapter
//!
//! - Advisory exclusive lock (fs2/flock) on `<data-dir>/.lock` around every
//!   mutation, with a bounded wait
//! - Atomic write pattern (write temp + fsync + rename) so a reader never
//!   sees a half-written routine or history file

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Default lock timeout in milliseconds
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5000;

/// Pause between attempts while another process holds the lock
const RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Exclusive advisory lock, released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Wait up to `timeout_ms` for the lock, creating the lock file if needed.
    pub fn acquire(path: impl AsRef<Path>, timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if let Some(lock) = Self::try_acquire(path)? {
                return Ok(lock);
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    path = %path.display(),
                    timeout_ms,
                    "gave up waiting for data directory lock"
                );
                return Err(Error::LockFailed(path.to_path_buf()));
            }
            thread::sleep(RETRY_INTERVAL);
        }
    }

    /// Take the lock if it is free; `Ok(None)` while someone else holds it.
    pub fn try_acquire(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(FileLock {
                file,
                path: path.to_path_buf(),
            })),
            Err(err) if held_elsewhere(&err) => Ok(None),
            Err(err) => Err(Error::Io(err)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn held_elsewhere(err: &io::Error) -> bool {
    // Windows reports sharing/lock violations (32, 33) instead of WouldBlock
    err.kind() == io::ErrorKind::WouldBlock
        || (cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33)))
}

/// Replace `path` with `data` in one rename.
///
/// The temp file sits next to the target so the rename never crosses
/// filesystems. No locking here; the file backend holds a [`FileLock`].
pub fn write_atomic(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    let mut temp = File::create(&temp_path)?;
    temp.write_all(data)?;
    temp.sync_all()?;
    drop(temp);

    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_lock_acquire_release() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join(".lock");

        let lock = FileLock::acquire(&lock_path, 1000).unwrap();
        assert!(lock_path.exists());
        assert_eq!(lock.path(), lock_path.as_path());

        // Held: a second handle cannot take it
        let result = FileLock::try_acquire(&lock_path).unwrap();
        assert!(result.is_none());

        drop(lock);

        let lock2 = FileLock::try_acquire(&lock_path).unwrap();
        assert!(lock2.is_some());
    }

    #[test]
    fn test_acquire_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let lock_path = temp_dir.path().join(".lock");

        let _held = FileLock::acquire(&lock_path, 1000).unwrap();
        let err = FileLock::acquire(&lock_path, 50).unwrap_err();
        assert!(matches!(err, Error::LockFailed(_)));
    }

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("routines").join("r1.json");

        write_atomic(&file_path, b"{\"name\":\"first\"}").unwrap();
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "{\"name\":\"first\"}"
        );

        write_atomic(&file_path, b"{\"name\":\"second\"}").unwrap();
        assert_eq!(
            fs::read_to_string(&file_path).unwrap(),
            "{\"name\":\"second\"}"
        );

        // No temp files left behind
        let leftovers: Vec<_> = fs::read_dir(file_path.parent().unwrap())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }
}
