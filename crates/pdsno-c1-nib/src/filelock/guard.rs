//! Exclusive flock over a data directory, acquired once at startup and
//! released on drop (RAII), so two processes can never open the same
//! `RocksNib` directory at once.

use std::fs::{File, OpenOptions};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use super::security::{is_process_running, validate_lock_path, DEFAULT_LOCK_TIMEOUT, MAX_LOCK_AGE};

#[derive(Debug)]
pub enum LockError {
    CreateFailed(io::Error),
    AlreadyLocked { pid: Option<u32>, path: PathBuf },
    WriteFailed(io::Error),
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::CreateFailed(e) => write!(f, "failed to create lock file: {e}"),
            LockError::AlreadyLocked { pid: Some(pid), path } => {
                write!(f, "nib data directory already in use by process {pid} ({})", path.display())
            }
            LockError::AlreadyLocked { pid: None, path } => {
                write!(f, "nib data directory already in use ({})", path.display())
            }
            LockError::WriteFailed(e) => write!(f, "failed to write pid to lock file: {e}"),
        }
    }
}

impl std::error::Error for LockError {}

/// Exclusive lock on a `RocksNib` data directory.
pub struct DatabaseLock {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl DatabaseLock {
    const LOCK_FILE: &'static str = "LOCK";

    /// Acquire an exclusive lock on `data_dir`, retrying with exponential
    /// backoff (50ms up to 500ms) until [`DEFAULT_LOCK_TIMEOUT`] elapses.
    /// A lock file held by a dead PID, or older than [`MAX_LOCK_AGE`], is
    /// treated as abandoned and cleared before the next attempt.
    pub fn acquire(data_dir: &Path) -> Result<Self, LockError> {
        std::fs::create_dir_all(data_dir).map_err(LockError::CreateFailed)?;

        let deadline = Instant::now() + DEFAULT_LOCK_TIMEOUT;
        let lock_path = data_dir.join(Self::LOCK_FILE);
        let mut retry_delay = Duration::from_millis(50);

        loop {
            if lock_path.exists() && !validate_lock_path(data_dir, &lock_path) {
                return Err(LockError::CreateFailed(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "lock path escapes data directory",
                )));
            }

            if Self::is_lock_stale(&lock_path, MAX_LOCK_AGE) {
                let _ = std::fs::remove_file(&lock_path);
            }

            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path)
                .map_err(LockError::CreateFailed)?;

            match file.try_lock_exclusive() {
                Ok(()) => {
                    let pid = std::process::id();
                    let mut locked_file = file;
                    writeln!(locked_file, "{pid}").map_err(LockError::WriteFailed)?;
                    locked_file.sync_all().map_err(LockError::WriteFailed)?;
                    return Ok(Self { file: locked_file, path: lock_path, pid });
                }
                Err(_) => {
                    let existing_pid = Self::read_existing_pid(&lock_path);

                    if let Some(pid) = existing_pid {
                        if !is_process_running(pid) {
                            drop(file);
                            let _ = std::fs::remove_file(&lock_path);
                            continue;
                        }
                    }

                    if Instant::now() >= deadline {
                        return Err(LockError::AlreadyLocked { pid: existing_pid, path: lock_path });
                    }

                    drop(file);
                    std::thread::sleep(retry_delay);
                    retry_delay = (retry_delay * 2).min(Duration::from_millis(500));
                }
            }
        }
    }

    fn is_lock_stale(lock_path: &Path, max_age: Duration) -> bool {
        lock_path
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.elapsed().ok())
            .map(|age| age > max_age)
            .unwrap_or(false)
    }

    fn read_existing_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path).ok().and_then(|s| s.trim().parse().ok())
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DatabaseLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn acquire_then_drop_releases_the_lock_for_the_next_caller() {
        let dir = TempDir::new().unwrap();
        {
            let lock = DatabaseLock::acquire(dir.path()).unwrap();
            assert_eq!(lock.pid(), std::process::id());
        }
        let second = DatabaseLock::acquire(dir.path());
        assert!(second.is_ok());
    }

    #[test]
    fn a_stale_lock_from_a_dead_pid_is_reclaimed_immediately() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join(DatabaseLock::LOCK_FILE);
        std::fs::write(&lock_path, "999999999\n").unwrap();

        let lock = DatabaseLock::acquire(dir.path()).unwrap();
        assert_eq!(lock.pid(), std::process::id());
    }
}
