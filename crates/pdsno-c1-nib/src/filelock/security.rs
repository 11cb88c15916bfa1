//! Staleness and path-validation helpers for [`super::DatabaseLock`].

use std::path::Path;
use std::time::Duration;

/// How long to retry acquisition before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// A lock file older than this is assumed to be left behind by a process
/// that never got the chance to release it.
pub const MAX_LOCK_AGE: Duration = Duration::from_secs(86400);

/// Whether a process with the given PID is still running.
pub fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        Path::new(&format!("/proc/{}", pid)).exists()
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

/// Rejects a lock path that resolves outside `data_dir` (e.g. via a
/// symlink planted before the directory existed).
pub fn validate_lock_path(data_dir: &Path, lock_path: &Path) -> bool {
    lock_path
        .canonicalize()
        .ok()
        .and_then(|canonical| {
            data_dir
                .canonicalize()
                .ok()
                .map(|data_canonical| canonical.starts_with(&data_canonical))
        })
        .unwrap_or(false)
}
