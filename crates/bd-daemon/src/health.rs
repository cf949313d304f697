//! Periodic health check (§4.5 "Health check" tick).
//!
//! Reads a reserved metadata key to detect external tampering that blew
//! away the store, runs the store's integrity pragma, and checks free disk
//! space and heap footprint against warning thresholds.

use std::path::Path;

use beads_storage::Storage;

/// Metadata key whose presence proves the store is the one this daemon
/// created (an external process replacing `beads.db` wholesale -- e.g. a
/// bad restore -- leaves this key missing even though the file exists).
pub const HEALTH_SENTINEL_KEY: &str = "daemon_health_sentinel";

/// Warn when free disk space in the workspace's filesystem drops below
/// this many bytes.
pub const DISK_SPACE_WARNING_BYTES: u64 = 100 * 1024 * 1024;

/// Warn when the daemon process's resident memory exceeds this many bytes.
pub const HEAP_WARNING_BYTES: u64 = 500 * 1024 * 1024;

/// Result of one health check pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    /// `HEALTH_SENTINEL_KEY` was missing, meaning the store was replaced
    /// out from under the daemon.
    pub sentinel_missing: bool,
    /// Problems reported by the store's integrity pragma (empty = clean).
    pub integrity_problems: Vec<String>,
    /// Free disk space, if determinable.
    pub free_disk_bytes: Option<u64>,
    pub low_disk_space: bool,
    /// Resident memory, if determinable (Linux only; `None` elsewhere).
    pub resident_memory_bytes: Option<u64>,
    pub high_memory_usage: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        !self.sentinel_missing && self.integrity_problems.is_empty() && !self.low_disk_space
    }
}

/// Ensures the health sentinel metadata key is present, writing it if this
/// is the first check after daemon start.
pub fn ensure_sentinel(store: &dyn Storage, value: &str) -> beads_storage::error::Result<()> {
    store.set_metadata(HEALTH_SENTINEL_KEY, value)
}

/// Runs one health check pass.
///
/// `workspace_dir` is used for the disk-space check (the filesystem
/// backing the workspace, not necessarily the process's CWD).
pub fn check(store: &dyn Storage, expected_sentinel: &str, workspace_dir: &Path) -> HealthReport {
    let sentinel_missing = match store.get_metadata(HEALTH_SENTINEL_KEY) {
        Ok(v) => v != expected_sentinel,
        Err(_) => true,
    };

    let integrity_problems = store
        .as_tombstone_capable()
        .and_then(|t| t.integrity_check().ok())
        .unwrap_or_default();

    let free_disk_bytes = fs2::available_space(workspace_dir).ok();
    let low_disk_space = free_disk_bytes.is_some_and(|b| b < DISK_SPACE_WARNING_BYTES);

    let resident_memory_bytes = resident_memory();
    let high_memory_usage = resident_memory_bytes.is_some_and(|b| b > HEAP_WARNING_BYTES);

    HealthReport {
        sentinel_missing,
        integrity_problems,
        free_disk_bytes,
        low_disk_space,
        resident_memory_bytes,
        high_memory_usage,
    }
}

/// Reads this process's resident set size from `/proc/self/statm` on
/// Linux. Returns `None` on other platforms or if the read fails -- there
/// is no cross-platform stdlib way to query RSS, and the workspace carries
/// no memory-profiling crate, so this check degrades gracefully rather
/// than pulling in a dependency solely for an advisory warning.
#[cfg(target_os = "linux")]
fn resident_memory() -> Option<u64> {
    let contents = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = contents.split_whitespace().nth(1)?.parse().ok()?;
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return None;
    }
    Some(pages * page_size as u64)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_storage::SqliteStore;
    use tempfile::tempdir;

    #[test]
    fn missing_sentinel_is_unhealthy() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let report = check(&store, "daemon-123", dir.path());
        assert!(report.sentinel_missing);
        assert!(!report.is_healthy());
    }

    #[test]
    fn matching_sentinel_with_clean_store_is_healthy() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        ensure_sentinel(&store, "daemon-123").unwrap();
        let report = check(&store, "daemon-123", dir.path());
        assert!(!report.sentinel_missing);
        assert!(report.integrity_problems.is_empty());
    }
}
