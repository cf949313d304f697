//! Staleness detection (spec §4.3.4): is the store fresher than the journal?

use std::path::Path;

use beads_storage::Storage;
use chrono::{DateTime, Utc};

use crate::repo_key::{metadata_key, LAST_IMPORT_TIME};
use crate::Result;

/// Whether the store's view of the journal is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// The journal's last-modified time is at or before the store's
    /// recorded last import time.
    Fresh,
    /// The journal was modified after the store last imported it.
    Stale,
}

/// Compares the journal's mtime against the store's `last_import_time`.
///
/// If the store has never imported (no recorded timestamp), the journal is
/// considered stale whenever it exists, so the first caller always imports.
pub fn check_staleness(store: &dyn Storage, journal_path: &Path, repo: Option<&str>) -> Result<Staleness> {
    if !journal_path.exists() {
        return Ok(Staleness::Fresh);
    }

    let mtime: DateTime<Utc> = journal_path.metadata()?.modified()?.into();

    let last_import_key = metadata_key(LAST_IMPORT_TIME, repo);
    let last_import = match store.get_metadata(&last_import_key) {
        Ok(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Err(_) => None,
    };

    match last_import {
        Some(ts) if mtime <= ts => Ok(Staleness::Fresh),
        _ => Ok(Staleness::Stale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_storage::SqliteStore;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_journal_is_fresh() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        assert_eq!(check_staleness(&store, &path, None).unwrap(), Staleness::Fresh);
    }

    #[test]
    fn no_recorded_import_is_stale_when_journal_exists() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        fs::write(&path, "").unwrap();
        assert_eq!(check_staleness(&store, &path, None).unwrap(), Staleness::Stale);
    }

    #[test]
    fn import_after_modification_is_fresh() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        fs::write(&path, "").unwrap();
        store
            .set_metadata(LAST_IMPORT_TIME, &(Utc::now() + chrono::Duration::seconds(5)).to_rfc3339())
            .unwrap();
        assert_eq!(check_staleness(&store, &path, None).unwrap(), Staleness::Fresh);
    }
}
