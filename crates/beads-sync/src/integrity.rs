//! Integrity validation, run before every export and import (spec §4.3.1).

use std::path::Path;

use beads_core::jsonl;
use beads_storage::Storage;

use crate::repo_key::{metadata_key, EXPORT_HASHES, JSONL_CONTENT_HASH};
use crate::Result;

/// Outcome of comparing the on-disk journal against the last-recorded hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityState {
    /// The on-disk journal's hash matches the last-recorded hash.
    Consistent,
    /// The journal is missing, new, or was modified out-of-band; the next
    /// export must emit every issue and the next import must not
    /// short-circuit on stale per-issue hashes.
    NeedsFullExport,
}

/// Validates the journal against the store's recorded content hash.
///
/// See spec §4.3.1. Clears `jsonl_content_hash[:repo]` and
/// `export_hashes[:repo]` whenever the journal and store have diverged, so
/// a subsequent export is forced to re-emit everything rather than
/// perpetually warning about a mismatch it can never resolve incrementally.
pub fn validate_integrity(
    store: &dyn Storage,
    journal_path: &Path,
    repo: Option<&str>,
) -> Result<IntegrityState> {
    let hash_key = metadata_key(JSONL_CONTENT_HASH, repo);
    let recorded = store.get_metadata(&hash_key).ok();

    if !journal_path.exists() {
        if recorded.is_some() {
            clear_hashes(store, repo)?;
            return Ok(IntegrityState::NeedsFullExport);
        }
        return Ok(IntegrityState::NeedsFullExport);
    }

    let on_disk = jsonl::hash_file(journal_path)?;

    match recorded {
        Some(ref recorded_hash) if *recorded_hash == on_disk => Ok(IntegrityState::Consistent),
        _ => {
            clear_hashes(store, repo)?;
            Ok(IntegrityState::NeedsFullExport)
        }
    }
}

fn clear_hashes(store: &dyn Storage, repo: Option<&str>) -> Result<()> {
    let hash_key = metadata_key(JSONL_CONTENT_HASH, repo);
    let export_hashes_key = metadata_key(EXPORT_HASHES, repo);
    store.set_metadata(&hash_key, "")?;
    store.set_metadata(&export_hashes_key, "{}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_storage::SqliteStore;
    use tempfile::tempdir;

    #[test]
    fn missing_journal_and_no_recorded_hash_needs_full_export() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        let state = validate_integrity(&store, &path, None).unwrap();
        assert_eq!(state, IntegrityState::NeedsFullExport);
    }

    #[test]
    fn matching_hash_is_consistent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        let write = jsonl::write_jsonl_atomic(&path, &[]).unwrap();
        store.set_metadata(JSONL_CONTENT_HASH, &write.content_hash).unwrap();
        let state = validate_integrity(&store, &path, None).unwrap();
        assert_eq!(state, IntegrityState::Consistent);
    }

    #[test]
    fn mismatched_hash_clears_and_needs_full_export() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        jsonl::write_jsonl_atomic(&path, &[]).unwrap();
        store.set_metadata(JSONL_CONTENT_HASH, "stale-hash").unwrap();
        store.set_metadata(EXPORT_HASHES, "{\"bd-1\":\"abc\"}").unwrap();

        let state = validate_integrity(&store, &path, None).unwrap();
        assert_eq!(state, IntegrityState::NeedsFullExport);
        assert_eq!(store.get_metadata(JSONL_CONTENT_HASH).unwrap(), "");
        assert_eq!(store.get_metadata(EXPORT_HASHES).unwrap(), "{}");
    }
}
