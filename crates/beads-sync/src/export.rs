//! Export: store -> journal (spec §4.3.2).

use std::collections::HashMap;
use std::path::Path;

use beads_core::content_hash::compute_content_hash;
use beads_core::issue::Issue;
use beads_storage::Storage;
use chrono::Utc;

use crate::integrity::{validate_integrity, IntegrityState};
use crate::repo_key::{metadata_key, EXPORT_HASHES, JSONL_CONTENT_HASH, LAST_IMPORT_TIME};
use crate::{Result, SyncError};

/// What an [`export`] call produced.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    /// IDs written to the journal.
    pub ids: Vec<String>,
    /// SHA-256 of the journal as written.
    pub content_hash: String,
    /// Whether every issue was re-emitted (vs. only the dirty set).
    pub full_export: bool,
}

/// Exports the store's issues to the journal at `journal_path`.
///
/// Runs integrity validation first; on [`IntegrityState::NeedsFullExport`]
/// every non-ephemeral issue is emitted, otherwise only the dirty set
/// (tracked via [`Storage::list_dirty`]) is considered for re-export,
/// though the write itself always covers the full resulting set of
/// still-live issues (the codec's ordering guarantee depends on writing
/// the complete set each time; only the *decision to export at all* is
/// short-circuited by dirtiness).
pub fn export(store: &dyn Storage, journal_path: &Path, repo: Option<&str>) -> Result<ExportOutcome> {
    let state = validate_integrity(store, journal_path, repo)?;
    let full_export = matches!(state, IntegrityState::NeedsFullExport);

    if !full_export {
        let dirty = store.list_dirty()?;
        if dirty.is_empty() {
            let hash_key = metadata_key(JSONL_CONTENT_HASH, repo);
            let existing_hash = store.get_metadata(&hash_key).unwrap_or_default();
            return Ok(ExportOutcome {
                ids: Vec::new(),
                content_hash: existing_hash,
                full_export: false,
            });
        }
    }

    let all_issues = store.list_all_issues()?;
    let exportable: Vec<Issue> = all_issues.into_iter().filter(|i| !i.ephemeral).collect();

    if exportable.is_empty() && journal_path.exists() {
        let existing = std::fs::read_to_string(journal_path).unwrap_or_default();
        if !existing.trim().is_empty() {
            return Err(SyncError::Conflict(
                "refusing to export: store is empty but journal is not".into(),
            ));
        }
    }

    let write = beads_core::jsonl::write_jsonl_atomic(journal_path, &exportable)?;

    let hash_key = metadata_key(JSONL_CONTENT_HASH, repo);
    let last_import_key = metadata_key(LAST_IMPORT_TIME, repo);
    let export_hashes_key = metadata_key(EXPORT_HASHES, repo);

    store.set_metadata(&hash_key, &write.content_hash)?;
    store.set_metadata(&last_import_key, &Utc::now().to_rfc3339())?;

    let hashes: HashMap<&str, String> = exportable
        .iter()
        .map(|i| (i.id.as_str(), compute_content_hash(i)))
        .collect();
    store.set_metadata(&export_hashes_key, &serde_json::to_string(&hashes)?)?;

    store.clear_dirty(&write.ids)?;

    Ok(ExportOutcome {
        ids: write.ids,
        content_hash: write.content_hash,
        full_export,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_core::issue::IssueBuilder;
    use beads_storage::SqliteStore;
    use tempfile::tempdir;

    #[test]
    fn full_export_writes_all_non_ephemeral_issues() {
        let store = SqliteStore::open_in_memory().unwrap();
        let live = IssueBuilder::new("Live").id("bd-1").build();
        let ephemeral = IssueBuilder::new("Ephemeral")
            .id("bd-2")
            .ephemeral(true)
            .build();
        store.create_issue(&live, "alice").unwrap();
        store.create_issue(&ephemeral, "alice").unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        let outcome = export(&store, &path, None).unwrap();

        assert!(outcome.full_export);
        assert_eq!(outcome.ids, vec!["bd-1".to_string()]);
        assert_eq!(
            store.get_metadata(JSONL_CONTENT_HASH).unwrap(),
            outcome.content_hash
        );
    }

    #[test]
    fn refuses_to_export_empty_store_over_nonempty_journal() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        let seed = IssueBuilder::new("Seed").id("bd-1").build();
        beads_core::jsonl::write_jsonl_atomic(&path, &[seed]).unwrap();

        let err = export(&store, &path, None).unwrap_err();
        assert!(matches!(err, SyncError::Conflict(_)));
    }

    #[test]
    fn incremental_export_skips_when_nothing_dirty() {
        let store = SqliteStore::open_in_memory().unwrap();
        let issue = IssueBuilder::new("One").id("bd-1").build();
        store.create_issue(&issue, "alice").unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        export(&store, &path, None).unwrap();
        store.clear_dirty(&["bd-1".to_string()]).unwrap();

        let outcome = export(&store, &path, None).unwrap();
        assert!(!outcome.full_export);
        assert!(outcome.ids.is_empty());
    }
}
