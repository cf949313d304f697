//! Import: journal -> store (spec §4.3.3).

use std::path::Path;

use beads_core::enums::Status;
use beads_core::jsonl;
use beads_storage::{IssueUpdates, Storage};
use chrono::Utc;

use crate::repo_key::{metadata_key, EXPORT_HASHES, JSONL_CONTENT_HASH, LAST_IMPORT_TIME};
use crate::Result;

/// Counts produced by an [`import`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Number of issues created.
    pub created: usize,
    /// Number of issues updated.
    pub updated: usize,
    /// Number of issues left untouched (stale parsed version, or already
    /// mirrored content hash).
    pub skipped: usize,
}

/// Imports `journal_path` into `store`.
///
/// Resurrection safety (spec §4.4.4): a parsed issue never downgrades a
/// stored tombstone back to a live status. Last-writer-wins is applied on
/// `updated_at`: if the store's copy is strictly newer, the parsed copy is
/// discarded.
pub fn import(
    store: &dyn Storage,
    journal_path: &Path,
    repo: Option<&str>,
    force: bool,
) -> Result<ImportOutcome> {
    let content = std::fs::read_to_string(journal_path)?;
    let content_hash = beads_core::jsonl::hash_file(journal_path)?;

    let hash_key = metadata_key(JSONL_CONTENT_HASH, repo);
    if !force {
        if let Ok(recorded) = store.get_metadata(&hash_key) {
            if recorded == content_hash {
                return Ok(ImportOutcome::default());
            }
        }
    }

    let parsed = jsonl::parse_jsonl(&content);
    let mut outcome = ImportOutcome::default();

    for mut parsed_issue in parsed {
        match store.get_issue(&parsed_issue.id) {
            Ok(stored) => {
                // A parsed tombstone always propagates (spec §4.3.3 step 4):
                // this is how a remote delete reaches us, and it is not
                // subordinate to the last-writer-wins timestamp rule in
                // step 3 -- a local edit to the live issue that happens to
                // carry a newer `updated_at` must not block the delete.
                let incoming_tombstone =
                    parsed_issue.status == Status::Tombstone && stored.status != Status::Tombstone;

                if !incoming_tombstone && stored.updated_at > parsed_issue.updated_at {
                    outcome.skipped += 1;
                    continue;
                }

                if stored.status == Status::Tombstone && parsed_issue.status != Status::Tombstone {
                    parsed_issue.status = Status::Tombstone;
                    parsed_issue.original_type = stored.original_type.clone();
                    parsed_issue.deleted_at = stored.deleted_at;
                    parsed_issue.deleted_by = stored.deleted_by.clone();
                    parsed_issue.delete_reason = stored.delete_reason.clone();
                }

                let updates = IssueUpdates {
                    title: Some(parsed_issue.title.clone()),
                    description: Some(parsed_issue.description.clone()),
                    design: Some(parsed_issue.design.clone()),
                    acceptance_criteria: Some(parsed_issue.acceptance_criteria.clone()),
                    notes: Some(parsed_issue.notes.clone()),
                    status: Some(parsed_issue.status.clone()),
                    issue_type: Some(parsed_issue.issue_type.clone()),
                    original_type: parsed_issue.original_type.clone(),
                    priority: Some(parsed_issue.priority),
                    assignee: Some(parsed_issue.assignee.clone()),
                    deleted_at: Some(parsed_issue.deleted_at),
                    deleted_by: Some(parsed_issue.deleted_by.clone()),
                    delete_reason: Some(parsed_issue.delete_reason.clone()),
                    ..Default::default()
                };
                store.update_issue(&parsed_issue.id, &updates, "import")?;
                outcome.updated += 1;
            }
            Err(e) if e.is_not_found() => {
                store.create_issue(&parsed_issue, "import")?;
                outcome.created += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    // A subsequent export must not short-circuit on per-issue hashes that
    // no longer reflect what was just imported.
    let export_hashes_key = metadata_key(EXPORT_HASHES, repo);
    store.set_metadata(&export_hashes_key, "{}")?;

    store.set_metadata(&hash_key, &content_hash)?;
    let last_import_key = metadata_key(LAST_IMPORT_TIME, repo);
    store.set_metadata(&last_import_key, &Utc::now().to_rfc3339())?;

    Ok(outcome)
}

/// After a successful import, compares the in-store issue count against
/// the journal as committed at HEAD (spec §4.3.3 step 7). If the store's
/// count differs from HEAD's while matching the working-tree journal, the
/// journal has uncommitted changes -- not a failure, just a warning the
/// caller may surface.
pub fn check_uncommitted_after_import(
    store: &dyn Storage,
    journal_path: &Path,
    repo_root: &Path,
) -> Result<Option<String>> {
    let working_tree_count = {
        let content = std::fs::read_to_string(journal_path).unwrap_or_default();
        jsonl::parse_jsonl(&content).len()
    };
    let store_count = store
        .list_all_issues()?
        .into_iter()
        .filter(|i| !i.ephemeral)
        .count();

    if store_count != working_tree_count {
        return Ok(None);
    }

    let rel = journal_path
        .strip_prefix(repo_root)
        .unwrap_or(journal_path)
        .to_string_lossy()
        .into_owned();

    let head_content = match beads_git::commands::show_file_at_revision("HEAD", &rel, repo_root) {
        Ok(content) => content,
        Err(_) => return Ok(None), // no HEAD commit yet, or not a git repo; nothing to warn about
    };
    let head_count = jsonl::parse_jsonl(&head_content).len();

    if head_count != store_count {
        Ok(Some(format!(
            "{} has uncommitted changes: {} issue(s) in the working tree, {} at HEAD",
            rel, store_count, head_count
        )))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_core::issue::IssueBuilder;
    use beads_storage::{SqliteStore, TombstoneCapable};
    use tempfile::tempdir;

    #[test]
    fn creates_new_issues_from_journal() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        let issue = IssueBuilder::new("Imported").id("bd-1").build();
        jsonl::write_jsonl_atomic(&path, &[issue]).unwrap();

        let outcome = import(&store, &path, None, false).unwrap();
        assert_eq!(outcome.created, 1);
        assert!(store.get_issue("bd-1").is_ok());
    }

    #[test]
    fn skips_when_hash_already_mirrored() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        let issue = IssueBuilder::new("Imported").id("bd-1").build();
        let write = jsonl::write_jsonl_atomic(&path, &[issue]).unwrap();
        store
            .set_metadata(JSONL_CONTENT_HASH, &write.content_hash)
            .unwrap();

        let outcome = import(&store, &path, None, false).unwrap();
        assert_eq!(outcome, ImportOutcome::default());
    }

    #[test]
    fn tombstone_in_store_is_never_downgraded() {
        let store = SqliteStore::open_in_memory().unwrap();
        let issue = IssueBuilder::new("Gone").id("bd-1").build();
        store.create_issue(&issue, "alice").unwrap();
        store
            .tombstone_issue("bd-1", "alice", None, Utc::now())
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        let mut live_again = IssueBuilder::new("Gone").id("bd-1").build();
        live_again.updated_at = Utc::now() + chrono::Duration::seconds(10);
        jsonl::write_jsonl_atomic(&path, &[live_again]).unwrap();

        import(&store, &path, None, true).unwrap();
        let stored = store.get_issue("bd-1").unwrap();
        assert_eq!(stored.status, Status::Tombstone);
    }

    #[test]
    fn incoming_tombstone_converts_even_when_stored_is_newer() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut issue = IssueBuilder::new("Still open locally").id("bd-1").build();
        issue.updated_at = Utc::now();
        store.create_issue(&issue, "alice").unwrap();
        // A local edit lands after the remote delete's timestamp, so the
        // stored copy is strictly newer than the incoming tombstone.
        store
            .update_issue(
                "bd-1",
                &IssueUpdates {
                    title: Some("Edited locally after the remote delete".to_string()),
                    ..Default::default()
                },
                "alice",
            )
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("issues.jsonl");
        let mut tombstoned = IssueBuilder::new("Still open locally").id("bd-1").build();
        tombstoned.status = Status::Tombstone;
        tombstoned.deleted_by = Some("bob".to_string());
        tombstoned.updated_at = Utc::now() - chrono::Duration::seconds(30);
        jsonl::write_jsonl_atomic(&path, &[tombstoned]).unwrap();

        import(&store, &path, None, true).unwrap();
        let stored = store.get_issue("bd-1").unwrap();
        assert_eq!(stored.status, Status::Tombstone);
    }
}
