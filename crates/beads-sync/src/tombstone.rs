//! Tombstone engine: single/batch delete, pruning, resurrection safety
//! (spec §4.4).

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use beads_core::issue::Issue;
use beads_core::jsonl;
use beads_storage::{Storage, TombstoneCapable};
use chrono::{DateTime, Duration, Utc};

use crate::{Result, SyncError};

/// Flags controlling a delete operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteFlags {
    /// Skip the confirmation preview and apply the change.
    pub force: bool,
    /// Compute the change but do not apply it.
    pub dry_run: bool,
    /// Pull in transitive dependents rather than failing on them.
    pub cascade: bool,
    /// Immediately prune the tombstone from the journal, bypassing TTL.
    pub hard: bool,
}

/// What a delete call did or would do.
#[derive(Debug, Clone, Default)]
pub struct DeleteOutcome {
    /// IDs converted to tombstones (or that would be, under dry-run).
    pub tombstoned: Vec<String>,
    /// IDs of neighboring issues whose free-form text was (or would be)
    /// rewritten to replace a reference to a deleted ID.
    pub rewritten: Vec<String>,
    /// True if this was a dry-run: `tombstoned`/`rewritten` are a preview,
    /// nothing was applied.
    pub dry_run: bool,
}

const TEXT_FIELDS: usize = 4;

fn free_form_fields(issue: &Issue) -> [&str; TEXT_FIELDS] {
    [
        &issue.description,
        &issue.notes,
        &issue.design,
        &issue.acceptance_criteria,
    ]
}

/// Replaces whole-token occurrences of `id` in `text` with `[deleted:<id>]`.
///
/// A "token" is a maximal run of alphanumerics and hyphens; this prevents
/// rewriting `bd-12` when deleting `bd-1`, since the character after `bd-1`
/// in `bd-12` (`2`) extends the token rather than ending it.
pub fn rewrite_references(text: &str, id: &str) -> (String, bool) {
    let bytes = text.as_bytes();
    let id_bytes = id.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut i = 0;

    fn is_token_char(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.'
    }

    while i < bytes.len() {
        if bytes[i..].starts_with(id_bytes) {
            let before_ok = i == 0 || !is_token_char(bytes[i - 1]);
            let after = i + id_bytes.len();
            let after_ok = after >= bytes.len() || !is_token_char(bytes[after]);
            if before_ok && after_ok {
                out.push_str(&format!("[deleted:{id}]"));
                i = after;
                changed = true;
                continue;
            }
        }
        // Push one char at a time, respecting UTF-8 boundaries.
        let ch_len = utf8_char_len(bytes[i]);
        out.push_str(&text[i..i + ch_len]);
        i += ch_len;
    }

    (out, changed)
}

fn utf8_char_len(lead: u8) -> usize {
    if lead & 0x80 == 0 {
        1
    } else if lead & 0xE0 == 0xC0 {
        2
    } else if lead & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

/// Rewrites every free-form field of `issue` that references `id`, applying
/// the update in-place on the store. Returns `true` if anything changed.
fn rewrite_issue_references(store: &dyn Storage, issue: &Issue, id: &str, actor: &str) -> Result<bool> {
    let (description, d1) = rewrite_references(&issue.description, id);
    let (notes, d2) = rewrite_references(&issue.notes, id);
    let (design, d3) = rewrite_references(&issue.design, id);
    let (acceptance_criteria, d4) = rewrite_references(&issue.acceptance_criteria, id);

    if !(d1 || d2 || d3 || d4) {
        return Ok(false);
    }

    let updates = beads_storage::IssueUpdates {
        description: Some(description),
        notes: Some(notes),
        design: Some(design),
        acceptance_criteria: Some(acceptance_criteria),
        ..Default::default()
    };
    store.update_issue(&issue.id, &updates, actor)?;
    Ok(true)
}

fn tombstone_capable(store: &dyn Storage) -> Result<&dyn TombstoneCapable> {
    store
        .as_tombstone_capable()
        .ok_or(SyncError::TombstoneUnsupported)
}

/// Single-issue delete (spec §4.4.1).
///
/// `journal_path` is only consulted when `flags.hard` is set, to prune the
/// freshly-created tombstone(s) from the journal immediately, bypassing
/// TTL; the store row always survives (spec §4.4.1, §4.4.3).
pub fn single_delete(
    store: &dyn Storage,
    journal_path: &Path,
    id: &str,
    actor: &str,
    reason: Option<&str>,
    flags: DeleteFlags,
) -> Result<DeleteOutcome> {
    batch_delete(store, journal_path, &[id.to_string()], actor, reason, flags)
}

/// Batch delete with optional cascade (spec §4.4.2).
pub fn batch_delete(
    store: &dyn Storage,
    journal_path: &Path,
    ids: &[String],
    actor: &str,
    reason: Option<&str>,
    flags: DeleteFlags,
) -> Result<DeleteOutcome> {
    let mut set: BTreeSet<String> = BTreeSet::new();
    for id in ids {
        if store.get_issue(id).is_err() {
            return Err(SyncError::IssueNotFound(id.clone()));
        }
        set.insert(id.clone());
    }

    if flags.cascade {
        let mut frontier: Vec<String> = set.iter().cloned().collect();
        while let Some(id) = frontier.pop() {
            for dependent in store.get_dependents(&id)? {
                if set.insert(dependent.id.clone()) {
                    frontier.push(dependent.id);
                }
            }
        }
    } else if !flags.force {
        for id in &set {
            let dependents = store.get_dependents(id)?;
            let outside: Vec<&Issue> = dependents.iter().filter(|d| !set.contains(&d.id)).collect();
            if !outside.is_empty() {
                return Err(SyncError::HasDependents {
                    id: id.clone(),
                    count: outside.len(),
                });
            }
        }
    }

    // Neighbors one hop out of the set, candidates for textual rewriting.
    let mut neighbor_ids: HashSet<String> = HashSet::new();
    for id in &set {
        for issue in store.get_dependencies(id)?.into_iter().chain(store.get_dependents(id)?) {
            if !set.contains(&issue.id) {
                neighbor_ids.insert(issue.id);
            }
        }
    }
    let mut neighbors: Vec<Issue> = Vec::new();
    for id in &neighbor_ids {
        neighbors.push(store.get_issue(id)?);
    }

    let outcome = DeleteOutcome {
        tombstoned: set.iter().cloned().collect(),
        rewritten: neighbors
            .iter()
            .filter(|n| {
                set.iter()
                    .any(|id| free_form_fields(n).iter().any(|f| rewrite_references(f, id).1))
            })
            .map(|n| n.id.clone())
            .collect(),
        dry_run: flags.dry_run,
    };

    // Dry-run always previews, regardless of --force (spec §7: a preview is
    // not a failure). Only a non-preview mutation without --force is
    // refused.
    if flags.dry_run {
        return Ok(outcome);
    }
    if !flags.force {
        return Err(SyncError::Conflict(format!(
            "would tombstone {} issue(s) and rewrite references in {} neighbor(s); re-run with --force to apply",
            outcome.tombstoned.len(),
            outcome.rewritten.len()
        )));
    }

    let capable = tombstone_capable(store)?;
    let at = Utc::now();
    for id in &set {
        capable.tombstone_issue(id, actor, reason, at)?;
    }
    for neighbor in &neighbors {
        rewrite_issue_references_for_set(store, neighbor, &set, actor)?;
    }

    if flags.hard {
        prune_from_journal(journal_path, set.iter())?;
    }

    Ok(outcome)
}

/// Rewrites the journal, atomically, with the given IDs removed from
/// whatever is currently on disk. Used by `--hard` delete to bypass TTL
/// and by age/dependency pruning once a tombstone is eligible. The store
/// row is never touched here -- only the exported copy.
pub fn prune_from_journal<'a>(
    journal_path: &Path,
    ids: impl Iterator<Item = &'a String>,
) -> Result<Vec<String>> {
    if !journal_path.exists() {
        return Ok(Vec::new());
    }
    let to_remove: HashSet<&str> = ids.map(|s| s.as_str()).collect();
    if to_remove.is_empty() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(journal_path)?;
    let all = jsonl::parse_jsonl(&content);
    let mut removed = Vec::new();
    let kept: Vec<Issue> = all
        .into_iter()
        .filter(|issue| {
            if to_remove.contains(issue.id.as_str()) {
                removed.push(issue.id.clone());
                false
            } else {
                true
            }
        })
        .collect();

    jsonl::write_jsonl_atomic(journal_path, &kept)?;
    Ok(removed)
}

fn rewrite_issue_references_for_set(
    store: &dyn Storage,
    issue: &Issue,
    ids: &BTreeSet<String>,
    actor: &str,
) -> Result<()> {
    for id in ids {
        if rewrite_issue_references(store, issue, id, actor)? {
            // Re-fetch so subsequent IDs in the same neighbor rewrite
            // against the already-rewritten text rather than clobbering it.
            if let Ok(updated) = store.get_issue(&issue.id) {
                return rewrite_issue_references_for_set(store, &updated, &{
                    let mut rest = ids.clone();
                    rest.remove(id);
                    rest
                }, actor);
            }
        }
    }
    Ok(())
}

/// Which tombstones a [`prune`] pass considers eligible for journal removal
/// (spec §4.4.3). The store row always survives pruning; only the
/// journal-exported copy is affected.
#[derive(Debug, Clone, Copy)]
pub enum PruneMode {
    /// Remove tombstones older than `ttl`.
    Age { ttl: Duration },
    /// Remove all tombstones regardless of age.
    HardAge,
    /// Remove a tombstone only once no open issue still depends on it;
    /// sever edges from closed issues to tombstones about to be removed.
    DependencyPurge,
}

/// Removes tombstones eligible for pruning under `mode` from the journal
/// at `journal_path`, and severs now-pointless edges from closed issues to
/// pruned tombstones under [`PruneMode::DependencyPurge`]. The store row
/// is left untouched in every mode so a stale clone's import cannot
/// resurrect the issue (spec §4.4.3, §4.4.4).
pub fn prune(
    store: &dyn Storage,
    journal_path: &Path,
    mode: PruneMode,
    now: DateTime<Utc>,
    actor: &str,
) -> Result<Vec<String>> {
    let all = store.list_all_issues()?;
    let tombstones: Vec<&Issue> = all
        .iter()
        .filter(|i| i.status == beads_core::enums::Status::Tombstone)
        .collect();

    let eligible: Vec<String> = match mode {
        PruneMode::Age { ttl } => tombstones
            .iter()
            .filter(|t| t.deleted_at.map(|d| now - d >= ttl).unwrap_or(false))
            .map(|t| t.id.clone())
            .collect(),
        PruneMode::HardAge => tombstones.iter().map(|t| t.id.clone()).collect(),
        PruneMode::DependencyPurge => {
            let mut eligible = Vec::new();
            for t in &tombstones {
                let dependents = store.get_dependents(&t.id)?;
                let still_depended_on = dependents
                    .iter()
                    .any(|d| d.status != beads_core::enums::Status::Closed && d.status != beads_core::enums::Status::Tombstone);
                if !still_depended_on {
                    eligible.push(t.id.clone());
                    for d in &dependents {
                        if d.status == beads_core::enums::Status::Closed {
                            store.remove_dependency(&d.id, &t.id, actor)?;
                        }
                    }
                }
            }
            eligible
        }
    };

    prune_from_journal(journal_path, eligible.iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_core::issue::IssueBuilder;
    use beads_storage::SqliteStore;
    use tempfile::tempdir;

    #[test]
    fn dry_run_without_force_previews_without_applying() {
        let store = SqliteStore::open_in_memory().unwrap();
        let issue = IssueBuilder::new("Doomed").id("bd-1").build();
        store.create_issue(&issue, "alice").unwrap();
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join("issues.jsonl");

        let outcome = batch_delete(
            &store,
            &journal_path,
            &["bd-1".to_string()],
            "alice",
            None,
            DeleteFlags {
                dry_run: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert!(outcome.dry_run);
        assert_eq!(outcome.tombstoned, vec!["bd-1".to_string()]);
        let stored = store.get_issue("bd-1").unwrap();
        assert_ne!(stored.status, beads_core::enums::Status::Tombstone);
    }

    #[test]
    fn no_flags_refuses_without_applying() {
        let store = SqliteStore::open_in_memory().unwrap();
        let issue = IssueBuilder::new("Doomed").id("bd-1").build();
        store.create_issue(&issue, "alice").unwrap();
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join("issues.jsonl");

        let err = batch_delete(
            &store,
            &journal_path,
            &["bd-1".to_string()],
            "alice",
            None,
            DeleteFlags::default(),
        )
        .unwrap_err();

        assert!(matches!(err, SyncError::Conflict(_)));
        let stored = store.get_issue("bd-1").unwrap();
        assert_ne!(stored.status, beads_core::enums::Status::Tombstone);
    }

    #[test]
    fn rewrite_skips_prefix_collision() {
        let (rewritten, changed) = rewrite_references("see bd-12 for context", "bd-1");
        assert!(!changed);
        assert_eq!(rewritten, "see bd-12 for context");
    }

    #[test]
    fn rewrite_replaces_whole_token() {
        let (rewritten, changed) = rewrite_references("blocked by bd-1 until done", "bd-1");
        assert!(changed);
        assert_eq!(rewritten, "blocked by [deleted:bd-1] until done");
    }

    #[test]
    fn rewrite_handles_multiple_occurrences() {
        let (rewritten, changed) = rewrite_references("bd-1 and bd-1 again", "bd-1");
        assert!(changed);
        assert_eq!(rewritten, "[deleted:bd-1] and [deleted:bd-1] again");
    }
}
