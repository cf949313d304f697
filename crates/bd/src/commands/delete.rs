//! `bd delete` -- sync-safe tombstone deletion (core spec §4.4).
//!
//! Deleting an issue never removes its row from the store: it converts
//! the issue to a tombstone so the deletion survives a concurrent clone
//! that still has the live version. See [`beads_sync::tombstone`].

use anyhow::{bail, Context, Result};

use beads_storage::SqliteStore;
use beads_sync::tombstone::{batch_delete, DeleteFlags};
use beads_sync::SyncError;

use crate::cli::DeleteArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd delete` command.
pub fn run(ctx: &RuntimeContext, args: &DeleteArgs) -> Result<()> {
    if ctx.readonly {
        bail!("cannot delete issues in read-only mode");
    }

    let beads_dir = ctx
        .resolve_db_path()
        .context("no beads database found. Run 'bd init' to create one.")?;
    let db_path = beads_dir.join("beads.db");
    let journal_path = beads_dir.join("issues.jsonl");

    if !db_path.exists() {
        bail!(
            "no beads database found at {}\nHint: run 'bd init' to create a database",
            db_path.display()
        );
    }

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;

    let flags = DeleteFlags {
        force: args.force,
        dry_run: args.dry_run,
        cascade: args.cascade,
        hard: args.hard,
    };

    let outcome = match batch_delete(
        &store,
        &journal_path,
        &args.ids,
        &ctx.actor,
        args.reason.as_deref(),
        flags,
    ) {
        Ok(outcome) => outcome,
        Err(SyncError::Conflict(msg)) => bail!("{msg}"),
        Err(SyncError::HasDependents { id, count }) => {
            bail!("issue {id} has {count} dependent(s) outside the delete set; use --cascade or --force")
        }
        Err(SyncError::IssueNotFound(id)) => bail!("issue not found: {id}"),
        Err(e) => return Err(e.into()),
    };

    if ctx.json {
        output_json(&serde_json::json!({
            "tombstoned": outcome.tombstoned,
            "rewritten": outcome.rewritten,
            "dry_run": outcome.dry_run,
        }));
    } else if outcome.dry_run {
        println!(
            "[DRY RUN] Would tombstone {} issue(s): {}",
            outcome.tombstoned.len(),
            outcome.tombstoned.join(", ")
        );
        if !outcome.rewritten.is_empty() {
            println!(
                "[DRY RUN] Would rewrite references in {} neighbor(s): {}",
                outcome.rewritten.len(),
                outcome.rewritten.join(", ")
            );
        }
    } else {
        for id in &outcome.tombstoned {
            println!("Deleted {}", id);
        }
        if !outcome.rewritten.is_empty() {
            println!(
                "Rewrote references in {} neighbor(s): {}",
                outcome.rewritten.len(),
                outcome.rewritten.join(", ")
            );
        }
    }

    Ok(())
}
