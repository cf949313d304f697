//! `bd import` -- read the journal into the store (core spec §4.3.3), or
//! import issues from an external source/format.

use anyhow::{bail, Context, Result};

use beads_storage::SqliteStore;
use beads_sync::import::import;

use crate::cli::ImportArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd import` command.
pub fn run(ctx: &RuntimeContext, args: &ImportArgs) -> Result<()> {
    if let Some(source) = &args.source {
        println!(
            "bd import --format {}: import from external source '{}' not yet implemented",
            args.format, source
        );
        return Ok(());
    }

    if ctx.readonly {
        bail!("cannot import in read-only mode");
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
    if !journal_path.exists() {
        bail!("no journal found at {}", journal_path.display());
    }

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;

    let outcome = import(&store, &journal_path, None, false)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "created": outcome.created,
            "updated": outcome.updated,
            "skipped": outcome.skipped,
        }));
    } else {
        println!(
            "Imported from {}: {} created, {} updated, {} skipped",
            journal_path.display(),
            outcome.created,
            outcome.updated,
            outcome.skipped
        );
    }

    Ok(())
}
