//! `bd export` -- write the store's issues out to the journal (core spec
//! §4.3.2), or export to an external format.

use anyhow::{bail, Context, Result};

use beads_storage::SqliteStore;
use beads_sync::export::export;

use crate::cli::{ExportArgs, ExportCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd export` command.
pub fn run(ctx: &RuntimeContext, args: &ExportArgs) -> Result<()> {
    match &args.command {
        Some(ExportCommands::Obsidian(_)) => {
            println!("bd export obsidian: not yet implemented");
            Ok(())
        }
        None => run_journal_export(ctx),
    }
}

fn run_journal_export(ctx: &RuntimeContext) -> Result<()> {
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

    let outcome = export(&store, &journal_path, None)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "ids": outcome.ids,
            "content_hash": outcome.content_hash,
            "full_export": outcome.full_export,
        }));
    } else if outcome.ids.is_empty() {
        println!("Journal already up to date ({})", journal_path.display());
    } else {
        println!(
            "Exported {} issue(s) to {}{}",
            outcome.ids.len(),
            journal_path.display(),
            if outcome.full_export { " (full export)" } else { "" }
        );
    }

    Ok(())
}
