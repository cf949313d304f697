//! `bd defer` -- defer an issue until a future date.

use anyhow::{bail, Context, Result};
use chrono::Utc;

use beads_timeparsing::parse_timestamp;

use crate::cli::DeferArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd defer` command.
pub fn run(ctx: &RuntimeContext, args: &DeferArgs) -> Result<()> {
    if ctx.readonly {
        bail!("cannot defer issues in read-only mode");
    }

    let until = args
        .until
        .as_deref()
        .context("--until is required (e.g. --until 2025-06-01)")?;
    let defer_until = parse_timestamp(until)
        .map_err(|e| anyhow::anyhow!("invalid --until value '{}': {}", until, e))?;

    let beads_dir = ctx
        .resolve_db_path()
        .context("no beads database found. Run 'bd init' to create one.")?;
    let db_path = beads_dir.join("beads.db");

    if !db_path.exists() {
        bail!(
            "no beads database found at {}\nHint: run 'bd init' to create a database",
            db_path.display()
        );
    }

    let conn = rusqlite::Connection::open(&db_path)
        .with_context(|| format!("failed to open database: {}", db_path.display()))?;

    let exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM issues WHERE id = ?1)",
            rusqlite::params![&args.id],
            |row| row.get(0),
        )
        .unwrap_or(false);
    if !exists {
        bail!("issue '{}' not found", args.id);
    }

    let now_str = Utc::now().to_rfc3339();
    let defer_until_str = defer_until.to_rfc3339();

    conn.execute(
        "UPDATE issues SET defer_until = ?1, updated_at = ?2 WHERE id = ?3",
        rusqlite::params![&defer_until_str, &now_str, &args.id],
    )
    .with_context(|| format!("failed to defer issue {}", args.id))?;

    conn.execute(
        "INSERT INTO events (issue_id, event_type, actor, new_value, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![&args.id, "updated", &ctx.actor, &defer_until_str, &now_str],
    )?;

    if ctx.json {
        output_json(&serde_json::json!({
            "id": args.id,
            "defer_until": defer_until_str,
        }));
    } else if !ctx.quiet {
        println!("Deferred {} until {}", args.id, defer_until_str);
    }

    Ok(())
}
