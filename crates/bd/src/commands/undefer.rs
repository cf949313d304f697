//! `bd undefer` -- clear a deferred issue's defer-until timestamp.

use anyhow::{bail, Context, Result};
use chrono::Utc;

use crate::cli::UndeferArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `bd undefer` command.
pub fn run(ctx: &RuntimeContext, args: &UndeferArgs) -> Result<()> {
    if ctx.readonly {
        bail!("cannot undefer issues in read-only mode");
    }

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

    let defer_until: Option<String> = conn
        .query_row(
            "SELECT defer_until FROM issues WHERE id = ?1",
            rusqlite::params![&args.id],
            |row| row.get(0),
        )
        .with_context(|| format!("issue '{}' not found", args.id))?;

    if defer_until.is_none() {
        if !ctx.quiet {
            println!("Issue {} is not deferred", args.id);
        }
        return Ok(());
    }

    let now_str = Utc::now().to_rfc3339();

    conn.execute(
        "UPDATE issues SET defer_until = NULL, updated_at = ?1 WHERE id = ?2",
        rusqlite::params![&now_str, &args.id],
    )
    .with_context(|| format!("failed to undefer issue {}", args.id))?;

    conn.execute(
        "INSERT INTO events (issue_id, event_type, actor, old_value, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            &args.id,
            "updated",
            &ctx.actor,
            defer_until.as_deref().unwrap_or_default(),
            &now_str,
        ],
    )?;

    if ctx.json {
        output_json(&serde_json::json!({
            "id": args.id,
            "defer_until": null,
        }));
    } else if !ctx.quiet {
        println!("Undeferred {}", args.id);
    }

    Ok(())
}
