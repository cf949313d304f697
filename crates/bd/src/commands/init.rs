//! `bd init` -- initialize a beads database in the current directory.

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::cli::InitArgs;
use crate::context::RuntimeContext;

/// Default gitignore content for the `.beads` directory.
const GITIGNORE_CONTENT: &str = r#"# Beads database files
*.db
*.db-journal
*.db-wal
*.db-shm
dolt/

# Local state
.local_version
interactions.jsonl
"#;

/// Execute the `bd init` command.
pub fn run(ctx: &RuntimeContext, args: &InitArgs) -> Result<()> {
    let cwd = env::current_dir().context("failed to get current directory")?;

    let beads_dir = cwd.join(".beads");

    // Safety guard: check for existing data unless --force
    if !args.force && beads_dir.is_dir() {
        // Check for existing database file
        let db_path = beads_dir.join("beads.db");
        let dolt_path = beads_dir.join("dolt");
        if db_path.exists() || dolt_path.exists() {
            bail!(
                "Found existing database in {}\n\n\
                This workspace is already initialized.\n\n\
                To use the existing database:\n  \
                Just run bd commands normally (e.g., bd list)\n\n\
                To completely reinitialize (data loss warning):\n  \
                rm -rf {} && bd init\n\n\
                Or use --force to re-initialize.",
                beads_dir.display(),
                beads_dir.display()
            );
        }
    }

    // Determine prefix
    let prefix = match &args.prefix {
        Some(p) => p.trim_end_matches('-').to_string(),
        None => {
            // Auto-detect from directory name
            let dir_name = cwd
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "bd".to_string());
            dir_name.trim_end_matches('-').to_string()
        }
    };

    // Create .beads directory
    fs::create_dir_all(&beads_dir)
        .with_context(|| format!("failed to create directory: {}", beads_dir.display()))?;

    // Create .gitignore
    let gitignore_path = beads_dir.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, GITIGNORE_CONTENT).with_context(|| {
            format!("failed to create .gitignore: {}", gitignore_path.display())
        })?;
    }

    // Create metadata.json
    let metadata_path = beads_dir.join("metadata.json");
    if !metadata_path.exists() {
        let metadata = serde_json::json!({
            "backend": "sqlite",
            "database": "beads.db",
            "jsonl_export": "issues.jsonl",
        });
        let content =
            serde_json::to_string_pretty(&metadata).context("failed to serialize metadata.json")?;
        fs::write(&metadata_path, content).with_context(|| {
            format!(
                "failed to create metadata.json: {}",
                metadata_path.display()
            )
        })?;
    }

    // Create the SQLite database
    let db_path = beads_dir.join("beads.db");
    create_database(&db_path, &prefix, &ctx.actor)?;

    // Create empty issues.jsonl
    let jsonl_path = beads_dir.join("issues.jsonl");
    if !jsonl_path.exists() {
        fs::write(&jsonl_path, "")
            .with_context(|| format!("failed to create issues.jsonl: {}", jsonl_path.display()))?;
    }

    if !args.quiet {
        println!();
        println!("bd initialized successfully!");
        println!();
        println!("  Database: {}", db_path.display());
        println!("  Issue prefix: {}", prefix);
        println!(
            "  Issues will be named: {}-<hash> (e.g., {}-a3f2dd)",
            prefix, prefix
        );
        println!();
        println!("Run `bd create \"My first issue\"` to get started.");
        println!();
    }

    Ok(())
}

/// Create and initialize the SQLite database with schema and config.
///
/// Delegates schema creation to [`beads_storage::SqliteStore`] so the DDL
/// lives in exactly one place.
fn create_database(db_path: &PathBuf, prefix: &str, actor: &str) -> Result<()> {
    let store = beads_storage::SqliteStore::open(db_path)
        .with_context(|| format!("failed to create database: {}", db_path.display()))?;

    store
        .set_config_impl("issue_prefix", prefix)
        .context("failed to set issue_prefix")?;
    store
        .set_metadata_impl("bd_version", env!("CARGO_PKG_VERSION"))
        .context("failed to set bd_version")?;

    let now = chrono::Utc::now().to_rfc3339();
    store
        .set_metadata_impl("last_import_time", &now)
        .context("failed to set last_import_time")?;

    if !actor.is_empty() {
        store
            .set_metadata_impl("init_actor", actor)
            .context("failed to set init_actor")?;
    }

    Ok(())
}
