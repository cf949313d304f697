//! `bd mol` -- molecule operations.
//!
//! Implements:
//! - `pour`: create persistent issues from a formula
//! - `wisp`: create ephemeral issues from a formula
//! - `show`: display a molecule (formula-created issue set) and its children
//! - `progress`: show completion progress for a molecule
//! - `bond`: combine two protos/molecules/formulas into a compound
//! - `squash`: collapse a molecule's ephemeral children into a digest
//!
//! Other subcommands remain stubs.

use anyhow::{bail, Context, Result};
use chrono::Utc;

use beads_formula::engine;
use beads_formula::parser;
use beads_mol::bond::{
    bond_proto_proto, bond_to_molecule, resolve_ephemeral_flag, BondOperand, BondOptions,
};
use beads_mol::error::MolError;
use beads_mol::squash::{squash, SquashOptions};
use beads_mol::subgraph::load_template_subgraph;
use beads_storage::{SqliteStore, Storage};

use crate::cli::{MolArgs, MolBondArgs, MolCommands, MolSquashArgs};
use crate::commands::cook::{create_issues, parse_var_flags};
use crate::context::RuntimeContext;
use crate::output::{output_json, output_table};

/// Execute the `bd mol` command.
pub fn run(ctx: &RuntimeContext, args: &MolArgs) -> Result<()> {
    match &args.command {
        MolCommands::Pour(a) => cmd_pour(ctx, a),
        MolCommands::Wisp(a) => cmd_wisp(ctx, a),
        MolCommands::Show(a) => cmd_show(ctx, a),
        MolCommands::Progress(a) => cmd_progress(ctx, a),
        MolCommands::Bond(a) => cmd_bond(ctx, a),
        MolCommands::Squash(a) => cmd_squash(ctx, a),
        MolCommands::Burn(_) => stub("burn"),
        MolCommands::Distill(_) => stub("distill"),
        MolCommands::Seed(_) => stub("seed"),
        MolCommands::Stale(_) => stub("stale"),
        MolCommands::ReadyGated(_) => stub("ready-gated"),
        MolCommands::Current(_) => stub("current"),
    }
}

fn stub(name: &str) -> Result<()> {
    println!("bd mol {}: not yet implemented", name);
    Ok(())
}

// ---------------------------------------------------------------------------
// Pour
// ---------------------------------------------------------------------------

fn cmd_pour(ctx: &RuntimeContext, args: &crate::cli::MolPourArgs) -> Result<()> {
    let formula_name = args
        .id
        .as_deref()
        .context("formula name or path is required")?;

    let cwd = std::env::current_dir()?;
    let path = parser::find_formula(formula_name, &cwd).map_err(|e| anyhow::anyhow!("{}", e))?;
    let formula = parser::load_formula(&path).map_err(|e| anyhow::anyhow!("{}", e))?;

    let vars = parse_var_flags(&args.vars)?;
    let cooked = engine::cook(&formula, &vars).map_err(|e| anyhow::anyhow!("{}", e))?;

    if cooked.is_empty() {
        println!("No steps to create (all filtered by conditions).");
        return Ok(());
    }

    if args.dry_run {
        return print_pour_preview(&formula.formula, &cooked, false);
    }

    create_issues(ctx, &formula.formula, &cooked, false)
}

// ---------------------------------------------------------------------------
// Wisp
// ---------------------------------------------------------------------------

fn cmd_wisp(ctx: &RuntimeContext, args: &crate::cli::MolWispArgs) -> Result<()> {
    let formula_name = args
        .id
        .as_deref()
        .context("formula name or path is required")?;

    let cwd = std::env::current_dir()?;
    let path = parser::find_formula(formula_name, &cwd).map_err(|e| anyhow::anyhow!("{}", e))?;
    let formula = parser::load_formula(&path).map_err(|e| anyhow::anyhow!("{}", e))?;

    let vars = parse_var_flags(&args.vars)?;
    let cooked = engine::cook(&formula, &vars).map_err(|e| anyhow::anyhow!("{}", e))?;

    if cooked.is_empty() {
        println!("No steps to create (all filtered by conditions).");
        return Ok(());
    }

    if args.dry_run {
        return print_pour_preview(&formula.formula, &cooked, true);
    }

    create_issues(ctx, &formula.formula, &cooked, true)
}

fn print_pour_preview(
    formula_name: &str,
    steps: &[beads_formula::types::CookedStep],
    ephemeral: bool,
) -> Result<()> {
    let mode = if ephemeral { "wisp" } else { "pour" };
    println!("Formula: {} ({})", formula_name, mode);
    println!("Steps ({}):", steps.len());
    for step in steps {
        let deps = if step.needs.is_empty() {
            String::new()
        } else {
            format!(" (needs: {})", step.needs.join(", "))
        };
        println!(
            "  {} [P{}] [{}] {}{}",
            step.id, step.priority, step.issue_type, step.title, deps,
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

fn cmd_show(ctx: &RuntimeContext, args: &crate::cli::MolShowArgs) -> Result<()> {
    let id = args.id.as_deref().context("molecule ID is required")?;

    let conn = open_db(ctx)?;

    // Find all issues with the formula:<id> label
    let label = format!("formula:{}", id);
    let mut stmt = conn.prepare(
        "SELECT i.id, i.title, i.status, i.priority, i.issue_type \
         FROM issues i \
         JOIN labels l ON i.id = l.issue_id \
         WHERE l.label = ?1 \
         ORDER BY i.created_at ASC",
    )?;

    let issues: Vec<(String, String, String, i32, String)> = stmt
        .query_map(rusqlite::params![&label], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get::<_, String>(2).unwrap_or_default(),
                row.get(3)?,
                row.get::<_, String>(4).unwrap_or_default(),
            ))
        })?
        .filter_map(|r| r.ok())
        .collect();

    if issues.is_empty() {
        bail!("no issues found for molecule '{}'", id);
    }

    if ctx.json {
        let items: Vec<serde_json::Value> = issues
            .iter()
            .map(|(id, title, status, pri, itype)| {
                serde_json::json!({
                    "id": id,
                    "title": title,
                    "status": status,
                    "priority": pri,
                    "type": itype,
                })
            })
            .collect();
        output_json(&serde_json::json!({
            "molecule": id,
            "issues": items,
        }));
    } else {
        println!("Molecule: {}", id);
        println!("Issues ({}):", issues.len());
        let headers = &["ID", "PRI", "STATUS", "TYPE", "TITLE"];
        let rows: Vec<Vec<String>> = issues
            .iter()
            .map(|(id, title, status, pri, itype)| {
                vec![
                    id.clone(),
                    format!("P{}", pri),
                    status.clone(),
                    itype.clone(),
                    title.clone(),
                ]
            })
            .collect();
        output_table(headers, &rows);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

fn cmd_progress(ctx: &RuntimeContext, args: &crate::cli::MolProgressArgs) -> Result<()> {
    let id = args.id.as_deref().context("molecule ID is required")?;

    let conn = open_db(ctx)?;

    let label = format!("formula:{}", id);

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM labels WHERE label = ?1",
        rusqlite::params![&label],
        |row| row.get(0),
    )?;

    if total == 0 {
        bail!("no issues found for molecule '{}'", id);
    }

    let closed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM issues i \
         JOIN labels l ON i.id = l.issue_id \
         WHERE l.label = ?1 AND i.status = 'closed'",
        rusqlite::params![&label],
        |row| row.get(0),
    )?;

    let pct = if total > 0 {
        (closed as f64 / total as f64 * 100.0) as i32
    } else {
        0
    };

    if ctx.json {
        output_json(&serde_json::json!({
            "molecule": id,
            "total": total,
            "closed": closed,
            "open": total - closed,
            "percent": pct,
        }));
    } else {
        println!(
            "Molecule '{}': {}/{} steps complete ({}%)",
            id, closed, total, pct,
        );
        // Simple progress bar
        let bar_width = 30;
        let filled = (pct as usize * bar_width) / 100;
        let empty = bar_width - filled;
        println!("  [{}{}]", "#".repeat(filled), "-".repeat(empty),);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Bond
// ---------------------------------------------------------------------------

fn cmd_bond(ctx: &RuntimeContext, args: &MolBondArgs) -> Result<()> {
    let a_token = args.id.as_deref().context("first operand is required")?;
    let b_token = args.other.as_deref().context("second operand (--other) is required")?;

    let store = open_rw_store(ctx)?;
    let vars = parse_var_flags(&args.vars)?;
    let base_prefix = store.get_config("issue_prefix").unwrap_or_else(|_| "bd".to_string());
    let ephemeral = if args.ephemeral || args.pour {
        Some(resolve_ephemeral_flag(args.ephemeral, args.pour, false).map_err(mol_err)?)
    } else {
        None
    };
    let now = Utc::now();

    let a_operand = classify_operand(&store, a_token)?;
    let b_operand = classify_operand(&store, b_token)?;

    let opts = BondOptions {
        vars,
        var_specs: std::collections::HashMap::new(),
        ephemeral,
        child_ref_template: args.child_ref.clone(),
        base_prefix,
        actor: ctx.actor.clone(),
    };

    let (a_root, b_root) = match (a_operand, b_operand) {
        (BondOperand::Molecule(m), spawned) => {
            let outcome = bond_to_molecule(&store, spawned, &m, &args.bond_type, &opts, now).map_err(mol_err)?;
            (outcome.a_root, outcome.b_root)
        }
        (spawned, BondOperand::Molecule(m)) => {
            let outcome = bond_to_molecule(&store, spawned, &m, &args.bond_type, &opts, now).map_err(mol_err)?;
            (outcome.a_root, outcome.b_root)
        }
        (BondOperand::Proto(a_id), BondOperand::Proto(b_id)) => {
            let compound = bond_proto_proto(&store, &a_id, &b_id, &args.bond_type, &opts.base_prefix, &opts.actor, now)
                .map_err(mol_err)?;
            (compound.clone(), compound)
        }
        _ => bail!(
            "bonding two templates requires at least one to already be a standing molecule; \
             pour or wisp one of them first"
        ),
    };

    if ctx.json {
        output_json(&serde_json::json!({
            "a_root": a_root,
            "b_root": b_root,
            "type": args.bond_type,
        }));
    } else {
        println!("Bonded ({}): {} <-> {}", args.bond_type, a_root, b_root);
    }

    Ok(())
}

/// Classifies a bond operand token: a live issue tagged `template` is a
/// proto, a live issue without that tag is a standing molecule, and
/// anything not found in the store is looked up as a formula file.
fn classify_operand(store: &dyn Storage, token: &str) -> Result<BondOperand> {
    match store.get_issue(token) {
        Ok(_) => {
            let labels = store.get_labels(token)?;
            if labels.iter().any(|l| l == beads_mol::subgraph::TEMPLATE_LABEL) {
                Ok(BondOperand::Proto(token.to_string()))
            } else {
                Ok(BondOperand::Molecule(token.to_string()))
            }
        }
        Err(_) => {
            let cwd = std::env::current_dir()?;
            let path = parser::find_formula(token, &cwd).map_err(|e| anyhow::anyhow!("{}", e))?;
            let formula = parser::load_formula(&path).map_err(|e| anyhow::anyhow!("{}", e))?;
            Ok(BondOperand::Formula(formula))
        }
    }
}

// ---------------------------------------------------------------------------
// Squash
// ---------------------------------------------------------------------------

fn cmd_squash(ctx: &RuntimeContext, args: &MolSquashArgs) -> Result<()> {
    let id = args.id.as_deref().context("molecule ID is required")?;

    let store = open_rw_store(ctx)?;
    let subgraph = load_template_subgraph(&store, id).map_err(mol_err)?;

    let opts = SquashOptions {
        delete_children: args.delete_children,
        summary: args.summary.clone(),
        base_prefix: store.get_config("issue_prefix").unwrap_or_else(|_| "bd".to_string()),
        actor: ctx.actor.clone(),
    };

    let outcome = squash(&store, &subgraph, &opts, Utc::now()).map_err(mol_err)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "digest_id": outcome.digest_id,
            "deleted_ids": outcome.deleted_ids,
        }));
    } else {
        println!("Created digest {}", outcome.digest_id);
        if !outcome.deleted_ids.is_empty() {
            println!("Deleted {} ephemeral step(s): {}", outcome.deleted_ids.len(), outcome.deleted_ids.join(", "));
        }
    }

    Ok(())
}

fn mol_err(e: MolError) -> anyhow::Error {
    anyhow::anyhow!("{e}")
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open_rw_store(ctx: &RuntimeContext) -> Result<SqliteStore> {
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
    if ctx.readonly {
        bail!("cannot modify molecules in read-only mode");
    }

    SqliteStore::open(&db_path).with_context(|| format!("failed to open database: {}", db_path.display()))
}

fn open_db(ctx: &RuntimeContext) -> Result<rusqlite::Connection> {
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

    rusqlite::Connection::open_with_flags(
        &db_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database: {}", db_path.display()))
}
