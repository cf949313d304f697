//! `bd branch` -- create a git branch from an issue (stub).

use anyhow::Result;

use crate::context::RuntimeContext;

/// Execute the `bd branch` command (stub).
pub fn run(_ctx: &RuntimeContext) -> Result<()> {
    println!("bd branch: not yet implemented");
    Ok(())
}
