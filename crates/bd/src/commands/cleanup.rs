//! `bd cleanup` -- clean up temporary data (stub).

use anyhow::Result;

use crate::context::RuntimeContext;

/// Execute the `bd cleanup` command (stub).
pub fn run(_ctx: &RuntimeContext) -> Result<()> {
    println!("bd cleanup: not yet implemented");
    Ok(())
}
