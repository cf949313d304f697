//! `bd promote` -- promote a child issue to top-level (stub).

use anyhow::Result;

use crate::context::RuntimeContext;

/// Execute the `bd promote` command (stub).
pub fn run(_ctx: &RuntimeContext) -> Result<()> {
    println!("bd promote: not yet implemented");
    Ok(())
}
