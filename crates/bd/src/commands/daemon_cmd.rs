//! `bd daemon` -- start, stop, and check the per-workspace daemon.
//!
//! `bd-daemon` is a separate binary, launched detached and identified to
//! the rest of the toolchain only through files in `.beads/`: `bd.sock`
//! (the RPC socket, whose mere presence is the readiness signal) and
//! `bd.pid` (daemon PID on the first line, parent PID on the second).

use std::io::ErrorKind;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};

use crate::cli::{DaemonArgs, DaemonCommands};
use crate::context::RuntimeContext;
use crate::output::output_json;

/// How long `bd daemon start` waits for the socket to appear before giving
/// up and warning the caller instead of failing outright (§4.6).
const READY_WAIT_CAP: Duration = Duration::from_secs(5);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Execute the `bd daemon` command.
pub fn run(ctx: &RuntimeContext, args: &DaemonArgs) -> Result<()> {
    match &args.command {
        DaemonCommands::Start => run_start(ctx),
        DaemonCommands::Stop => run_stop(ctx),
        DaemonCommands::Status => run_status(ctx),
    }
}

fn run_start(ctx: &RuntimeContext) -> Result<()> {
    let beads_dir = ctx
        .resolve_db_path()
        .context("no .beads directory found. Run 'bd init' first.")?;
    let pid_path = beads_dir.join("bd.pid");
    let socket_path = beads_dir.join("bd.sock");

    if let Some(pid) = read_live_pid(&pid_path) {
        if !ctx.quiet {
            println!("daemon already running (pid {pid})");
        }
        return Ok(());
    }

    let daemon_exe = daemon_binary_path()?;
    let child = Command::new(&daemon_exe)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {}", daemon_exe.display()))?;

    let deadline = Instant::now() + READY_WAIT_CAP;
    while !socket_path.exists() {
        if Instant::now() >= deadline {
            let log_path = beads_dir.join("daemon.log");
            eprintln!(
                "daemon spawned (pid {}) but did not signal ready within {:?}; check {}",
                child.id(),
                READY_WAIT_CAP,
                log_path.display()
            );
            return Ok(());
        }
        std::thread::sleep(READY_POLL_INTERVAL);
    }

    if ctx.json {
        output_json(&serde_json::json!({ "pid": child.id(), "status": "started" }));
    } else if !ctx.quiet {
        println!("daemon started (pid {})", child.id());
    }
    Ok(())
}

fn run_stop(ctx: &RuntimeContext) -> Result<()> {
    let beads_dir = ctx
        .resolve_db_path()
        .context("no .beads directory found. Run 'bd init' first.")?;
    let pid_path = beads_dir.join("bd.pid");

    let Some(pid) = read_live_pid(&pid_path) else {
        if !ctx.quiet {
            println!("daemon is not running");
        }
        return Ok(());
    };

    send_terminate(pid)?;

    let deadline = Instant::now() + READY_WAIT_CAP;
    while read_live_pid(&pid_path).is_some() {
        if Instant::now() >= deadline {
            bail!("sent stop signal to pid {pid} but it is still running after {READY_WAIT_CAP:?}");
        }
        std::thread::sleep(READY_POLL_INTERVAL);
    }

    if !ctx.quiet {
        println!("daemon stopped (pid {pid})");
    }
    Ok(())
}

fn run_status(ctx: &RuntimeContext) -> Result<()> {
    let beads_dir = ctx
        .resolve_db_path()
        .context("no .beads directory found. Run 'bd init' first.")?;
    let pid_path = beads_dir.join("bd.pid");

    match read_live_pid(&pid_path) {
        Some(pid) => {
            if ctx.json {
                output_json(&serde_json::json!({ "running": true, "pid": pid }));
            } else {
                println!("daemon running (pid {pid})");
            }
        }
        None => {
            if ctx.json {
                output_json(&serde_json::json!({ "running": false }));
            } else {
                println!("daemon is not running");
            }
        }
    }
    Ok(())
}

/// Reads `bd.pid`'s first line as the daemon PID and checks it's still
/// alive, cleaning up a stale file left by a crashed daemon.
fn read_live_pid(pid_path: &std::path::Path) -> Option<u32> {
    let content = std::fs::read_to_string(pid_path).ok()?;
    let pid: u32 = content.lines().next()?.trim().parse().ok()?;
    if is_alive(pid) {
        Some(pid)
    } else {
        let _ = std::fs::remove_file(pid_path);
        None
    }
}

#[cfg(unix)]
fn is_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
fn is_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<()> {
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if result != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() != ErrorKind::NotFound {
            bail!("failed to signal pid {pid}: {err}");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_terminate(_pid: u32) -> Result<()> {
    bail!("stopping the daemon is only supported on unix")
}

/// Locates the `bd-daemon` binary alongside the currently running `bd`
/// executable -- the two are always built into the same target directory.
fn daemon_binary_path() -> Result<std::path::PathBuf> {
    let exe = std::env::current_exe().context("failed to determine the bd executable's path")?;
    let name = if cfg!(windows) { "bd-daemon.exe" } else { "bd-daemon" };
    Ok(exe.with_file_name(name))
}
