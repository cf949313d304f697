//! `bd-daemon` -- per-workspace daemon entry point (§4.5).
//!
//! Acquires the workspace's single-writer lock, binds the RPC socket, and
//! runs the event loop on the main thread until a signal or the parent
//! process going away requests shutdown.

mod context;
mod debounce;
mod error;
mod event_loop;
mod health;
mod rpc;
mod watch;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use beads_config::beads_dir::{find_beads_dir_or_error, jsonl_path};
use beads_config::config::load_config;
use beads_lockfile::FileLock;
use beads_storage::SqliteStore;
use tracing::info;

use context::WorkspaceContext;
use error::DaemonError;
use rpc::{MutationBroadcast, RpcServer};

/// Flipped by the signal handler. A signal handler may only touch values
/// with a `'static` address, so the forwarder thread below is what moves
/// this onto the `Arc<AtomicBool>` the event loop actually watches.
static SIGNAL_RECEIVED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn handle_signal(_: libc::c_int) {
    SIGNAL_RECEIVED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
fn install_signal_handlers() {}

fn spawn_signal_forwarder(shutdown: Arc<AtomicBool>) {
    std::thread::spawn(move || loop {
        if SIGNAL_RECEIVED.load(Ordering::SeqCst) {
            shutdown.store(true, Ordering::SeqCst);
            return;
        }
        std::thread::sleep(Duration::from_millis(100));
    });
}

fn install_logging(log_path: &std::path::Path) -> anyhow::Result<()> {
    let file = std::fs::OpenOptions::new().create(true).append(true).open(log_path)?;
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "bd_daemon=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn write_pid_file(path: &std::path::Path, pid: u32, parent_pid: u32) -> std::io::Result<()> {
    std::fs::write(path, format!("{pid}\n{parent_pid}\n"))
}

fn main() {
    if let Err(e) = run() {
        eprintln!("bd-daemon: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let beads_dir = find_beads_dir_or_error(&cwd)?;

    // Single-writer arbitration: a workspace has at most one daemon. A
    // zero-timeout acquire is a single non-blocking attempt, so contention
    // fails fast rather than waiting on whatever the other daemon is doing.
    let lock_path = beads_dir.join("bd.daemon.lock");
    let lock = FileLock::acquire(&lock_path, Duration::ZERO).map_err(DaemonError::AlreadyRunning)?;

    let config = load_config(&beads_dir)?;
    let db_path = beads_dir.join("beads.db");
    let journal_path = jsonl_path(&beads_dir);
    let store = SqliteStore::open(&db_path)?;

    let ctx = WorkspaceContext::new(store, beads_dir.clone(), journal_path, None, config);

    install_logging(&ctx.log_path())?;
    install_signal_handlers();

    let pid = std::process::id();
    #[cfg(unix)]
    let parent_pid = unsafe { libc::getppid() } as u32;
    #[cfg(not(unix))]
    let parent_pid = 0u32;

    write_pid_file(&ctx.pid_path(), pid, parent_pid)?;
    info!(pid, parent_pid, beads_dir = %beads_dir.display(), "bd-daemon starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    spawn_signal_forwarder(shutdown.clone());

    let (broadcast, mutation_rx) = MutationBroadcast::new();
    let rpc_server = Arc::new(RpcServer::bind(ctx.clone(), broadcast.clone())?);
    let rpc_thread = {
        let server = rpc_server.clone();
        std::thread::spawn(move || server.run())
    };

    let health_sentinel = format!("{pid}:{}", chrono::Utc::now().timestamp());
    let event_loop = event_loop::EventLoop::new(
        ctx.clone(),
        mutation_rx,
        broadcast,
        Some(parent_pid),
        shutdown,
        health_sentinel,
    );
    event_loop.run();

    rpc_server.request_stop();
    let _ = rpc_thread.join();
    let _ = std::fs::remove_file(ctx.pid_path());
    drop(lock);
    info!("bd-daemon stopped");
    Ok(())
}
