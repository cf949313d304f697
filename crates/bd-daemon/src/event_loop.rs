//! The daemon event loop (§4.5): a single select-style loop over mutation
//! notifications, file-watch notifications, and a handful of tickers, all
//! funneled through one thread so every side effect (export, import, health
//! check) runs without racing the RPC handlers that share the store.
//!
//! There is no async runtime in this workspace; the loop is plain
//! `std::thread` polling with short sleeps, matching the rest of the crate's
//! synchronous style.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::context::WorkspaceContext;
use crate::debounce::Debouncer;
use crate::health;
use crate::rpc::{MutationBroadcast, MutationEvent};
use crate::watch::Watcher;

/// Tick intervals (§4.5). These are the loop's own polling cadence, not to
/// be confused with the debouncer quiet periods below.
const MAIN_LOOP_TICK: Duration = Duration::from_millis(200);
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const DROPPED_EVENTS_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
const PARENT_LIVENESS_INTERVAL: Duration = Duration::from_secs(10);

/// Quiet period before a debounced export/import actually runs (§4.5
/// "Debounced side effects").
const EXPORT_DEBOUNCE: Duration = Duration::from_millis(500);
const IMPORT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Runs the event loop until [`shutdown`] is observed. Blocks the calling
/// thread; callers typically run this on a dedicated thread or as the
/// entire body of `main`.
pub struct EventLoop {
    ctx: WorkspaceContext,
    mutation_rx: Receiver<MutationEvent>,
    broadcast: MutationBroadcast,
    watcher: Option<Watcher>,
    parent_pid: Option<u32>,
    shutdown: Arc<AtomicBool>,
    health_sentinel: String,
}

impl EventLoop {
    pub fn new(
        ctx: WorkspaceContext,
        mutation_rx: Receiver<MutationEvent>,
        broadcast: MutationBroadcast,
        parent_pid: Option<u32>,
        shutdown: Arc<AtomicBool>,
        health_sentinel: String,
    ) -> Self {
        let poll_interval = ctx
            .config
            .sync
            .remote_pull_interval_duration()
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(crate::watch::DEFAULT_POLL_INTERVAL);
        let watcher = Some(Watcher::new(&ctx.journal_path, poll_interval));

        Self {
            ctx,
            mutation_rx,
            broadcast,
            watcher,
            parent_pid,
            shutdown,
            health_sentinel,
        }
    }

    /// Runs until the shutdown flag is set, either by the parent-liveness
    /// check or by an external signal handler flipping the same `Arc`.
    pub fn run(mut self) {
        let _ = health::ensure_sentinel(self.ctx.store.as_ref(), &self.health_sentinel);

        let export_ctx = self.ctx.clone();
        let export_debouncer = Debouncer::new(EXPORT_DEBOUNCE, move || {
            run_export(&export_ctx);
        });

        let import_ctx = self.ctx.clone();
        let import_debouncer = Debouncer::new(IMPORT_DEBOUNCE, move || {
            run_import(&import_ctx);
        });

        let mut last_health_check = Instant::now();
        let mut last_dropped_sweep = Instant::now();
        let mut last_parent_check = Instant::now();
        let mut last_remote_pull = Instant::now();
        let remote_pull_interval = self
            .ctx
            .config
            .sync
            .remote_pull_interval_duration()
            .unwrap_or(Duration::from_secs(30));

        info!("daemon event loop started");

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            // Mutation notifications from RPC handlers: trigger the export
            // debounce so a burst of writes collapses into one journal write.
            while let Ok(event) = self.mutation_rx.try_recv() {
                debug!(kind = %event.kind, issue_id = %event.issue_id, "mutation observed");
                export_debouncer_trigger(&export_debouncer);
            }

            // File-watch notifications: the journal changed on disk (likely
            // a remote pull having landed new commits), trigger import.
            if let Some(watcher) = &self.watcher {
                if watcher.poll() {
                    debug!("journal change observed on disk");
                    import_debouncer_trigger(&import_debouncer);
                }
            }

            if last_dropped_sweep.elapsed() >= DROPPED_EVENTS_SWEEP_INTERVAL {
                last_dropped_sweep = Instant::now();
                let dropped = self.broadcast.take_dropped();
                if dropped > 0 {
                    warn!(dropped, "mutation broadcast dropped events, forcing export");
                    export_debouncer_trigger(&export_debouncer);
                }
            }

            if last_health_check.elapsed() >= HEALTH_CHECK_INTERVAL {
                last_health_check = Instant::now();
                let report = health::check(self.ctx.store.as_ref(), &self.health_sentinel, &self.ctx.beads_dir);
                if !report.is_healthy() {
                    warn!(?report, "health check reported a problem");
                }
            }

            if !remote_pull_interval.is_zero() && last_remote_pull.elapsed() >= remote_pull_interval {
                last_remote_pull = Instant::now();
                self.run_remote_pull();
            }

            if last_parent_check.elapsed() >= PARENT_LIVENESS_INTERVAL {
                last_parent_check = Instant::now();
                if self.parent_is_gone() {
                    info!("parent process is gone, shutting down");
                    self.shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }

            std::thread::sleep(MAIN_LOOP_TICK);
        }

        info!("daemon event loop stopping");
        // Let any pending debounced action finish before the store closes.
        drop(export_debouncer);
        drop(import_debouncer);
        let _ = self.ctx.store.close();
    }

    /// Pulls from the default remote and, if the journal's mtime changed as
    /// a result, triggers an import on the next loop iteration via the
    /// watcher's own poll (so this function does not duplicate that logic).
    fn run_remote_pull(&self) {
        let Some(repo_root) = beads_git::gitdir::find_git_root(&self.ctx.beads_dir) else {
            return;
        };
        match beads_git::commands::fetch("origin", &repo_root) {
            Ok(_) => debug!("remote fetch completed"),
            Err(e) => {
                debug!(error = %e, "remote fetch failed, skipping pull this tick");
                return;
            }
        }
        if let Err(e) = beads_git::commands::pull("origin", "HEAD", &repo_root) {
            debug!(error = %e, "remote pull failed");
        }
    }

    /// Checks whether the parent process that spawned this daemon is still
    /// alive. PPID 0 or 1 means "no parent to track" (e.g. reparented to
    /// init after an orphan), in which case liveness is not checked.
    fn parent_is_gone(&self) -> bool {
        let Some(pid) = self.parent_pid else { return false };
        if pid == 0 || pid == 1 {
            return false;
        }
        #[cfg(unix)]
        {
            let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
            result != 0
        }
        #[cfg(not(unix))]
        {
            false
        }
    }
}

fn export_debouncer_trigger(debouncer: &Debouncer) {
    debouncer.trigger();
}

fn import_debouncer_trigger(debouncer: &Debouncer) {
    debouncer.trigger();
}

fn run_export(ctx: &WorkspaceContext) {
    match beads_sync::export(ctx.store.as_ref(), &ctx.journal_path, ctx.repo.as_deref()) {
        Ok(outcome) => debug!(?outcome, "journal export completed"),
        Err(e) => warn!(error = %e, "journal export failed"),
    }
}

fn run_import(ctx: &WorkspaceContext) {
    match beads_sync::import(ctx.store.as_ref(), &ctx.journal_path, ctx.repo.as_deref(), false) {
        Ok(outcome) => debug!(?outcome, "journal import completed"),
        Err(e) => warn!(error = %e, "journal import failed"),
    }
}
