//! The daemon's workspace context (Design Notes §9): the ambient mutable
//! state -- store handle, journal path, dirty-set access, repo key -- that
//! every component in the event loop shares, gathered into one value
//! obtained at daemon start rather than threaded individually through every
//! call.

use std::path::PathBuf;
use std::sync::Arc;

use beads_config::config::BeadsConfig;
use beads_storage::SqliteStore;

/// Shared, read-mostly state for one running daemon.
///
/// Cloning a `WorkspaceContext` is cheap (an `Arc` bump); every cooperating
/// component -- the event loop, the RPC handlers, the debounced export/import
/// actions -- holds a clone.
#[derive(Clone)]
pub struct WorkspaceContext {
    pub store: Arc<SqliteStore>,
    pub beads_dir: PathBuf,
    pub journal_path: PathBuf,
    pub repo: Option<String>,
    pub config: Arc<BeadsConfig>,
}

impl WorkspaceContext {
    pub fn new(
        store: SqliteStore,
        beads_dir: PathBuf,
        journal_path: PathBuf,
        repo: Option<String>,
        config: BeadsConfig,
    ) -> Self {
        Self {
            store: Arc::new(store),
            beads_dir,
            journal_path,
            repo,
            config: Arc::new(config),
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.beads_dir.join("bd.sock")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.beads_dir.join("bd.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.beads_dir.join("daemon.log")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.beads_dir.join("bd.daemon.lock")
    }
}
