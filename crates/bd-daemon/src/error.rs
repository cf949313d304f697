//! Error types for the daemon event loop, RPC surface, and watcher.

use beads_storage::StorageError;
use beads_sync::SyncError;

/// Errors that can occur while the daemon is running.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Another daemon already holds the workspace lock.
    #[error("workspace already owned by another daemon: {0}")]
    AlreadyRunning(#[from] beads_lockfile::LockError),

    /// The RPC socket could not be bound.
    #[error("failed to bind RPC socket at {path}: {source}")]
    SocketBind {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A framed RPC request/response could not be read or written.
    #[error("RPC framing error: {0}")]
    Framing(String),

    /// The underlying sync engine reported an error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// The underlying store reported an error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;
