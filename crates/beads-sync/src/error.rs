//! Error types for journal/store reconciliation.

use beads_storage::StorageError;

/// Errors that can occur during sync, integrity validation, or tombstoning.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The store and journal have both changed since the last sync and
    /// cannot be reconciled automatically.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The on-disk journal hash does not match the last-recorded hash,
    /// meaning it was modified outside of bd (manual edit, merge, etc.).
    #[error("journal integrity check failed: {reason}")]
    IntegrityViolation { reason: String },

    /// The store is stale relative to the journal and `--allow-stale`
    /// was not given.
    #[error("store is stale: {0}")]
    Stale(String),

    /// An operation required tombstone support but the backend doesn't
    /// implement it.
    #[error("backend does not support tombstoning")]
    TombstoneUnsupported,

    /// The referenced issue does not exist.
    #[error("issue not found: {0}")]
    IssueNotFound(String),

    /// Refusing to delete because dependents still reference this issue
    /// and `--cascade`/`--force` were not given.
    #[error("issue {id} has {count} dependent(s); use --cascade or --force")]
    HasDependents { id: String, count: usize },

    /// Underlying storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Underlying git error.
    #[error("git error: {0}")]
    Git(#[from] beads_git::commands::GitError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
