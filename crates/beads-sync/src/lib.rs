//! Journal/store reconciliation: integrity validation, export, import,
//! staleness detection, and the tombstone protocol.
//!
//! This crate sits above [`beads_storage`] and [`beads_core`]: it never
//! touches SQL directly, only the [`beads_storage::Storage`] /
//! [`beads_storage::TombstoneCapable`] trait surface, so it works against
//! any backend that implements them.

pub mod error;
pub mod export;
pub mod import;
pub mod integrity;
pub mod repo_key;
pub mod staleness;
pub mod tombstone;

pub use error::{Result, SyncError};
pub use export::{export, ExportOutcome};
pub use import::{check_uncommitted_after_import, import, ImportOutcome};
pub use integrity::{validate_integrity, IntegrityState};
pub use repo_key::sanitize_repo_key;
pub use staleness::{check_staleness, Staleness};
pub use tombstone::{
    batch_delete, prune, prune_from_journal, single_delete, DeleteFlags, DeleteOutcome, PruneMode,
};
