//! Error types for the molecule workflow engine.

use beads_storage::StorageError;

/// Errors that can occur during template loading, instantiation, bonding,
/// or analysis of molecules.
#[derive(Debug, thiserror::Error)]
pub enum MolError {
    /// The referenced issue is not tagged `template` (not a proto).
    #[error("{0} is not a template (missing the `template` label)")]
    NotATemplate(String),

    /// A required template variable had no value and no default.
    #[error("missing required variable: {0}")]
    MissingVariable(String),

    /// A `child_ref` template substituted to an empty string or one
    /// containing a path separator.
    #[error("invalid child_ref {0:?}: must be non-empty and contain no path separators")]
    InvalidChildRef(String),

    /// Both `--ephemeral` and `--pour` were given; they are mutually
    /// exclusive ephemerality overrides.
    #[error("--ephemeral and --pour are mutually exclusive")]
    ConflictingEphemeralFlags,

    /// The underlying formula could not be cooked.
    #[error("formula error: {0}")]
    Formula(#[from] beads_formula::types::FormulaError),

    /// Underlying storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Underlying JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MolError>;
