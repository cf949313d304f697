//! The molecule workflow engine (spec §4.8): template subgraph loading,
//! variable substitution, instantiation (`pour`/`wisp`), polymorphic
//! bonding, parallel-group analysis, squash, and progress summaries.
//!
//! A **proto** is an issue tagged `template`; its children and dependency
//! edges, reached via parent-child edges, form a [`subgraph::Subgraph`]. A
//! **molecule** is an instantiated copy of one. A **compound** is a
//! molecule formed by bonding two operands together.

pub mod bond;
pub mod error;
pub mod instantiate;
pub mod parallel;
pub mod progress;
pub mod squash;
pub mod subgraph;
pub mod vars;

pub use bond::{bond_proto_proto, bond_to_molecule, resolve_ephemeral_flag, BondOperand, BondOptions, BondOutcome};
pub use error::{MolError, Result};
pub use instantiate::{instantiate, InstantiateOptions, InstantiateOutcome};
pub use parallel::{analyze, StepAnalysis};
pub use progress::{compute as compute_progress, Progress, SUMMARY_THRESHOLD};
pub use squash::{squash, SquashOptions, SquashOutcome};
pub use subgraph::{load_template_subgraph, Subgraph, TEMPLATE_LABEL};
pub use vars::{extract_all_variables, resolve_variables, substitute, VarSpec};
