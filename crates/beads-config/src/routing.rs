//! Cross-workspace routing: resolves an issue ID to the workspace that
//! owns it, via an optional `routes.jsonl` prefix map (spec §4.9, §6).
//!
//! A workspace with no `routes.jsonl` only ever resolves locally. One that
//! has it can satisfy a lookup for `other-123` by opening `other`'s store
//! read-only rather than failing with `NotFound`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from loading or resolving the routes table.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("failed to read routes file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single prefix -> workspace-directory mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    /// The ID prefix this route owns (the part before the first `-`).
    pub prefix: String,
    /// Path to the `.beads/` directory (or a directory containing it) that
    /// owns issues with this prefix.
    pub path: PathBuf,
}

/// The parsed contents of `routes.jsonl`: a read-mostly prefix map,
/// re-read on demand by callers rather than cached across calls (spec §5).
#[derive(Debug, Clone, Default)]
pub struct RoutesTable {
    entries: Vec<RouteEntry>,
}

/// Where an issue ID resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// The ID belongs to the local workspace.
    Local,
    /// The ID belongs to another workspace at this `.beads/` directory.
    Remote(PathBuf),
}

const ROUTES_FILE_NAME: &str = "routes.jsonl";

impl RoutesTable {
    /// Loads `routes.jsonl` from a `.beads/` directory. A missing file is
    /// not an error -- it just means no routes are configured.
    pub fn load(beads_dir: &Path) -> Result<Self, RoutingError> {
        let path = beads_dir.join(ROUTES_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| RoutingError::Read {
            path: path.clone(),
            source,
        })?;

        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_str::<RouteEntry>(line).ok())
            .collect();

        Ok(Self { entries })
    }

    /// Returns every configured route.
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Resolves `id` against this table given the workspace's own prefix.
    ///
    /// An ID whose prefix matches `local_prefix`, or that matches no
    /// configured route, resolves [`RouteDecision::Local`] (the caller
    /// then reports its own `NotFound` if the ID truly doesn't exist).
    pub fn resolve(&self, id: &str, local_prefix: &str) -> RouteDecision {
        let prefix = issue_prefix(id);
        if prefix == local_prefix {
            return RouteDecision::Local;
        }
        match self.entries.iter().find(|e| e.prefix == prefix) {
            Some(entry) => RouteDecision::Remote(entry.path.clone()),
            None => RouteDecision::Local,
        }
    }
}

/// Extracts the prefix (everything before the first `-`) from an issue ID.
/// An ID with no `-` is its own prefix.
pub fn issue_prefix(id: &str) -> &str {
    id.split_once('-').map(|(p, _)| p).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_routes_file_is_empty() {
        let dir = tempdir().unwrap();
        let table = RoutesTable::load(dir.path()).unwrap();
        assert!(table.entries().is_empty());
    }

    #[test]
    fn loads_jsonl_entries() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("routes.jsonl"),
            "{\"prefix\":\"other\",\"path\":\"/tmp/other/.beads\"}\n",
        )
        .unwrap();
        let table = RoutesTable::load(dir.path()).unwrap();
        assert_eq!(table.entries().len(), 1);
        assert_eq!(table.entries()[0].prefix, "other");
    }

    #[test]
    fn resolves_local_prefix() {
        let table = RoutesTable::default();
        assert_eq!(table.resolve("bd-123", "bd"), RouteDecision::Local);
    }

    #[test]
    fn resolves_remote_prefix() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("routes.jsonl"),
            "{\"prefix\":\"other\",\"path\":\"/ws/other/.beads\"}\n",
        )
        .unwrap();
        let table = RoutesTable::load(dir.path()).unwrap();
        assert_eq!(
            table.resolve("other-42", "bd"),
            RouteDecision::Remote(PathBuf::from("/ws/other/.beads"))
        );
    }

    #[test]
    fn unknown_prefix_falls_back_to_local() {
        let table = RoutesTable::default();
        assert_eq!(table.resolve("ghost-1", "bd"), RouteDecision::Local);
    }

    #[test]
    fn issue_prefix_splits_on_first_dash() {
        assert_eq!(issue_prefix("bd-abc-123"), "bd");
        assert_eq!(issue_prefix("noprefix"), "noprefix");
    }
}
