//! Template subgraph loading (§4.8.2).
//!
//! Starting from a root proto, walk parent-child edges breadth-first and
//! collect every reachable issue plus the dependency edges among them.

use std::collections::{HashMap, HashSet, VecDeque};

use beads_core::dependency::Dependency;
use beads_core::enums::DependencyType;
use beads_core::issue::Issue;
use beads_storage::Storage;

use crate::error::{MolError, Result};

/// The reserved label that marks an issue as a proto (template root or
/// template member).
pub const TEMPLATE_LABEL: &str = "template";

/// A loaded template subgraph: every issue reachable from the root via
/// parent-child edges, plus every dependency edge that runs between two
/// members of that set.
#[derive(Debug, Clone)]
pub struct Subgraph {
    /// The root issue ID, as given by the caller.
    pub root: String,
    /// Issue IDs in breadth-first discovery order (root first).
    pub order: Vec<String>,
    /// All member issues, keyed by ID.
    pub issues: HashMap<String, Issue>,
    /// Dependency edges whose endpoints are both members of this subgraph.
    pub edges: Vec<Dependency>,
}

impl Subgraph {
    /// Returns the member issues in discovery order.
    pub fn ordered_issues(&self) -> Vec<&Issue> {
        self.order.iter().filter_map(|id| self.issues.get(id)).collect()
    }
}

/// Loads the template subgraph rooted at `root_id`.
///
/// Requires the root to carry the `template` label; children are
/// discovered by following `parent-child` edges in either direction (an
/// issue whose `depends_on_id` is a current frontier member via
/// `ParentChild` is a child; the traversal does not require the child
/// itself to be labeled `template` -- only the root is).
pub fn load_template_subgraph(store: &dyn Storage, root_id: &str) -> Result<Subgraph> {
    let root = store.get_issue(root_id)?;
    let root_labels = store.get_labels(root_id)?;
    if !root_labels.iter().any(|l| l == TEMPLATE_LABEL) {
        return Err(MolError::NotATemplate(root_id.to_string()));
    }

    let mut issues = HashMap::new();
    let mut order = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue = VecDeque::new();

    visited.insert(root_id.to_string());
    queue.push_back(root_id.to_string());
    issues.insert(root_id.to_string(), root);
    order.push(root_id.to_string());

    while let Some(current) = queue.pop_front() {
        let children = store.get_dependents_with_metadata(&current)?;
        for child in children {
            if child.dependency.dep_type != DependencyType::ParentChild {
                continue;
            }
            let child_id = child.issue.id.clone();
            if visited.insert(child_id.clone()) {
                queue.push_back(child_id.clone());
                order.push(child_id.clone());
                issues.insert(child_id, child.issue);
            }
        }
    }

    let mut edges = Vec::new();
    let mut seen_edges: HashSet<(String, String)> = HashSet::new();
    for id in &order {
        let deps = store.get_dependencies_with_metadata(id)?;
        for dep in deps {
            if !issues.contains_key(&dep.issue.id) {
                continue;
            }
            let key = (id.clone(), dep.issue.id.clone());
            if seen_edges.insert(key) {
                edges.push(dep.dependency);
            }
        }
    }

    Ok(Subgraph {
        root: root_id.to_string(),
        order,
        issues,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_core::dependency::Dependency;
    use beads_core::issue::IssueBuilder;
    use beads_storage::SqliteStore;
    use chrono::Utc;

    fn proto(store: &SqliteStore, id: &str, title: &str) {
        let issue = IssueBuilder::new(title).id(id).build();
        store.create_issue(&issue, "test").unwrap();
    }

    #[test]
    fn rejects_non_template_root() {
        let store = SqliteStore::open_in_memory().unwrap();
        proto(&store, "bd-1", "Root");
        let err = load_template_subgraph(&store, "bd-1").unwrap_err();
        assert!(matches!(err, MolError::NotATemplate(_)));
    }

    #[test]
    fn loads_linear_chain() {
        let store = SqliteStore::open_in_memory().unwrap();
        proto(&store, "bd-1", "Root");
        proto(&store, "bd-2", "Child");
        store.add_label("bd-1", TEMPLATE_LABEL, "test").unwrap();
        store
            .add_dependency(
                &Dependency {
                    issue_id: "bd-2".into(),
                    depends_on_id: "bd-1".into(),
                    dep_type: DependencyType::ParentChild,
                    created_at: Utc::now(),
                    created_by: "test".into(),
                    metadata: String::new(),
                    thread_id: String::new(),
                },
                "test",
            )
            .unwrap();

        let sub = load_template_subgraph(&store, "bd-1").unwrap();
        assert_eq!(sub.order, vec!["bd-1".to_string(), "bd-2".to_string()]);
    }
}
