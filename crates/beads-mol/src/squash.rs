//! Squash (§4.8.7): collapse a molecule's ephemeral children into a single
//! closed digest issue.

use beads_core::enums::{IssueType, Status};
use beads_core::idgen::generate_hash_id;
use beads_core::issue::{id_prefix, IssueBuilder};
use beads_storage::Storage;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::subgraph::Subgraph;

/// Options for a squash run.
pub struct SquashOptions {
    /// Delete the ephemeral children after digesting them. When `false`,
    /// the children are left in place and only the digest is created.
    pub delete_children: bool,
    /// An agent-supplied summary; when absent, an auto-generated one is
    /// built from the children's titles, close reasons, and counts.
    pub summary: Option<String>,
    pub base_prefix: String,
    pub actor: String,
}

/// Outcome of a squash.
#[derive(Debug, Clone)]
pub struct SquashOutcome {
    pub digest_id: String,
    pub deleted_ids: Vec<String>,
}

/// Squashes `subgraph`'s ephemeral, non-root children into a single closed
/// digest issue.
///
/// Runs the child deletion (if requested) and digest creation under a
/// single transaction: either both happen or neither does.
pub fn squash(store: &dyn Storage, subgraph: &Subgraph, opts: &SquashOptions, now: DateTime<Utc>) -> Result<SquashOutcome> {
    let children: Vec<_> = subgraph
        .order
        .iter()
        .filter(|id| *id != &subgraph.root)
        .filter_map(|id| subgraph.issues.get(id))
        .filter(|issue| issue.ephemeral)
        .collect();

    let summary = opts.summary.clone().unwrap_or_else(|| auto_summary(&children));

    let prefix = format!("{}-{}", opts.base_prefix, id_prefix::MOL);
    let root_title = subgraph
        .issues
        .get(&subgraph.root)
        .map(|i| i.title.as_str())
        .unwrap_or("molecule");
    let digest_title = format!("Digest: {root_title}");
    let digest_id = generate_hash_id(&prefix, &digest_title, &summary, &opts.actor, now, 6, 0);

    let digest = IssueBuilder::new(digest_title)
        .id(digest_id.clone())
        .description(summary)
        .status(Status::Closed)
        .issue_type(IssueType::Chore)
        .created_by(&opts.actor)
        .closed_at(now)
        .close_reason("squashed")
        .build();

    let child_ids: Vec<String> = children.iter().map(|i| i.id.clone()).collect();
    let delete_children = opts.delete_children;
    let actor = opts.actor.clone();
    let ids_for_delete = child_ids.clone();
    store.run_in_transaction(&move |tx| {
        tx.create_issue(&digest, &actor)?;
        if delete_children {
            for id in &ids_for_delete {
                tx.remove_all_dependencies_for(id, &actor)?;
                tx.delete_issue(id)?;
            }
        }
        Ok(())
    })?;

    Ok(SquashOutcome {
        digest_id,
        deleted_ids: if opts.delete_children { child_ids } else { Vec::new() },
    })
}

/// Builds an auto-generated summary from titles, close reasons, and counts.
fn auto_summary(children: &[&beads_core::issue::Issue]) -> String {
    if children.is_empty() {
        return "No ephemeral steps to summarize.".to_string();
    }
    let closed = children.iter().filter(|i| i.status == Status::Closed).count();
    let mut lines = vec![format!("{} of {} steps closed.", closed, children.len())];
    for issue in children {
        if issue.close_reason.is_empty() {
            lines.push(format!("- {}", issue.title));
        } else {
            lines.push(format!("- {} ({})", issue.title, issue.close_reason));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subgraph::TEMPLATE_LABEL;
    use beads_storage::SqliteStore;
    use std::collections::HashMap;

    fn subgraph_with_children(store: &SqliteStore) -> Subgraph {
        let root = IssueBuilder::new("Root").id("mol-1").build();
        store.create_issue(&root, "test").unwrap();
        store.add_label("mol-1", TEMPLATE_LABEL, "test").unwrap();

        let mut child_a = IssueBuilder::new("Step A").id("mol-1.a").ephemeral(true).build();
        child_a.status = Status::Closed;
        child_a.close_reason = "done".to_string();
        store.create_issue(&child_a, "test").unwrap();

        let mut child_b = IssueBuilder::new("Step B").id("mol-1.b").ephemeral(true).build();
        child_b.status = Status::Closed;
        store.create_issue(&child_b, "test").unwrap();

        let mut issues = HashMap::new();
        issues.insert("mol-1".to_string(), store.get_issue("mol-1").unwrap());
        issues.insert("mol-1.a".to_string(), store.get_issue("mol-1.a").unwrap());
        issues.insert("mol-1.b".to_string(), store.get_issue("mol-1.b").unwrap());

        Subgraph {
            root: "mol-1".to_string(),
            order: vec!["mol-1".to_string(), "mol-1.a".to_string(), "mol-1.b".to_string()],
            issues,
            edges: Vec::new(),
        }
    }

    #[test]
    fn squash_deletes_children_and_creates_closed_digest() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sub = subgraph_with_children(&store);
        let opts = SquashOptions {
            delete_children: true,
            summary: None,
            base_prefix: "bd".into(),
            actor: "alice".into(),
        };
        let outcome = squash(&store, &sub, &opts, Utc::now()).unwrap();

        assert_eq!(outcome.deleted_ids.len(), 2);
        assert!(store.get_issue("mol-1.a").is_err());
        assert!(store.get_issue("mol-1.b").is_err());

        let digest = store.get_issue(&outcome.digest_id).unwrap();
        assert_eq!(digest.status, Status::Closed);
        assert!(!digest.ephemeral);
        assert!(digest.description.contains("2 of 2 steps closed"));
    }

    #[test]
    fn squash_keeps_children_when_not_deleting() {
        let store = SqliteStore::open_in_memory().unwrap();
        let sub = subgraph_with_children(&store);
        let opts = SquashOptions {
            delete_children: false,
            summary: Some("custom summary".to_string()),
            base_prefix: "bd".into(),
            actor: "alice".into(),
        };
        let outcome = squash(&store, &sub, &opts, Utc::now()).unwrap();

        assert!(outcome.deleted_ids.is_empty());
        assert!(store.get_issue("mol-1.a").is_ok());
        let digest = store.get_issue(&outcome.digest_id).unwrap();
        assert_eq!(digest.description, "custom summary");
    }
}
