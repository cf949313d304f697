//! Instantiation: `pour` (persistent) and `wisp` (ephemeral) (§4.8.4).

use std::collections::HashMap;

use beads_core::dependency::Dependency;
use beads_core::idgen::generate_hash_id;
use beads_core::issue::id_prefix;
use chrono::{DateTime, Utc};

use beads_storage::Storage;

use crate::error::{MolError, Result};
use crate::subgraph::Subgraph;
use crate::vars::{extract_all_variables, resolve_variables, substitute, VarSpec};

/// Caller-supplied knobs for one instantiation run.
pub struct InstantiateOptions {
    /// Variable values supplied on the command line / RPC call.
    pub vars: HashMap<String, String>,
    /// Declared variable specs (required / default), if the template
    /// carries them (a formula-sourced proto does; an issue-sourced one
    /// may not, in which case every placeholder is optional).
    pub var_specs: HashMap<String, VarSpec>,
    /// `true` for `wisp` (ephemeral), `false` for `pour` (persistent).
    pub ephemeral: bool,
    /// If set together with `child_ref_template`, the new root's ID
    /// becomes `<parent_id>.<substituted child_ref>` instead of a fresh
    /// hash ID.
    pub parent_id: Option<String>,
    pub child_ref_template: Option<String>,
    /// The workspace's configured ID prefix (e.g. `"bd"`); combined with
    /// `mol`/`wisp` to form the generated root ID's prefix.
    pub base_prefix: String,
    pub actor: String,
}

/// Result of a successful instantiation.
#[derive(Debug, Clone)]
pub struct InstantiateOutcome {
    /// The new root issue's ID.
    pub root_id: String,
    /// Every new issue ID created, in the same order as the source
    /// subgraph's breadth-first traversal.
    pub created_ids: Vec<String>,
}

/// Instantiates `subgraph` into `store`, returning the new root ID and the
/// full set of created IDs.
pub fn instantiate(
    store: &dyn Storage,
    subgraph: &Subgraph,
    opts: &InstantiateOptions,
    now: DateTime<Utc>,
) -> Result<InstantiateOutcome> {
    let names = extract_all_variables(subgraph);
    let vars = resolve_variables(&names, &opts.var_specs, &opts.vars)?;

    let new_root_id = match (&opts.parent_id, &opts.child_ref_template) {
        (Some(parent_id), Some(child_ref)) => {
            let substituted = substitute(child_ref, &vars);
            if substituted.is_empty() || substituted.contains('/') || substituted.contains('\\') {
                return Err(MolError::InvalidChildRef(substituted));
            }
            format!("{}.{}", parent_id, substituted)
        }
        _ => {
            let root_title = subgraph
                .issues
                .get(&subgraph.root)
                .map(|i| substitute(&i.title, &vars))
                .unwrap_or_default();
            let prefix_segment = if opts.ephemeral {
                id_prefix::WISP
            } else {
                id_prefix::MOL
            };
            let prefix = format!("{}-{}", opts.base_prefix, prefix_segment);
            generate_hash_id(&prefix, &root_title, "", &opts.actor, now, 6, 0)
        }
    };

    let old_root = subgraph.root.clone();
    let mut id_map: HashMap<String, String> = HashMap::new();
    id_map.insert(old_root.clone(), new_root_id.clone());
    let old_root_dot = format!("{}.", old_root);
    for old_id in &subgraph.order {
        if old_id == &old_root {
            continue;
        }
        let relative = old_id.strip_prefix(&old_root_dot).unwrap_or(old_id.as_str());
        id_map.insert(old_id.clone(), format!("{}.{}", new_root_id, relative));
    }

    let title_override = vars.get("title").cloned();
    let desc_override = vars.get("desc").cloned();

    let mut cloned_issues = Vec::with_capacity(subgraph.order.len());
    for old_id in &subgraph.order {
        let source = subgraph
            .issues
            .get(old_id)
            .expect("subgraph.order only lists ids present in subgraph.issues");
        let mut issue = source.clone();
        issue.id = id_map[old_id].clone();
        issue.title = substitute(&source.title, &vars);
        issue.description = substitute(&source.description, &vars);
        issue.design = substitute(&source.design, &vars);
        issue.acceptance_criteria = substitute(&source.acceptance_criteria, &vars);
        issue.notes = substitute(&source.notes, &vars);
        issue.ephemeral = opts.ephemeral;
        issue.is_template = false;
        issue.created_by = opts.actor.clone();
        issue.created_at = now;
        issue.updated_at = now;

        if old_id == &old_root {
            if let Some(title) = &title_override {
                issue.title = title.clone();
            }
            if let Some(desc) = &desc_override {
                issue.description = desc.clone();
            }
        }

        cloned_issues.push(issue);
    }

    let mut cloned_edges = Vec::with_capacity(subgraph.edges.len());
    for edge in &subgraph.edges {
        let Some(new_issue_id) = id_map.get(&edge.issue_id) else {
            continue;
        };
        let Some(new_depends_on_id) = id_map.get(&edge.depends_on_id) else {
            continue;
        };
        cloned_edges.push(Dependency {
            issue_id: new_issue_id.clone(),
            depends_on_id: new_depends_on_id.clone(),
            dep_type: edge.dep_type.clone(),
            created_at: now,
            created_by: opts.actor.clone(),
            metadata: edge.metadata.clone(),
            thread_id: edge.thread_id.clone(),
        });
    }

    let actor = opts.actor.clone();
    store.run_in_transaction(&move |tx| {
        for issue in &cloned_issues {
            tx.create_issue(issue, &actor)?;
        }
        for edge in &cloned_edges {
            tx.add_dependency(edge, &actor)?;
        }
        Ok(())
    })?;

    Ok(InstantiateOutcome {
        root_id: new_root_id,
        created_ids: subgraph.order.iter().map(|id| id_map[id].clone()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subgraph::{load_template_subgraph, TEMPLATE_LABEL};
    use beads_core::dependency::Dependency;
    use beads_core::enums::DependencyType;
    use beads_core::issue::IssueBuilder;
    use beads_storage::SqliteStore;

    fn build_template(store: &SqliteStore) {
        let root = IssueBuilder::new("Patrol {{name}}").id("tpl-1").build();
        store.create_issue(&root, "test").unwrap();
        store.add_label("tpl-1", TEMPLATE_LABEL, "test").unwrap();

        let child = IssueBuilder::new("Arm {{name}}").id("tpl-1.arm").build();
        store.create_issue(&child, "test").unwrap();
        store
            .add_dependency(
                &Dependency {
                    issue_id: "tpl-1.arm".into(),
                    depends_on_id: "tpl-1".into(),
                    dep_type: DependencyType::ParentChild,
                    created_at: Utc::now(),
                    created_by: "test".into(),
                    metadata: String::new(),
                    thread_id: String::new(),
                },
                "test",
            )
            .unwrap();
    }

    #[test]
    fn fails_before_any_write_when_required_var_missing() {
        let store = SqliteStore::open_in_memory().unwrap();
        build_template(&store);
        let sub = load_template_subgraph(&store, "tpl-1").unwrap();

        let mut specs = HashMap::new();
        specs.insert(
            "name".to_string(),
            VarSpec {
                required: true,
                default: None,
            },
        );
        let opts = InstantiateOptions {
            vars: HashMap::new(),
            var_specs: specs,
            ephemeral: true,
            parent_id: None,
            child_ref_template: None,
            base_prefix: "bd".into(),
            actor: "alice".into(),
        };

        let err = instantiate(&store, &sub, &opts, Utc::now()).unwrap_err();
        assert!(matches!(err, MolError::MissingVariable(_)));
        assert_eq!(store.list_all_issues().unwrap().len(), 2); // only the template issues
    }

    #[test]
    fn distinct_child_refs_produce_disjoint_subgraphs() {
        let store = SqliteStore::open_in_memory().unwrap();
        build_template(&store);
        let sub = load_template_subgraph(&store, "tpl-1").unwrap();

        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "ace".to_string());
        let opts1 = InstantiateOptions {
            vars: vars.clone(),
            var_specs: HashMap::new(),
            ephemeral: false,
            parent_id: Some("patrol".into()),
            child_ref_template: Some("arm-{{name}}".into()),
            base_prefix: "bd".into(),
            actor: "alice".into(),
        };
        let outcome1 = instantiate(&store, &sub, &opts1, Utc::now()).unwrap();
        assert_eq!(outcome1.root_id, "patrol.arm-ace");

        vars.insert("name".to_string(), "baker".to_string());
        let opts2 = InstantiateOptions {
            vars,
            var_specs: HashMap::new(),
            ephemeral: false,
            parent_id: Some("patrol".into()),
            child_ref_template: Some("arm-{{name}}".into()),
            base_prefix: "bd".into(),
            actor: "alice".into(),
        };
        let outcome2 = instantiate(&store, &sub, &opts2, Utc::now()).unwrap();
        assert_eq!(outcome2.root_id, "patrol.arm-baker");

        assert_ne!(outcome1.root_id, outcome2.root_id);
        assert!(store.get_issue("patrol.arm-ace").is_ok());
        assert!(store.get_issue("patrol.arm-baker").is_ok());
        assert!(store.get_issue("patrol.arm-ace.arm").is_ok());
        assert!(store.get_issue("patrol.arm-baker.arm").is_ok());
    }

    #[test]
    fn rejects_child_ref_with_path_separator() {
        let store = SqliteStore::open_in_memory().unwrap();
        build_template(&store);
        let sub = load_template_subgraph(&store, "tpl-1").unwrap();

        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "a/b".to_string());
        let opts = InstantiateOptions {
            vars,
            var_specs: HashMap::new(),
            ephemeral: false,
            parent_id: Some("patrol".into()),
            child_ref_template: Some("{{name}}".into()),
            base_prefix: "bd".into(),
            actor: "alice".into(),
        };
        let err = instantiate(&store, &sub, &opts, Utc::now()).unwrap_err();
        assert!(matches!(err, MolError::InvalidChildRef(_)));
    }
}
