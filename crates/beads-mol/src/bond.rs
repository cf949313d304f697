//! Polymorphic bonding (§4.8.5): combining two operands -- proto, molecule,
//! or formula -- into a compound.

use std::collections::HashMap;

use beads_core::dependency::Dependency;
use beads_core::entity::{bond_type, BondRef};
use beads_core::enums::DependencyType;
use beads_core::idgen::generate_hash_id;
use beads_core::issue::{id_prefix, IssueBuilder};
use beads_formula::types::Formula;
use beads_storage::Storage;
use chrono::{DateTime, Utc};

use crate::error::{MolError, Result};
use crate::instantiate::{instantiate, InstantiateOptions};
use crate::subgraph::{load_template_subgraph, TEMPLATE_LABEL};
use crate::vars::VarSpec;

/// One side of a bond: a closed, exhaustively-matched tagged set (Design
/// Notes §9) rather than an open trait object.
pub enum BondOperand {
    /// An issue-sourced proto, identified by its root ID.
    Proto(String),
    /// An already-instantiated molecule, identified by its root ID.
    Molecule(String),
    /// A file-based formula, cooked in-memory into a proto before bonding.
    Formula(Formula),
}

/// Options shared by every bond call.
pub struct BondOptions {
    pub vars: HashMap<String, String>,
    pub var_specs: HashMap<String, VarSpec>,
    /// `None` ⇒ follow the target's ephemerality; `Some(true)` ⇒
    /// `--ephemeral`; `Some(false)` ⇒ `--pour`.
    pub ephemeral: Option<bool>,
    /// When bonding a proto/formula onto a standing molecule, the spawned
    /// side's new root ID becomes `<molecule_root>.<substituted child_ref>`
    /// instead of a fresh hash ID (spec §4.8.4 point 3).
    pub child_ref_template: Option<String>,
    pub base_prefix: String,
    pub actor: String,
}

/// Outcome of a bond: the new (or reused) root ID standing in for each side.
#[derive(Debug, Clone)]
pub struct BondOutcome {
    pub a_root: String,
    pub b_root: String,
}

/// Resolves `--ephemeral`/`--pour` against a target's current ephemerality.
/// The two flags are mutually exclusive (spec §7 Conflict).
pub fn resolve_ephemeral_flag(
    ephemeral_flag: bool,
    pour_flag: bool,
    target_ephemeral: bool,
) -> Result<bool> {
    match (ephemeral_flag, pour_flag) {
        (true, true) => Err(MolError::ConflictingEphemeralFlags),
        (true, false) => Ok(true),
        (false, true) => Ok(false),
        (false, false) => Ok(target_ephemeral),
    }
}

fn dep_type_for_bond(bond_kind: &str) -> DependencyType {
    match bond_kind {
        bond_type::SEQUENTIAL => DependencyType::Blocks,
        bond_type::CONDITIONAL => DependencyType::ConditionalBlocks,
        bond_type::PARALLEL => DependencyType::ParentChild,
        other => DependencyType::Custom(other.to_string()),
    }
}

/// Attaches `b_id` to `a_id` with the dependency type implied by
/// `bond_kind`. The schema admits at most one edge per (issue,
/// depends-on) pair, so a bond-type choice is exactly one edge.
fn attach(store: &dyn Storage, a_id: &str, b_id: &str, bond_kind: &str, actor: &str, now: DateTime<Utc>) -> Result<()> {
    let dep = Dependency {
        issue_id: b_id.to_string(),
        depends_on_id: a_id.to_string(),
        dep_type: dep_type_for_bond(bond_kind),
        created_at: now,
        created_by: actor.to_string(),
        metadata: String::new(),
        thread_id: String::new(),
    };
    store.add_dependency(&dep, actor)?;
    Ok(())
}

/// Materializes a formula into the store as a freshly-created, tagged
/// proto: one issue per [`beads_formula::types::CookedStep`], wired by
/// `needs` as blocking edges. Returns the new root's ID (the first
/// surviving step after conditions are applied).
fn materialize_formula(
    store: &dyn Storage,
    formula: &Formula,
    vars: &HashMap<String, String>,
    base_prefix: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let cooked = beads_formula::engine::cook(formula, vars)?;
    if cooked.is_empty() {
        return Err(MolError::MissingVariable(format!(
            "formula {} produced no steps",
            formula.formula
        )));
    }

    let prefix = format!("{}-{}", base_prefix, id_prefix::MOL);
    let mut id_map = HashMap::new();
    for step in &cooked {
        let new_id = generate_hash_id(&prefix, &step.title, &step.description, actor, now, 6, id_map.len() as i32);
        id_map.insert(step.id.clone(), new_id);
    }

    let mut issues = Vec::with_capacity(cooked.len());
    for step in &cooked {
        let new_id = id_map[&step.id].clone();
        let mut issue = IssueBuilder::new(step.title.clone())
            .id(new_id)
            .description(step.description.clone())
            .priority(step.priority)
            .issue_type(step.issue_type.as_str().into())
            .created_by(actor)
            .labels(step.labels.clone())
            .is_template(true)
            .build();
        if let Some(assignee) = &step.assignee {
            issue.assignee = assignee.clone();
        }
        issues.push(issue);
    }

    let mut edges = Vec::new();
    for step in &cooked {
        for need in &step.needs {
            let Some(dep_on) = id_map.get(need) else {
                continue;
            };
            edges.push(Dependency {
                issue_id: id_map[&step.id].clone(),
                depends_on_id: dep_on.clone(),
                dep_type: DependencyType::Blocks,
                created_at: now,
                created_by: actor.to_string(),
                metadata: String::new(),
                thread_id: String::new(),
            });
        }
    }

    let root_id = id_map[&cooked[0].id].clone();
    let root_id_for_label = root_id.clone();
    let actor_owned = actor.to_string();
    store.run_in_transaction(&move |tx| {
        for issue in &issues {
            tx.create_issue(issue, &actor_owned)?;
        }
        for edge in &edges {
            tx.add_dependency(edge, &actor_owned)?;
        }
        Ok(())
    })?;
    store.add_label(&root_id_for_label, TEMPLATE_LABEL, actor)?;

    Ok(root_id)
}

/// Resolves an operand to a concrete root ID usable in an `attach` call,
/// instantiating protos/formulas along the way when the operand is not
/// already a standing molecule.
fn resolve_operand(
    store: &dyn Storage,
    operand: BondOperand,
    opts: &BondOptions,
    target_ephemeral: bool,
    parent_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<String> {
    // The spawned side's ephemeral phase follows the target by default;
    // `opts.ephemeral` carries the caller's `--ephemeral`/`--pour` override,
    // resolved by `resolve_ephemeral_flag` before the bond call (spec §4.8.5).
    let ephemeral = opts.ephemeral.unwrap_or(target_ephemeral);
    match operand {
        BondOperand::Molecule(id) => Ok(id),
        BondOperand::Proto(id) => {
            let subgraph = load_template_subgraph(store, &id)?;
            let inst_opts = InstantiateOptions {
                vars: opts.vars.clone(),
                var_specs: opts.var_specs.clone(),
                ephemeral,
                parent_id: parent_id.map(|s| s.to_string()),
                child_ref_template: opts.child_ref_template.clone(),
                base_prefix: opts.base_prefix.clone(),
                actor: opts.actor.clone(),
            };
            let outcome = instantiate(store, &subgraph, &inst_opts, now)?;
            Ok(outcome.root_id)
        }
        BondOperand::Formula(formula) => {
            let root_id = materialize_formula(
                store,
                &formula,
                &opts.vars,
                &opts.base_prefix,
                &opts.actor,
                now,
            )?;
            let subgraph = load_template_subgraph(store, &root_id)?;
            let inst_opts = InstantiateOptions {
                vars: opts.vars.clone(),
                var_specs: opts.var_specs.clone(),
                ephemeral,
                parent_id: parent_id.map(|s| s.to_string()),
                child_ref_template: opts.child_ref_template.clone(),
                base_prefix: opts.base_prefix.clone(),
                actor: opts.actor.clone(),
            };
            let outcome = instantiate(store, &subgraph, &inst_opts, now)?;
            Ok(outcome.root_id)
        }
    }
}

/// Bonds two proto operands: creates a new compound-proto root tagged
/// `template`, parent-child edges from it to each operand root, and (for
/// sequential/conditional bonds) a blocking edge from B's root to A's root.
pub fn bond_proto_proto(
    store: &dyn Storage,
    a_root: &str,
    b_root: &str,
    bond_kind: &str,
    base_prefix: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let prefix = format!("{}-{}", base_prefix, id_prefix::MOL);
    let new_root = generate_hash_id(&prefix, "Compound", "", actor, now, 6, 0);
    let mut compound = IssueBuilder::new(format!("Compound of {} + {}", a_root, b_root))
        .id(new_root.clone())
        .created_by(actor)
        .is_template(true)
        .build();
    compound.bonded_from = vec![
        BondRef {
            source_id: a_root.to_string(),
            bond_type: bond_kind.to_string(),
            bond_point: String::new(),
        },
        BondRef {
            source_id: b_root.to_string(),
            bond_type: bond_kind.to_string(),
            bond_point: new_root.clone(),
        },
    ];

    let parent_edges = vec![
        Dependency {
            issue_id: a_root.to_string(),
            depends_on_id: new_root.clone(),
            dep_type: DependencyType::ParentChild,
            created_at: now,
            created_by: actor.to_string(),
            metadata: String::new(),
            thread_id: String::new(),
        },
        Dependency {
            issue_id: b_root.to_string(),
            depends_on_id: new_root.clone(),
            dep_type: DependencyType::ParentChild,
            created_at: now,
            created_by: actor.to_string(),
            metadata: String::new(),
            thread_id: String::new(),
        },
    ];

    let new_root_for_tx = new_root.clone();
    let actor_owned = actor.to_string();
    store.run_in_transaction(&move |tx| {
        tx.create_issue(&compound, &actor_owned)?;
        for edge in &parent_edges {
            tx.add_dependency(edge, &actor_owned)?;
        }
        Ok(())
    })?;
    store.add_label(&new_root_for_tx, TEMPLATE_LABEL, actor)?;

    if bond_kind == bond_type::SEQUENTIAL || bond_kind == bond_type::CONDITIONAL {
        attach(store, a_root, b_root, bond_kind, actor, now)?;
    }

    Ok(new_root)
}

/// Bonds a proto (or formula, cooked first) to a standing molecule, or two
/// standing molecules directly. Returns the root ID that now represents
/// the newly-attached side (the molecule side is unchanged).
pub fn bond_to_molecule(
    store: &dyn Storage,
    spawned: BondOperand,
    molecule_root: &str,
    bond_kind: &str,
    opts: &BondOptions,
    now: DateTime<Utc>,
) -> Result<BondOutcome> {
    let target = store.get_issue(molecule_root)?;
    let parent_id = opts.child_ref_template.as_ref().map(|_| molecule_root);
    let spawned_root = resolve_operand(store, spawned, opts, target.ephemeral, parent_id, now)?;
    attach(store, molecule_root, &spawned_root, bond_kind, &opts.actor, now)?;
    Ok(BondOutcome {
        a_root: molecule_root.to_string(),
        b_root: spawned_root,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_core::issue::IssueBuilder;
    use beads_storage::SqliteStore;

    #[test]
    fn proto_bonded_to_molecule_uses_child_ref_and_blocks_edge() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_issue(&IssueBuilder::new("Patrol").id("patrol").build(), "test")
            .unwrap();
        store
            .create_issue(
                &IssueBuilder::new("Arm {{name}}").id("mol-arm").build(),
                "test",
            )
            .unwrap();
        store.add_label("mol-arm", TEMPLATE_LABEL, "test").unwrap();

        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "ace".to_string());
        let opts = BondOptions {
            vars,
            var_specs: HashMap::new(),
            ephemeral: None,
            child_ref_template: Some("arm-{{name}}".to_string()),
            base_prefix: "bd".into(),
            actor: "alice".into(),
        };

        let outcome = bond_to_molecule(
            &store,
            BondOperand::Proto("mol-arm".into()),
            "patrol",
            bond_type::SEQUENTIAL,
            &opts,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(outcome.b_root, "patrol.arm-ace");
        let deps = store.get_dependencies_with_metadata("patrol.arm-ace").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].dependency.dep_type, DependencyType::Blocks);
        assert_eq!(deps[0].dependency.depends_on_id, "patrol");
    }

    #[test]
    fn molecule_plus_molecule_attaches_without_instantiation() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_issue(&IssueBuilder::new("A").id("mol-a").build(), "test")
            .unwrap();
        store
            .create_issue(&IssueBuilder::new("B").id("mol-b").build(), "test")
            .unwrap();

        let opts = BondOptions {
            vars: HashMap::new(),
            var_specs: HashMap::new(),
            ephemeral: None,
            child_ref_template: None,
            base_prefix: "bd".into(),
            actor: "alice".into(),
        };
        let outcome = bond_to_molecule(
            &store,
            BondOperand::Molecule("mol-b".into()),
            "mol-a",
            bond_type::SEQUENTIAL,
            &opts,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(outcome.b_root, "mol-b");

        let deps = store.get_dependencies_with_metadata("mol-b").unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].dependency.dep_type, DependencyType::Blocks);
        assert_eq!(deps[0].dependency.depends_on_id, "mol-a");
    }

    #[test]
    fn ephemeral_and_pour_flags_conflict() {
        let err = resolve_ephemeral_flag(true, true, false).unwrap_err();
        assert!(matches!(err, MolError::ConflictingEphemeralFlags));
    }

    #[test]
    fn ephemeral_flag_defaults_to_target() {
        assert!(resolve_ephemeral_flag(false, false, true).unwrap());
        assert!(!resolve_ephemeral_flag(false, false, false).unwrap());
    }
}
