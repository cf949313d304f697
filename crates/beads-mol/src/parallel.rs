//! Parallel-group analysis (§4.8.6).
//!
//! For a molecule's steps: compute readiness, a cycle-tolerant blocking
//! depth, and union-find groupings of steps that share a depth band and
//! have no mutual blocking edge.

use std::collections::{HashMap, HashSet};

use beads_core::enums::Status;
use beads_core::issue::Issue;

use crate::subgraph::Subgraph;

/// Per-step analysis result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepAnalysis {
    pub id: String,
    pub ready: bool,
    pub depth: usize,
    /// Index of the parallel group this step belongs to, stable within one
    /// call to [`analyze`] but not meaningful across calls.
    pub group: usize,
}

/// Runs parallel-group analysis over every blocking-kind edge in
/// `subgraph`.
pub fn analyze(subgraph: &Subgraph) -> Vec<StepAnalysis> {
    let ids: Vec<&String> = subgraph.order.iter().collect();

    // blocked_by[x] = set of y such that x is blocked by y (y must close
    // first). Only blocking-kind edges count; parent-child and the rest
    // don't gate readiness.
    let mut blocked_by: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut blocks: HashMap<&str, HashSet<&str>> = HashMap::new();
    for id in &ids {
        blocked_by.entry(id.as_str()).or_default();
        blocks.entry(id.as_str()).or_default();
    }

    for edge in &subgraph.edges {
        if !is_blocking_kind(&edge.dep_type) {
            continue;
        }
        let Some(blocker) = subgraph.issues.get(&edge.depends_on_id) else {
            continue;
        };
        if is_satisfied(blocker, &edge.dep_type) {
            continue;
        }
        blocked_by
            .entry(edge.issue_id.as_str())
            .or_default()
            .insert(edge.depends_on_id.as_str());
        blocks
            .entry(edge.depends_on_id.as_str())
            .or_default()
            .insert(edge.issue_id.as_str());
    }

    let ready: HashMap<&str, bool> = ids
        .iter()
        .map(|id| {
            let issue = &subgraph.issues[id.as_str()];
            let status_ok = matches!(issue.status, Status::Open | Status::InProgress);
            let unblocked = blocked_by.get(id.as_str()).map(|s| s.is_empty()).unwrap_or(true);
            (id.as_str(), status_ok && unblocked)
        })
        .collect();

    let depth: HashMap<&str, usize> = ids
        .iter()
        .map(|id| (id.as_str(), compute_depth(id, &blocked_by)))
        .collect();

    let groups = group_by_depth_and_independence(&ids, &depth, &blocks);

    ids.iter()
        .map(|id| StepAnalysis {
            id: id.to_string(),
            ready: ready[id.as_str()],
            depth: depth[id.as_str()],
            group: groups[id.as_str()],
        })
        .collect()
}

/// Edges that gate parallel readiness within a molecule. Structural
/// `parent-child` edges (and `waits-for`, a softer ordering hint) don't
/// count here even though they gate the workspace-wide ready-work query --
/// a template's two arms hanging off a shared root aren't blocked by that
/// root just because it hasn't closed yet.
fn is_blocking_kind(dep_type: &beads_core::enums::DependencyType) -> bool {
    use beads_core::enums::DependencyType;
    matches!(dep_type, DependencyType::Blocks | DependencyType::ConditionalBlocks)
}

/// A blocking-kind edge whose target is closed counts as satisfied; for
/// conditional-blocks, it's satisfied only when the target closed via a
/// recognized failure reason (the engine's documented resolution of the
/// open question about the failure predicate).
fn is_satisfied(blocker: &Issue, dep_type: &beads_core::enums::DependencyType) -> bool {
    use beads_core::dependency::is_failure_close;
    use beads_core::enums::DependencyType;

    if blocker.status != Status::Closed {
        return false;
    }
    match dep_type {
        DependencyType::ConditionalBlocks => is_failure_close(&blocker.close_reason),
        _ => true,
    }
}

/// Cycle-tolerant depth: the longest chain of unsatisfied blockers leading
/// to `id`. A step that sits on a cycle through its own blockers gets depth
/// 0 rather than an arbitrary partial count -- `None` propagates that
/// signal back up the traversal once the original `id` is revisited.
fn compute_depth(id: &str, blocked_by: &HashMap<&str, HashSet<&str>>) -> usize {
    fn dfs<'a>(
        original: &'a str,
        current: &'a str,
        blocked_by: &HashMap<&'a str, HashSet<&'a str>>,
        visiting: &mut HashSet<&'a str>,
    ) -> Option<usize> {
        if current == original && !visiting.is_empty() {
            return None; // revisited the step we're computing depth for
        }
        if !visiting.insert(current) {
            return Some(0); // revisited some other step; don't loop further
        }
        let mut max_depth = 0;
        let mut on_cycle = false;
        if let Some(blockers) = blocked_by.get(current) {
            for b in blockers {
                match dfs(original, b, blocked_by, visiting) {
                    Some(d) => max_depth = max_depth.max(d + 1),
                    None => on_cycle = true,
                }
            }
        }
        visiting.remove(current);
        if on_cycle {
            None
        } else {
            Some(max_depth)
        }
    }
    let mut visiting = HashSet::new();
    dfs(id, id, blocked_by, &mut visiting).unwrap_or(0)
}

/// Union-finds steps within the same depth band that have no mutual
/// blocking edge, producing a group index per step ID.
fn group_by_depth_and_independence<'a>(
    ids: &[&'a String],
    depth: &HashMap<&'a str, usize>,
    blocks: &HashMap<&'a str, HashSet<&'a str>>,
) -> HashMap<&'a str, usize> {
    let index: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
    let mut parent: Vec<usize> = (0..ids.len()).collect();

    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    fn union(parent: &mut [usize], a: usize, b: usize) {
        let ra = find(parent, a);
        let rb = find(parent, b);
        if ra != rb {
            parent[ra] = rb;
        }
    }

    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            let a = ids[i].as_str();
            let b = ids[j].as_str();
            if depth[a] != depth[b] {
                continue;
            }
            let mutually_independent = !blocks.get(a).map(|s| s.contains(b)).unwrap_or(false)
                && !blocks.get(b).map(|s| s.contains(a)).unwrap_or(false);
            if mutually_independent {
                union(&mut parent, index[a], index[b]);
            }
        }
    }

    ids.iter()
        .map(|id| (id.as_str(), find(&mut parent, index[id.as_str()])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_core::dependency::Dependency;
    use beads_core::enums::DependencyType;
    use beads_core::issue::IssueBuilder;
    use chrono::Utc;
    use std::collections::HashMap as Map;

    fn sub(issues: Vec<Issue>, edges: Vec<Dependency>) -> Subgraph {
        let order: Vec<String> = issues.iter().map(|i| i.id.clone()).collect();
        let mut map = Map::new();
        for issue in issues {
            map.insert(issue.id.clone(), issue);
        }
        Subgraph {
            root: order[0].clone(),
            order,
            issues: map,
            edges,
        }
    }

    fn edge(issue_id: &str, depends_on_id: &str, dep_type: DependencyType) -> Dependency {
        Dependency {
            issue_id: issue_id.into(),
            depends_on_id: depends_on_id.into(),
            dep_type,
            created_at: Utc::now(),
            created_by: "test".into(),
            metadata: String::new(),
            thread_id: String::new(),
        }
    }

    #[test]
    fn v_shape_arms_share_a_group_at_depth_zero() {
        let root = IssueBuilder::new("root").id("r").build();
        let a = IssueBuilder::new("a").id("a").build();
        let b = IssueBuilder::new("b").id("b").build();
        let subgraph = sub(
            vec![root, a, b],
            vec![
                edge("a", "r", DependencyType::ParentChild),
                edge("b", "r", DependencyType::ParentChild),
            ],
        );
        let analysis = analyze(&subgraph);
        let a_res = analysis.iter().find(|s| s.id == "a").unwrap();
        let b_res = analysis.iter().find(|s| s.id == "b").unwrap();
        assert!(a_res.ready);
        assert!(b_res.ready);
        assert_eq!(a_res.depth, 0);
        assert_eq!(b_res.depth, 0);
        assert_eq!(a_res.group, b_res.group);
    }

    #[test]
    fn linear_chain_has_one_ready_step_and_increasing_depth() {
        let a = IssueBuilder::new("a").id("a").build();
        let b = IssueBuilder::new("b").id("b").build();
        let c = IssueBuilder::new("c").id("c").build();
        let subgraph = sub(
            vec![a, b, c],
            vec![
                edge("b", "a", DependencyType::Blocks),
                edge("c", "b", DependencyType::Blocks),
            ],
        );
        let analysis = analyze(&subgraph);
        let ready: Vec<&str> = analysis.iter().filter(|s| s.ready).map(|s| s.id.as_str()).collect();
        assert_eq!(ready, vec!["a"]);
        assert_eq!(analysis.iter().find(|s| s.id == "a").unwrap().depth, 0);
        assert_eq!(analysis.iter().find(|s| s.id == "b").unwrap().depth, 1);
        assert_eq!(analysis.iter().find(|s| s.id == "c").unwrap().depth, 2);
    }

    #[test]
    fn three_children_one_blocking_pair_ready_set_is_two() {
        let a = IssueBuilder::new("a").id("a").build();
        let b = IssueBuilder::new("b").id("b").build();
        let c = IssueBuilder::new("c").id("c").build();
        let subgraph = sub(vec![a, b, c], vec![edge("b", "a", DependencyType::Blocks)]);
        let analysis = analyze(&subgraph);
        let mut ready: Vec<&str> = analysis.iter().filter(|s| s.ready).map(|s| s.id.as_str()).collect();
        ready.sort();
        assert_eq!(ready, vec!["a", "c"]);
        assert_eq!(analysis.iter().find(|s| s.id == "b").unwrap().depth, 1);
    }

    #[test]
    fn closed_blocker_satisfies_conditional_only_on_failure_reason() {
        let mut a = IssueBuilder::new("a").id("a").status(Status::Closed).build();
        a.close_reason = "done".into();
        let b = IssueBuilder::new("b").id("b").build();
        let subgraph = sub(vec![a, b], vec![edge("b", "a", DependencyType::ConditionalBlocks)]);
        let analysis = analyze(&subgraph);
        assert!(!analysis.iter().find(|s| s.id == "b").unwrap().ready);
    }

    #[test]
    fn cyclic_edges_yield_depth_zero_instead_of_looping() {
        let a = IssueBuilder::new("a").id("a").build();
        let b = IssueBuilder::new("b").id("b").build();
        let subgraph = sub(
            vec![a, b],
            vec![
                edge("a", "b", DependencyType::Blocks),
                edge("b", "a", DependencyType::Blocks),
            ],
        );
        let analysis = analyze(&subgraph);
        for step in &analysis {
            assert_eq!(step.depth, 0);
        }
    }
}
