//! A small predicate DSL over [`beads_core::issue::Issue`], layered on top
//! of the richer field-level filters already defined in `beads-core`.

use beads_core::enums::Status;
use beads_core::issue::Issue;

/// A single filter term combined by AND semantics with its siblings.
#[derive(Debug, Clone)]
pub enum Term {
    Status(Status),
    Label(String),
    Assignee(String),
    PriorityAtMost(i32),
    TitleContains(String),
}

/// A conjunction of [`Term`]s.
#[derive(Debug, Clone, Default)]
pub struct Query {
    terms: Vec<Term>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, term: Term) -> Self {
        self.terms.push(term);
        self
    }

    /// Evaluate against an issue and its labels. All terms must pass.
    pub fn matches(&self, issue: &Issue, labels: &[String]) -> bool {
        self.terms.iter().all(|term| match term {
            Term::Status(s) => &issue.status == s,
            Term::Label(l) => labels.iter().any(|candidate| candidate == l),
            Term::Assignee(a) => issue.assignee == *a,
            Term::PriorityAtMost(p) => issue.priority <= *p,
            Term::TitleContains(needle) => {
                issue.title.to_lowercase().contains(&needle.to_lowercase())
            }
        })
    }

    /// Filter a slice of `(Issue, labels)` pairs, preserving order.
    pub fn apply<'a>(&self, items: &'a [(Issue, Vec<String>)]) -> Vec<&'a Issue> {
        items
            .iter()
            .filter(|(issue, labels)| self.matches(issue, labels))
            .map(|(issue, _)| issue)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_core::enums::IssueType;

    fn issue(id: &str, status: Status, priority: i32) -> Issue {
        let mut issue = Issue::default();
        issue.id = id.to_string();
        issue.title = format!("issue {id}");
        issue.status = status;
        issue.priority = priority;
        issue.issue_type = IssueType::Task;
        issue
    }

    #[test]
    fn empty_query_matches_everything() {
        let q = Query::new();
        assert!(q.matches(&issue("a", Status::Open, 2), &[]));
    }

    #[test]
    fn status_and_priority_conjunction() {
        let q = Query::new()
            .with(Term::Status(Status::Open))
            .with(Term::PriorityAtMost(1));
        assert!(q.matches(&issue("a", Status::Open, 0), &[]));
        assert!(!q.matches(&issue("a", Status::Open, 2), &[]));
        assert!(!q.matches(&issue("a", Status::Closed, 0), &[]));
    }

    #[test]
    fn label_term() {
        let q = Query::new().with(Term::Label("urgent".to_string()));
        assert!(q.matches(&issue("a", Status::Open, 2), &["urgent".to_string()]));
        assert!(!q.matches(&issue("a", Status::Open, 2), &["other".to_string()]));
    }
}
