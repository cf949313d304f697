//! Progress summary (§4.8.8).
//!
//! A lightweight aggregate over a molecule's subgraph: counts by status
//! plus first/last close times, from which a caller derives completion
//! rate and ETA. Molecules above [`SUMMARY_THRESHOLD`] steps default to
//! this summary instead of a full listing.

use chrono::{DateTime, Utc};

use beads_core::enums::Status;

use crate::subgraph::Subgraph;

/// Step count above which callers should default to the summary view
/// rather than listing every step.
pub const SUMMARY_THRESHOLD: usize = 100;

/// Aggregate progress over a molecule's steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
    pub in_progress: usize,
    /// The first step (by subgraph order) that is open or in-progress,
    /// i.e. the step a caller would point to as "current".
    pub current_step: Option<String>,
    pub first_closed_at: Option<DateTime<Utc>>,
    pub last_closed_at: Option<DateTime<Utc>>,
}

impl Progress {
    /// Completion rate in steps per hour, using `first_closed_at` as the
    /// start of work. `None` until at least two steps have closed (one
    /// data point has no elapsed duration to divide by).
    pub fn rate_per_hour(&self) -> Option<f64> {
        let (first, last) = (self.first_closed_at?, self.last_closed_at?);
        if self.completed < 2 {
            return None;
        }
        let elapsed_hours = (last - first).num_seconds() as f64 / 3600.0;
        if elapsed_hours <= 0.0 {
            return None;
        }
        Some((self.completed - 1) as f64 / elapsed_hours)
    }

    /// Estimated hours remaining at the current rate. `None` if the rate
    /// can't be computed or every step is already complete.
    pub fn eta_hours(&self) -> Option<f64> {
        let rate = self.rate_per_hour()?;
        if rate <= 0.0 || self.completed >= self.total {
            return None;
        }
        Some((self.total - self.completed) as f64 / rate)
    }

    /// Whether a full listing should fall back to this summary by default.
    pub fn prefer_summary(&self) -> bool {
        self.total > SUMMARY_THRESHOLD
    }
}

/// Computes progress over every step in `subgraph`.
pub fn compute(subgraph: &Subgraph) -> Progress {
    let mut completed = 0usize;
    let mut in_progress = 0usize;
    let mut current_step = None;
    let mut first_closed_at = None;
    let mut last_closed_at = None;

    for id in &subgraph.order {
        let Some(issue) = subgraph.issues.get(id) else {
            continue;
        };
        match &issue.status {
            Status::Closed | Status::Tombstone => {
                completed += 1;
                if let Some(closed_at) = issue.closed_at {
                    first_closed_at = Some(first_closed_at.map_or(closed_at, |f: DateTime<Utc>| f.min(closed_at)));
                    last_closed_at = Some(last_closed_at.map_or(closed_at, |l: DateTime<Utc>| l.max(closed_at)));
                }
            }
            Status::InProgress => {
                in_progress += 1;
                if current_step.is_none() {
                    current_step = Some(id.clone());
                }
            }
            _ => {
                if current_step.is_none() {
                    current_step = Some(id.clone());
                }
            }
        }
    }

    Progress {
        total: subgraph.order.len(),
        completed,
        in_progress,
        current_step,
        first_closed_at,
        last_closed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_core::issue::IssueBuilder;
    use chrono::Duration;
    use std::collections::HashMap;

    fn subgraph_of(issues: Vec<(&str, Status, Option<DateTime<Utc>>)>) -> Subgraph {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for (id, status, closed_at) in issues {
            order.push(id.to_string());
            let mut issue = IssueBuilder::new(id).id(id).status(status).build();
            issue.closed_at = closed_at;
            map.insert(id.to_string(), issue);
        }
        Subgraph {
            root: order[0].clone(),
            order,
            issues: map,
            edges: Vec::new(),
        }
    }

    #[test]
    fn counts_by_status() {
        let now = Utc::now();
        let sub = subgraph_of(vec![
            ("r", Status::Closed, Some(now)),
            ("r.a", Status::InProgress, None),
            ("r.b", Status::Open, None),
        ]);
        let progress = compute(&sub);
        assert_eq!(progress.total, 3);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.in_progress, 1);
        assert_eq!(progress.current_step, Some("r.a".to_string()));
    }

    #[test]
    fn rate_needs_two_closed_steps() {
        let now = Utc::now();
        let sub = subgraph_of(vec![("r", Status::Closed, Some(now))]);
        assert!(compute(&sub).rate_per_hour().is_none());
    }

    #[test]
    fn rate_and_eta_from_two_closes() {
        let now = Utc::now();
        let sub = subgraph_of(vec![
            ("r", Status::Closed, Some(now - Duration::hours(2))),
            ("r.a", Status::Closed, Some(now)),
            ("r.b", Status::Open, None),
            ("r.c", Status::Open, None),
        ]);
        let progress = compute(&sub);
        let rate = progress.rate_per_hour().unwrap();
        assert!((rate - 0.5).abs() < 1e-9);
        let eta = progress.eta_hours().unwrap();
        assert!((eta - 4.0).abs() < 1e-9);
    }

    #[test]
    fn prefer_summary_above_threshold() {
        let mut issues = Vec::new();
        for i in 0..(SUMMARY_THRESHOLD + 1) {
            issues.push((Box::leak(format!("r.{i}").into_boxed_str()) as &str, Status::Open, None));
        }
        let sub = subgraph_of(issues);
        assert!(compute(&sub).prefer_summary());
    }
}
