//! [`TombstoneCapable`] implementation for [`SqliteStore`].

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use beads_core::enums::Status;

use crate::error::Result;
use crate::sqlite::issues::update_issue_on_conn;
use crate::sqlite::store::SqliteStore;
use crate::traits::{IssueUpdates, TombstoneCapable};

impl TombstoneCapable for SqliteStore {
    fn tombstone_issue(
        &self,
        id: &str,
        actor: &str,
        reason: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.lock_conn()?;
        let issue = crate::sqlite::issues::get_issue_on_conn(&conn, id)?;

        let updates = IssueUpdates {
            status: Some(Status::Tombstone),
            original_type: Some(issue.issue_type.clone()),
            deleted_at: Some(Some(at)),
            deleted_by: Some(Some(actor.to_string())),
            delete_reason: Some(reason.map(|s| s.to_string())),
            ..Default::default()
        };
        update_issue_on_conn(&conn, id, &updates, actor)?;

        crate::sqlite::dependencies::remove_all_dependencies_for_on_conn(&conn, id, actor)?;

        Ok(())
    }

    fn purge_tombstone(&self, id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        crate::sqlite::dependencies::remove_all_dependencies_for_on_conn(&conn, id, "system")?;
        crate::sqlite::issues::delete_issue_on_conn(&conn, id)
    }

    fn integrity_check(&self) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        let mut problems = Vec::new();
        check_dangling_dependencies(&conn, &mut problems)?;
        check_orphaned_labels(&conn, &mut problems)?;
        check_orphaned_comments(&conn, &mut problems)?;
        Ok(problems)
    }
}

fn check_dangling_dependencies(conn: &Connection, problems: &mut Vec<String>) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT d.issue_id, d.depends_on_id FROM dependencies d
         WHERE NOT EXISTS (SELECT 1 FROM issues WHERE issues.id = d.issue_id)
            OR NOT EXISTS (SELECT 1 FROM issues WHERE issues.id = d.depends_on_id)",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (src, dst) = row?;
        problems.push(format!("dangling dependency edge {src} -> {dst}"));
    }
    Ok(())
}

fn check_orphaned_labels(conn: &Connection, problems: &mut Vec<String>) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT issue_id, label FROM labels
         WHERE NOT EXISTS (SELECT 1 FROM issues WHERE issues.id = labels.issue_id)",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (issue_id, label) = row?;
        problems.push(format!("orphaned label {label:?} on missing issue {issue_id}"));
    }
    Ok(())
}

fn check_orphaned_comments(conn: &Connection, problems: &mut Vec<String>) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT id, issue_id FROM comments
         WHERE NOT EXISTS (SELECT 1 FROM issues WHERE issues.id = comments.issue_id)",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (comment_id, issue_id) = row?;
        problems.push(format!(
            "orphaned comment {comment_id} on missing issue {issue_id}"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use beads_core::issue::IssueBuilder;
    use beads_core::dependency::Dependency;
    use beads_core::enums::DependencyType;

    #[test]
    fn tombstone_sets_fields_and_clears_dependencies() {
        let store = SqliteStore::open_in_memory().unwrap();
        let parent = IssueBuilder::new("Parent").id("bd-p").build();
        let child = IssueBuilder::new("Child").id("bd-c").build();
        store.create_issue_impl(&parent, "alice").unwrap();
        store.create_issue_impl(&child, "alice").unwrap();
        store
            .add_dependency_impl(
                &Dependency {
                    issue_id: "bd-c".into(),
                    depends_on_id: "bd-p".into(),
                    dep_type: DependencyType::ParentChild,
                    created_at: Utc::now(),
                    created_by: "alice".into(),
                    metadata: String::new(),
                    thread_id: String::new(),
                },
                "alice",
            )
            .unwrap();

        let at = Utc::now();
        store
            .tombstone_issue("bd-p", "alice", Some("superseded"), at)
            .unwrap();

        let got = store.get_issue_impl("bd-p").unwrap();
        assert_eq!(got.status, Status::Tombstone);
        assert_eq!(got.deleted_by.as_deref(), Some("alice"));
        assert_eq!(got.delete_reason.as_deref(), Some("superseded"));

        let deps = store.get_dependencies_impl("bd-c").unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn integrity_check_reports_dangling_edge() {
        let store = SqliteStore::open_in_memory().unwrap();
        {
            let conn = store.lock_conn().unwrap();
            conn.execute(
                "INSERT INTO dependencies (issue_id, depends_on_id, type, created_by) VALUES ('bd-x', 'bd-y', 'blocks', 'alice')",
                [],
            )
            .unwrap();
        }
        let problems = store.integrity_check().unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("bd-x"));
    }

    #[test]
    fn purge_tombstone_removes_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let issue = IssueBuilder::new("Gone").id("bd-g").build();
        store.create_issue_impl(&issue, "alice").unwrap();
        store
            .tombstone_issue("bd-g", "alice", None, Utc::now())
            .unwrap();
        store.purge_tombstone("bd-g").unwrap();
        let err = store.get_issue_impl("bd-g").unwrap_err();
        assert!(err.is_not_found());
    }
}
