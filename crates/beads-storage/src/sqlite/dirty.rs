//! Dirty-set tracking: issues whose store state is ahead of the last
//! journal export.

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::sqlite::store::SqliteStore;

pub(crate) fn mark_dirty_on_conn(conn: &Connection, issue_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO dirty_issues (issue_id) VALUES (?1)",
        params![issue_id],
    )?;
    Ok(())
}

pub(crate) fn clear_dirty_on_conn(conn: &Connection, issue_ids: &[String]) -> Result<()> {
    if issue_ids.is_empty() {
        return Ok(());
    }
    let placeholders = issue_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = format!("DELETE FROM dirty_issues WHERE issue_id IN ({placeholders})");
    conn.execute(&sql, rusqlite::params_from_iter(issue_ids.iter()))?;
    Ok(())
}

pub(crate) fn list_dirty_on_conn(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT issue_id FROM dirty_issues ORDER BY issue_id")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

impl SqliteStore {
    /// Marks an issue as ahead of the last journal export.
    pub fn mark_dirty_impl(&self, issue_id: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        mark_dirty_on_conn(&conn, issue_id)
    }

    /// Clears the dirty flag for the given issue IDs.
    pub fn clear_dirty_impl(&self, issue_ids: &[String]) -> Result<()> {
        let conn = self.lock_conn()?;
        clear_dirty_on_conn(&conn, issue_ids)
    }

    /// Returns every issue ID currently marked dirty.
    pub fn list_dirty_impl(&self) -> Result<Vec<String>> {
        let conn = self.lock_conn()?;
        list_dirty_on_conn(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_and_list_dirty() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.mark_dirty_impl("bd-1").unwrap();
        store.mark_dirty_impl("bd-2").unwrap();
        // Marking twice should not duplicate.
        store.mark_dirty_impl("bd-1").unwrap();

        let dirty = store.list_dirty_impl().unwrap();
        assert_eq!(dirty, vec!["bd-1", "bd-2"]);
    }

    #[test]
    fn clear_dirty_removes_only_given_ids() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.mark_dirty_impl("bd-1").unwrap();
        store.mark_dirty_impl("bd-2").unwrap();

        store.clear_dirty_impl(&["bd-1".to_string()]).unwrap();

        let dirty = store.list_dirty_impl().unwrap();
        assert_eq!(dirty, vec!["bd-2"]);
    }
}
