//! Full-text index synchronization.
//!
//! `learning_notes_fts` holds one entry per note, keyed by the note id, with
//! a copy of the searchable fields. Every function here takes the caller's
//! open transaction and projects entries straight from the current primary
//! row, so an entry can never hold text the note does not have. FTS5 cannot
//! edit a field in place; a changed note gets its entry deleted and
//! re-inserted.
//!
//! Nothing outside this module writes to the FTS table.

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::error::StoreResult;
use crate::models::NoteId;

/// Adds the index entry for a freshly inserted note.
///
/// Must run in the same transaction as the primary insert.
pub(crate) fn insert_entry(conn: &Connection, id: NoteId) -> StoreResult<()> {
    let inserted = conn.execute(
        "INSERT INTO learning_notes_fts (rowid, title, problem, solution, root_cause, applies_when, repo_key)
         SELECT id, title, problem, solution, root_cause, applies_when, repo_key
         FROM learning_notes
         WHERE id = ?1",
        [id],
    )?;

    if inserted != 1 {
        // The primary row must exist before it can be projected
        return Err(rusqlite::Error::QueryReturnedNoRows.into());
    }

    debug!(note_id = %id, "index entry inserted");
    Ok(())
}

/// Removes the index entry for a note. Returns the number of entries removed.
pub(crate) fn remove_entry(conn: &Connection, id: NoteId) -> StoreResult<usize> {
    let removed = conn.execute("DELETE FROM learning_notes_fts WHERE rowid = ?1", [id])?;
    debug!(note_id = %id, removed, "index entry removed");
    Ok(removed)
}

/// Replaces a note's entry after its searchable fields changed.
pub(crate) fn replace_entry(conn: &Connection, id: NoteId) -> StoreResult<()> {
    remove_entry(conn, id)?;
    insert_entry(conn, id)
}

/// Drops every entry and re-projects all notes. Returns the entry count.
pub(crate) fn rebuild(conn: &Connection) -> StoreResult<usize> {
    conn.execute("DELETE FROM learning_notes_fts", [])?;
    let inserted = conn.execute(
        "INSERT INTO learning_notes_fts (rowid, title, problem, solution, root_cause, applies_when, repo_key)
         SELECT id, title, problem, solution, root_cause, applies_when, repo_key
         FROM learning_notes",
        [],
    )?;
    Ok(inserted)
}

/// Result of comparing the index against the notes table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Rows in `learning_notes`.
    pub notes: usize,
    /// Rows in the FTS table.
    pub entries: usize,
    /// Notes with no index entry.
    pub missing: Vec<NoteId>,
    /// Index entries whose note no longer exists.
    pub orphaned: Vec<NoteId>,
    /// Entries whose text differs from the note.
    pub stale: Vec<NoteId>,
}

impl IndexReport {
    /// Returns true when every note has exactly one matching entry.
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty() && self.stale.is_empty()
    }
}

/// Builds an [`IndexReport`] without modifying anything.
pub(crate) fn check(conn: &Connection) -> StoreResult<IndexReport> {
    let notes: usize =
        conn.query_row("SELECT COUNT(*) FROM learning_notes", [], |row| row.get(0))?;
    let entries: usize =
        conn.query_row("SELECT COUNT(*) FROM learning_notes_fts", [], |row| row.get(0))?;

    let missing = collect_ids(
        conn,
        "SELECT n.id FROM learning_notes n
         WHERE NOT EXISTS (SELECT 1 FROM learning_notes_fts f WHERE f.rowid = n.id)
         ORDER BY n.id",
    )?;

    let orphaned = collect_ids(
        conn,
        "SELECT f.rowid FROM learning_notes_fts f
         WHERE NOT EXISTS (SELECT 1 FROM learning_notes n WHERE n.id = f.rowid)
         ORDER BY f.rowid",
    )?;

    let stale = collect_ids(
        conn,
        "SELECT n.id FROM learning_notes n
         JOIN learning_notes_fts f ON f.rowid = n.id
         WHERE f.title IS NOT n.title
            OR f.problem IS NOT n.problem
            OR f.solution IS NOT n.solution
            OR f.root_cause IS NOT n.root_cause
            OR f.applies_when IS NOT n.applies_when
            OR f.repo_key IS NOT n.repo_key
         ORDER BY n.id",
    )?;

    Ok(IndexReport {
        notes,
        entries,
        missing,
        orphaned,
        stale,
    })
}

fn collect_ids(conn: &Connection, sql: &str) -> StoreResult<Vec<NoteId>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, NoteId>(0))?;

    let mut ids = Vec::new();
    for row_result in rows {
        ids.push(row_result?);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn insert_note(conn: &Connection, title: &str) -> NoteId {
        conn.execute(
            "INSERT INTO learning_notes (repo_key, title, problem, solution) VALUES ('repo', ?1, 'problem', 'solution')",
            [title],
        )
        .unwrap();
        NoteId::new(conn.last_insert_rowid())
    }

    fn indexed_title(conn: &Connection, id: NoteId) -> Option<String> {
        conn.query_row(
            "SELECT title FROM learning_notes_fts WHERE rowid = ?1",
            [id],
            |row| row.get(0),
        )
        .ok()
    }

    #[test]
    fn insert_entry_projects_current_row() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let id = insert_note(conn, "Flaky login test");

        insert_entry(conn, id).unwrap();

        assert_eq!(indexed_title(conn, id).as_deref(), Some("Flaky login test"));
        assert!(check(conn).unwrap().is_consistent());
    }

    #[test]
    fn insert_entry_fails_without_primary_row() {
        let db = Database::in_memory().unwrap();

        let result = insert_entry(db.connection(), NoteId::new(404));

        assert!(result.is_err());
    }

    #[test]
    fn replace_entry_reflects_new_text() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let id = insert_note(conn, "Old title");
        insert_entry(conn, id).unwrap();

        conn.execute(
            "UPDATE learning_notes SET title = 'New title' WHERE id = ?1",
            [id],
        )
        .unwrap();
        assert_eq!(check(conn).unwrap().stale, vec![id]);

        replace_entry(conn, id).unwrap();

        assert_eq!(indexed_title(conn, id).as_deref(), Some("New title"));
        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM learning_notes_fts WHERE learning_notes_fts MATCH 'old'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 0, "old postings must be gone");
        assert!(check(conn).unwrap().is_consistent());
    }

    #[test]
    fn remove_entry_reports_count() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let id = insert_note(conn, "Gone soon");
        insert_entry(conn, id).unwrap();

        assert_eq!(remove_entry(conn, id).unwrap(), 1);
        assert_eq!(remove_entry(conn, id).unwrap(), 0);
        assert_eq!(check(conn).unwrap().missing, vec![id]);
    }

    #[test]
    fn check_finds_orphans() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let id = insert_note(conn, "Short lived");
        insert_entry(conn, id).unwrap();
        conn.execute("DELETE FROM learning_notes WHERE id = ?1", [id])
            .unwrap();

        let report = check(conn).unwrap();

        assert_eq!(report.orphaned, vec![id]);
        assert_eq!(report.notes, 0);
        assert_eq!(report.entries, 1);
        assert!(!report.is_consistent());
    }

    #[test]
    fn rebuild_repairs_all_drift() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        let a = insert_note(conn, "Never indexed");
        let b = insert_note(conn, "Indexed then edited");
        insert_entry(conn, b).unwrap();
        conn.execute(
            "UPDATE learning_notes SET title = 'Edited' WHERE id = ?1",
            [b],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO learning_notes_fts (rowid, title, problem, solution, repo_key) VALUES (999, 'ghost', 'p', 's', 'r')",
            [],
        )
        .unwrap();

        let written = rebuild(conn).unwrap();

        assert_eq!(written, 2);
        let report = check(conn).unwrap();
        assert!(report.is_consistent(), "{report:?}");
        assert_eq!(indexed_title(conn, a).as_deref(), Some("Never indexed"));
        assert_eq!(indexed_title(conn, b).as_deref(), Some("Edited"));
    }
}
