use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::StoreResult;
use crate::index::{self, IndexReport};
use crate::models::{
    LearningNote, Link, LinkInput, NOTE_COLUMNS, NewNote, NoteId, NoteMeta, NoteUpdate, Tag,
    TagId, clean_tag_names, optional, required, timestamp,
};
use crate::search::{self, SearchOptions, SearchResult};
use crate::Database;

/// Result count used by [`NoteStore::list_by_repo`] when the limit is zero.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Transactional access to learning notes, their tags and links, and the
/// search index that mirrors them.
///
/// NoteStore owns a Database instance. Every public method is one unit of
/// work: writes run in a single `BEGIN IMMEDIATE` transaction that also
/// updates the search index, so a failure leaves nothing behind.
///
/// # Examples
///
/// ```
/// use learnings::{Database, NoteStore};
///
/// # fn main() -> anyhow::Result<()> {
/// let db = Database::in_memory()?;
/// let store = NoteStore::new(db);
/// assert_eq!(store.count(None)?, 0);
/// # Ok(())
/// # }
/// ```
pub struct NoteStore {
    db: Database,
}

impl NoteStore {
    /// Creates a new NoteStore with the given database.
    ///
    /// Takes ownership of the database instance; the store becomes the only
    /// writer of its tables.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns a reference to the underlying database.
    ///
    /// Useful for testing or advanced operations that need direct database access.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Records a new note with its tags and links.
    ///
    /// `repo_key`, `title`, `problem` and `solution` are trimmed and must not
    /// be blank. Optional text fields are trimmed and blank ones stored as
    /// NULL. Tags are trimmed and blank ones dropped; repeated names collapse
    /// into one association. Links with a blank URL are dropped and blank
    /// labels become `"Link"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use learnings::{Database, LinkInput, NewNote, NoteStore};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let store = NoteStore::new(Database::in_memory()?);
    ///
    /// let id = store.add_note(
    ///     &NewNote::new("web", "Stale cache after deploy", "Old JS served", "Bust CDN cache")
    ///         .tags(["cdn", "deploy"])
    ///         .link(LinkInput::new("Runbook", "https://example.com/runbook")),
    /// )?;
    ///
    /// let note = store.get_note(id)?.expect("note should exist");
    /// assert_eq!(note.title, "Stale cache after deploy");
    /// # Ok(())
    /// # }
    /// ```
    pub fn add_note(&self, input: &NewNote) -> StoreResult<NoteId> {
        let repo_key = required("repo_key", &input.repo_key)?;
        let title = required("title", &input.title)?;
        let problem = required("problem", &input.problem)?;
        let solution = required("solution", &input.solution)?;
        let root_cause = optional(input.root_cause.as_deref());
        let applies_when = optional(input.applies_when.as_deref());
        let confidence = input.confidence.unwrap_or_default();
        let now = timestamp::format(timestamp::now())?;
        debug!(
            repo_key = %repo_key,
            tags = input.tags.len(),
            links = input.links.len(),
            "adding learning note"
        );

        let tx = self.db.write_transaction()?;

        tx.execute(
            "INSERT INTO learning_notes
             (repo_key, title, problem, solution, root_cause, applies_when, confidence, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            rusqlite::params![
                repo_key,
                title,
                problem,
                solution,
                root_cause,
                applies_when,
                confidence,
                now,
            ],
        )?;
        let id = NoteId::new(tx.last_insert_rowid());

        attach_tags(&tx, id, &clean_tag_names(&input.tags))?;
        insert_links(&tx, id, &input.links)?;
        index::insert_entry(&tx, id)?;

        tx.commit()?;
        info!(note_id = %id, repo_key = %repo_key, "learning note added");
        Ok(id)
    }

    /// Retrieves a note by its ID.
    ///
    /// Returns `None` if no note exists with the given ID. This is not
    /// considered an error condition.
    pub fn get_note(&self, id: NoteId) -> StoreResult<Option<LearningNote>> {
        fetch_note(self.db.connection(), id)
    }

    /// Returns a note's tags (sorted by name) and links (in insertion order).
    ///
    /// An unknown id yields empty lists.
    pub fn get_meta(&self, id: NoteId) -> StoreResult<NoteMeta> {
        let tx = self.db.read_transaction()?;

        let tags = {
            let mut stmt = tx.prepare(
                "SELECT t.name
                 FROM learning_note_tags nt
                 JOIN tags t ON t.id = nt.tag_id
                 WHERE nt.learning_note_id = ?1
                 ORDER BY t.name ASC",
            )?;
            let rows = stmt.query_map([id], |row| row.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let links = {
            let mut stmt = tx.prepare(
                "SELECT label, url
                 FROM links
                 WHERE learning_note_id = ?1
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([id], |row| {
                Ok(Link {
                    label: row.get(0)?,
                    url: row.get(1)?,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.commit()?;
        Ok(NoteMeta { tags, links })
    }

    /// Applies a partial update and returns the note as stored afterwards.
    ///
    /// Returns `None` without writing anything when the note does not exist.
    /// Any change refreshes `updated_at`. When a searchable field changes,
    /// the note's index entry is deleted and re-inserted in the same
    /// transaction.
    ///
    /// # Examples
    ///
    /// ```
    /// use learnings::{Confidence, Database, NewNote, NoteStore, NoteUpdate, SearchOptions};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let store = NoteStore::new(Database::in_memory()?);
    /// let id = store.add_note(&NewNote::new("api", "Slow query", "Report takes 40s", "Add index"))?;
    ///
    /// let updated = store
    ///     .update_note(id, &NoteUpdate::new().solution("Add composite index").confidence(Confidence::Confirmed))?
    ///     .expect("note should exist");
    /// assert_eq!(updated.solution, "Add composite index");
    ///
    /// let hits = store.search("composite", &SearchOptions::default())?;
    /// assert_eq!(hits.len(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn update_note(
        &self,
        id: NoteId,
        update: &NoteUpdate,
    ) -> StoreResult<Option<LearningNote>> {
        let repo_key = update
            .repo_key
            .as_deref()
            .map(|v| required("repo_key", v))
            .transpose()?;
        let title = update
            .title
            .as_deref()
            .map(|v| required("title", v))
            .transpose()?;
        let problem = update
            .problem
            .as_deref()
            .map(|v| required("problem", v))
            .transpose()?;
        let solution = update
            .solution
            .as_deref()
            .map(|v| required("solution", v))
            .transpose()?;
        // A supplied blank value clears the column
        let set_root_cause = update.root_cause.is_some();
        let root_cause = optional(update.root_cause.as_deref());
        let set_applies_when = update.applies_when.is_some();
        let applies_when = optional(update.applies_when.as_deref());
        debug!(note_id = %id, fields = update.touches_fields(), "updating learning note");

        let tx = self.db.write_transaction()?;

        if !note_exists(&tx, id)? {
            debug!(note_id = %id, "update skipped, note not found");
            return Ok(None);
        }

        if !update.is_empty() {
            let now = timestamp::format(timestamp::now())?;

            tx.execute(
                "UPDATE learning_notes SET
                     repo_key = COALESCE(?1, repo_key),
                     title = COALESCE(?2, title),
                     problem = COALESCE(?3, problem),
                     solution = COALESCE(?4, solution),
                     root_cause = CASE WHEN ?5 THEN ?6 ELSE root_cause END,
                     applies_when = CASE WHEN ?7 THEN ?8 ELSE applies_when END,
                     confidence = COALESCE(?9, confidence),
                     updated_at = ?10
                 WHERE id = ?11",
                rusqlite::params![
                    repo_key,
                    title,
                    problem,
                    solution,
                    set_root_cause,
                    root_cause,
                    set_applies_when,
                    applies_when,
                    update.confidence,
                    now,
                    id,
                ],
            )?;

            if let Some(tags) = &update.tags {
                tx.execute(
                    "DELETE FROM learning_note_tags WHERE learning_note_id = ?1",
                    [id],
                )?;
                attach_tags(&tx, id, &clean_tag_names(tags))?;
            }

            if let Some(links) = &update.links {
                tx.execute("DELETE FROM links WHERE learning_note_id = ?1", [id])?;
                insert_links(&tx, id, links)?;
            }

            if update.touches_fields() {
                index::replace_entry(&tx, id)?;
            }
        }

        let note = fetch_note(&tx, id)?;
        tx.commit()?;

        if !update.is_empty() {
            info!(note_id = %id, "learning note updated");
        }
        Ok(note)
    }

    /// Marks a note as re-verified now.
    ///
    /// Sets `last_verified_at` and `updated_at` to the current time. The
    /// searchable text is unchanged, so the index is not touched. Returns
    /// whether the note exists.
    pub fn verify_note(&self, id: NoteId) -> StoreResult<bool> {
        let now = timestamp::format(timestamp::now())?;

        let changed = self.db.connection().execute(
            "UPDATE learning_notes SET last_verified_at = ?1, updated_at = ?1 WHERE id = ?2",
            rusqlite::params![now, id],
        )?;

        if changed > 0 {
            info!(note_id = %id, "learning note verified");
        }
        Ok(changed > 0)
    }

    /// Deletes a note by its ID.
    ///
    /// Removes the index entry and the note in one transaction; foreign key
    /// cascades remove its tag associations and links. Returns whether a
    /// note was deleted. Deleting a non-existent note returns `Ok(false)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use learnings::{Database, NewNote, NoteStore};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let store = NoteStore::new(Database::in_memory()?);
    /// let id = store.add_note(&NewNote::new("r", "To be deleted", "p", "s"))?;
    ///
    /// assert!(store.delete_note(id)?);
    /// assert!(!store.delete_note(id)?);
    /// assert_eq!(store.get_note(id)?, None);
    /// # Ok(())
    /// # }
    /// ```
    pub fn delete_note(&self, id: NoteId) -> StoreResult<bool> {
        debug!(note_id = %id, "deleting learning note");
        let tx = self.db.write_transaction()?;

        index::remove_entry(&tx, id)?;
        let deleted = tx.execute("DELETE FROM learning_notes WHERE id = ?1", [id])?;

        tx.commit()?;
        if deleted > 0 {
            info!(note_id = %id, "learning note deleted");
        }
        Ok(deleted > 0)
    }

    /// Counts notes, optionally within one repository.
    ///
    /// The repository key is trimmed; a blank key counts every note.
    pub fn count(&self, repo_key: Option<&str>) -> StoreResult<usize> {
        let repo_key = optional(repo_key);
        let count = self.db.connection().query_row(
            "SELECT COUNT(*) FROM learning_notes WHERE (?1 IS NULL OR repo_key = ?1)",
            [repo_key],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Lists a repository's notes, most recently updated first.
    ///
    /// A blank repository key returns an empty list. A limit of zero means
    /// [`DEFAULT_LIST_LIMIT`]. Notes updated in the same millisecond are
    /// ordered newest id first.
    pub fn list_by_repo(&self, repo_key: &str, limit: usize) -> StoreResult<Vec<LearningNote>> {
        let repo_key = repo_key.trim();
        if repo_key.is_empty() {
            return Ok(Vec::new());
        }

        let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit };
        debug!(repo_key, limit, "listing notes by repository");
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = self.db.connection().prepare(&format!(
            "SELECT {NOTE_COLUMNS}
             FROM learning_notes n
             WHERE n.repo_key = ?1
             ORDER BY n.updated_at DESC, n.id DESC
             LIMIT ?2"
        ))?;

        let rows = stmt.query_map(rusqlite::params![repo_key, limit], LearningNote::from_row)?;

        let mut notes = Vec::new();
        for row_result in rows {
            notes.push(row_result?);
        }

        Ok(notes)
    }

    /// Lists every tag with its note count, sorted by name.
    pub fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let mut stmt = self.db.connection().prepare(
            "SELECT t.id, t.name, COUNT(nt.learning_note_id)
             FROM tags t
             LEFT JOIN learning_note_tags nt ON nt.tag_id = t.id
             GROUP BY t.id, t.name
             ORDER BY t.name ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Tag::new(row.get::<_, TagId>(0)?, row.get::<_, String>(1)?, row.get(2)?))
        })?;

        let mut tags = Vec::new();
        for row_result in rows {
            tags.push(row_result?);
        }
        Ok(tags)
    }

    /// Full-text search returning matching notes, best match first.
    ///
    /// Blank queries return an empty list without consulting the index.
    ///
    /// # Examples
    ///
    /// ```
    /// use learnings::{Database, NewNote, NoteStore, SearchOptions};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let store = NoteStore::new(Database::in_memory()?);
    /// store.add_note(&NewNote::new("mail", "Bounce storm", "SMTP email rejected", "Fix SPF record"))?;
    /// store.add_note(&NewNote::new("api", "Gateway timeout", "Requests hang", "Raise timeout"))?;
    ///
    /// let hits = store.search("email OR timeout", &SearchOptions::default())?;
    /// assert_eq!(hits.len(), 2);
    ///
    /// let scoped = store.search("email OR timeout", &SearchOptions::default().in_repo("api"))?;
    /// assert_eq!(scoped.len(), 1);
    /// # Ok(())
    /// # }
    /// ```
    pub fn search(&self, query: &str, options: &SearchOptions) -> StoreResult<Vec<LearningNote>> {
        Ok(self
            .search_with_scores(query, options)?
            .into_iter()
            .map(|result| result.note)
            .collect())
    }

    /// Same as [`NoteStore::search`] but keeps each note's bm25 score.
    pub fn search_with_scores(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> StoreResult<Vec<SearchResult>> {
        search::run(self.db.connection(), query, options)
    }

    /// Rebuilds the search index from the notes table.
    ///
    /// Returns the number of entries written.
    pub fn rebuild_index(&self) -> StoreResult<usize> {
        let tx = self.db.write_transaction()?;
        let entries = index::rebuild(&tx)?;
        tx.commit()?;

        info!(entries, "search index rebuilt");
        Ok(entries)
    }

    /// Compares the search index with the notes table without changing either.
    pub fn check_index(&self) -> StoreResult<IndexReport> {
        let tx = self.db.read_transaction()?;
        let report = index::check(&tx)?;
        tx.commit()?;

        if !report.is_consistent() {
            warn!(
                missing = report.missing.len(),
                orphaned = report.orphaned.len(),
                stale = report.stale.len(),
                "search index out of sync"
            );
        }
        Ok(report)
    }
}

fn fetch_note(conn: &Connection, id: NoteId) -> StoreResult<Option<LearningNote>> {
    let note = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM learning_notes n WHERE n.id = ?1"),
            [id],
            LearningNote::from_row,
        )
        .optional()?;
    Ok(note)
}

fn note_exists(conn: &Connection, id: NoteId) -> StoreResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM learning_notes WHERE id = ?1)",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Gets or creates a tag by exact name.
///
/// Insert-or-ignore followed by a lookup, run inside the caller's write
/// transaction, so concurrent writers of the same name end up sharing one row.
fn get_or_create_tag(conn: &Connection, name: &str) -> StoreResult<TagId> {
    conn.execute(
        "INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        [name],
    )?;

    let id = conn.query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| {
        row.get(0)
    })?;
    Ok(id)
}

/// Associates tags with a note. Repeated names are ignored by the
/// association's primary key.
fn attach_tags(conn: &Connection, id: NoteId, names: &[String]) -> StoreResult<()> {
    for name in names {
        let tag_id = get_or_create_tag(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO learning_note_tags (learning_note_id, tag_id) VALUES (?1, ?2)",
            (id, tag_id),
        )?;
    }
    Ok(())
}

fn insert_links(conn: &Connection, id: NoteId, links: &[LinkInput]) -> StoreResult<()> {
    for link in links.iter().filter_map(LinkInput::normalize) {
        conn.execute(
            "INSERT INTO links (learning_note_id, label, url) VALUES (?1, ?2, ?3)",
            (id, &link.label, &link.url),
        )?;
    }
    Ok(())
}
