//! Ranked full-text search over learning notes.
//!
//! The query string goes to FTS5 unchanged, so callers get the engine's own
//! syntax: `email OR timeout`, `"exact phrase"`, `NEAR(a b, 3)`, prefix
//! `time*`. Matches are ranked with `bm25()` (lower is better) and joined back
//! to `learning_notes`, so results always show the current primary row.

use rusqlite::Connection;
use serde::Serialize;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::models::{LearningNote, NOTE_COLUMNS, optional};

/// Result count used when a caller passes no limit or zero.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Scope and size of a search.
///
/// # Examples
///
/// ```
/// use learnings::SearchOptions;
///
/// let options = SearchOptions::default();
/// assert_eq!(options.limit, 10);
/// assert_eq!(options.repo_key, None);
///
/// let scoped = SearchOptions::default().in_repo("billing").limit(3);
/// assert_eq!(scoped.repo_key.as_deref(), Some("billing"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Only return notes whose repository key equals this value. Surrounding
    /// whitespace is ignored and a blank value searches every repository.
    pub repo_key: Option<String>,
    /// Maximum number of results. Zero means [`DEFAULT_SEARCH_LIMIT`].
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            repo_key: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl SearchOptions {
    /// Restricts results to one repository.
    pub fn in_repo(mut self, repo_key: impl Into<String>) -> Self {
        self.repo_key = Some(repo_key.into());
        self
    }

    /// Sets the result limit.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_SEARCH_LIMIT
        } else {
            self.limit
        }
    }
}

/// A matching note and its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub note: LearningNote,
    /// Raw `bm25()` value. Lower is a better match.
    pub score: f64,
}

/// Runs a search. Blank queries return no results without touching the index.
pub(crate) fn run(
    conn: &Connection,
    query: &str,
    options: &SearchOptions,
) -> StoreResult<Vec<SearchResult>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let limit = i64::try_from(options.effective_limit()).unwrap_or(i64::MAX);
    let repo_key = optional(options.repo_key.as_deref());
    debug!(query, repo_key = ?repo_key, limit, "searching notes");

    let sql = format!(
        "SELECT {NOTE_COLUMNS}, bm25(learning_notes_fts) AS score
         FROM learning_notes_fts
         JOIN learning_notes n ON n.id = learning_notes_fts.rowid
         WHERE learning_notes_fts MATCH ?1
           AND (?2 IS NULL OR n.repo_key = ?2)
         ORDER BY score ASC
         LIMIT ?3"
    );

    // Statement errors are schema faults; the match expression is only
    // parsed once rows are stepped
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params![query, repo_key, limit], |row| {
        Ok(SearchResult {
            note: LearningNote::from_row(row)?,
            score: row.get("score")?,
        })
    })?;

    let mut results = Vec::new();
    for row_result in rows {
        results.push(row_result.map_err(classify_error)?);
    }

    Ok(results)
}

/// Separates rejected match expressions from storage failures while stepping.
fn classify_error(err: rusqlite::Error) -> StoreError {
    let msg = err.to_string();
    if msg.contains("fts5") || msg.contains("syntax error") || msg.contains("no such column") {
        StoreError::InvalidQuery(msg)
    } else {
        StoreError::Database(err)
    }
}
