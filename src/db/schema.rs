/// Primary tables and their indexes.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
/// Run inside the initialization transaction together with the FTS table.
pub const INITIAL_SCHEMA: &str = r#"
-- Learning notes: one problem/solution pair per row
CREATE TABLE IF NOT EXISTS learning_notes (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_key         TEXT NOT NULL,
    title            TEXT NOT NULL,
    problem          TEXT NOT NULL,
    solution         TEXT NOT NULL,
    root_cause       TEXT,
    applies_when     TEXT,
    confidence       TEXT NOT NULL DEFAULT 'likely',
    created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    last_verified_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_learning_notes_repo ON learning_notes(repo_key);
CREATE INDEX IF NOT EXISTS idx_learning_notes_confidence ON learning_notes(confidence);
CREATE INDEX IF NOT EXISTS idx_learning_notes_updated ON learning_notes(updated_at);

-- Tags: unique, case-sensitive names
CREATE TABLE IF NOT EXISTS tags (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Junction table: notes to tags (many-to-many)
CREATE TABLE IF NOT EXISTS learning_note_tags (
    learning_note_id INTEGER NOT NULL,
    tag_id           INTEGER NOT NULL,
    PRIMARY KEY (learning_note_id, tag_id),
    FOREIGN KEY (learning_note_id) REFERENCES learning_notes(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_learning_note_tags_tag ON learning_note_tags(tag_id);

-- External references owned by a single note
CREATE TABLE IF NOT EXISTS links (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    learning_note_id INTEGER NOT NULL,
    label            TEXT NOT NULL,
    url              TEXT NOT NULL,
    FOREIGN KEY (learning_note_id) REFERENCES learning_notes(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_links_note ON links(learning_note_id);
"#;

/// Name of the full-text index table.
pub const FTS_TABLE: &str = "learning_notes_fts";

/// FTS5 table mirroring the searchable note fields.
///
/// Stores its own copy of the text (no `content=` option). The rowid is the
/// note id. Only `crate::index` writes to it.
pub const FTS_TABLE_CREATION: &str = r#"
CREATE VIRTUAL TABLE learning_notes_fts USING fts5(
    title,
    problem,
    solution,
    root_cause,
    applies_when,
    repo_key
);
"#;

/// Tables that must exist after initialization.
pub const REQUIRED_TABLES: &[&str] = &[
    "learning_notes",
    "tags",
    "learning_note_tags",
    "links",
    FTS_TABLE,
];
