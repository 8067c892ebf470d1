//! File-backed store tests: persistence across reopen and concurrent writers.

use std::sync::{Arc, Barrier};
use std::thread;

use anyhow::Result;
use learnings::{Database, LinkInput, NewNote, NoteStore, NoteUpdate, SearchOptions};
use tempfile::tempdir;

#[test]
fn notes_survive_reopen() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join(".mcp").join("mcp.db");

    let id = {
        let store = NoteStore::new(Database::open(&db_path)?);
        store.add_note(
            &NewNote::new("persist", "Lost writes", "fsync skipped", "Enable WAL")
                .tags(["sqlite"])
                .link(LinkInput::new("Docs", "https://sqlite.org/wal.html")),
        )?
    };

    let store = NoteStore::new(Database::open(&db_path)?);

    let note = store.get_note(id)?.expect("note should persist");
    assert_eq!(note.title, "Lost writes");
    assert_eq!(store.get_meta(id)?.tags, vec!["sqlite"]);

    let hits = store.search("fsync", &SearchOptions::default())?;
    assert_eq!(hits.len(), 1, "index should persist with the note");
    assert!(store.check_index()?.is_consistent());

    Ok(())
}

#[test]
fn update_is_visible_to_a_second_connection() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("shared.db");

    let writer = NoteStore::new(Database::open(&db_path)?);
    let reader = NoteStore::new(Database::open(&db_path)?);

    let id = writer.add_note(&NewNote::new("r", "Before", "p", "s"))?;
    writer.update_note(id, &NoteUpdate::new().title("After"))?;

    assert_eq!(reader.get_note(id)?.map(|n| n.title), Some("After".to_string()));
    assert!(reader.search("before", &SearchOptions::default())?.is_empty());
    assert_eq!(reader.search("after", &SearchOptions::default())?.len(), 1);

    Ok(())
}

#[test]
fn concurrent_writers_share_one_tag_row() -> Result<()> {
    const WRITERS: usize = 4;
    const NOTES_PER_WRITER: usize = 10;

    let dir = tempdir()?;
    let db_path = dir.path().join("concurrent.db");
    // Create the schema once before the writers race
    drop(Database::open(&db_path)?);

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let db_path = db_path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || -> learnings::StoreResult<()> {
                let store = NoteStore::new(Database::open(&db_path)?);
                barrier.wait();
                for i in 0..NOTES_PER_WRITER {
                    store.add_note(
                        &NewNote::new("race", format!("writer {writer} note {i}"), "p", "s")
                            .tags(["shared", "shared"]),
                    )?;
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer thread panicked")?;
    }

    let store = NoteStore::new(Database::open(&db_path)?);
    let tags = store.list_tags()?;

    assert_eq!(tags.len(), 1, "tag name must map to a single row");
    assert_eq!(tags[0].name(), "shared");
    assert_eq!(tags[0].note_count(), WRITERS * NOTES_PER_WRITER);
    assert_eq!(store.count(Some("race"))?, WRITERS * NOTES_PER_WRITER);
    assert!(store.check_index()?.is_consistent());

    Ok(())
}

#[test]
fn delete_on_file_database_cascades() -> Result<()> {
    let dir = tempdir()?;
    let store = NoteStore::new(Database::open(dir.path().join("cascade.db"))?);
    let id = store.add_note(
        &NewNote::new("r", "Cascade", "p", "s")
            .tags(["x"])
            .link(LinkInput::url("https://example.com")),
    )?;

    assert!(store.delete_note(id)?);

    let conn = store.database().connection();
    let links: i64 = conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
    let assoc: i64 =
        conn.query_row("SELECT COUNT(*) FROM learning_note_tags", [], |row| row.get(0))?;
    assert_eq!(links, 0);
    assert_eq!(assoc, 0);
    assert!(store.check_index()?.is_consistent());

    Ok(())
}
