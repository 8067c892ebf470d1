use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use learnings::config::DEFAULT_LOG_FILTER;
use learnings::{
    Config, Confidence, Database, LinkInput, NewNote, NoteId, NoteStore, NoteUpdate,
    SearchOptions, StoreError,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// learnings - record and search what you learned fixing things
#[derive(Parser)]
#[command(name = "learnings")]
#[command(about = "A searchable store of problem/solution notes per repository")]
#[command(version)]
struct Cli {
    /// Database file (overrides LEARNINGS_DB)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Record a new note
    Add(AddCommand),
    /// Full-text search across notes
    Search(SearchCommand),
    /// Show one note
    Get {
        #[arg(value_name = "ID")]
        id: NoteId,
    },
    /// Show a note's tags and links
    Meta {
        #[arg(value_name = "ID")]
        id: NoteId,
    },
    /// Change fields, tags or links of a note
    Update(UpdateCommand),
    /// Mark a note as re-verified now
    Verify {
        #[arg(value_name = "ID")]
        id: NoteId,
    },
    /// Delete a note with its tags associations and links
    Delete {
        #[arg(value_name = "ID")]
        id: NoteId,
    },
    /// Count notes
    Count {
        /// Only count notes of this repository
        #[arg(short, long, value_name = "REPO")]
        repo: Option<String>,
    },
    /// List a repository's notes, most recently updated first
    List {
        #[arg(value_name = "REPO")]
        repo: String,

        /// Maximum number of notes (0 = default of 50)
        #[arg(short, long, default_value_t = 0)]
        limit: usize,
    },
    /// List all tags with their note counts
    Tags,
    /// Rebuild the full-text index from the notes table
    Reindex,
    /// Compare the full-text index with the notes table
    Check,
}

/// Record a new note
#[derive(Parser)]
struct AddCommand {
    /// Repository the note belongs to
    #[arg(short, long)]
    repo: String,

    #[arg(long)]
    title: String,

    #[arg(long)]
    problem: String,

    #[arg(long)]
    solution: String,

    #[arg(long)]
    root_cause: Option<String>,

    #[arg(long)]
    applies_when: Option<String>,

    /// confirmed, likely or hypothesis
    #[arg(short, long)]
    confidence: Option<String>,

    /// Comma-separated tags to apply to the note
    #[arg(short, long, value_name = "TAGS")]
    tags: Option<String>,

    /// `label=url` or a bare url; may be repeated
    #[arg(short, long = "link", value_name = "LINK")]
    links: Vec<String>,
}

/// Full-text search
#[derive(Parser)]
struct SearchCommand {
    /// FTS5 match expression, e.g. `timeout OR deadlock`
    #[arg(value_name = "QUERY")]
    query: String,

    /// Only search this repository
    #[arg(short, long, value_name = "REPO")]
    repo: Option<String>,

    /// Maximum number of results (0 = default of 10)
    #[arg(short, long, default_value_t = 0)]
    limit: usize,

    /// Include bm25 scores in the output
    #[arg(long)]
    scores: bool,
}

/// Partial update; omitted options leave the field as is
#[derive(Parser)]
struct UpdateCommand {
    #[arg(value_name = "ID")]
    id: NoteId,

    #[arg(short, long)]
    repo: Option<String>,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    problem: Option<String>,

    #[arg(long)]
    solution: Option<String>,

    /// Pass an empty string to clear
    #[arg(long)]
    root_cause: Option<String>,

    /// Pass an empty string to clear
    #[arg(long)]
    applies_when: Option<String>,

    #[arg(short, long)]
    confidence: Option<String>,

    /// Replaces all tags; an empty string removes them
    #[arg(short, long, value_name = "TAGS")]
    tags: Option<String>,

    /// Replaces all links; may be repeated
    #[arg(short, long = "link", value_name = "LINK")]
    links: Vec<String>,

    /// Remove all links
    #[arg(long, conflicts_with = "links")]
    clear_links: bool,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = &cli.db {
        config = config.with_db_path(path);
    }
    init_tracing(&config.log_filter);

    let result = open_store(&config).and_then(|store| execute(&cli.command, &store));

    match result {
        Ok(output) => println!("{output}"),
        Err(e) => {
            // Determine exit code based on error type
            let exit_code = if is_user_error(&e) { 1 } else { 2 };
            eprintln!("Error: {e:#}");
            std::process::exit(exit_code);
        }
    }
}

/// Installs the stderr log subscriber. An invalid filter falls back to the default.
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_store(config: &Config) -> Result<NoteStore> {
    let db = Database::open(&config.db_path)
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;
    Ok(NoteStore::new(db))
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are rejected input: blank fields, bad confidence values,
/// malformed search queries, unknown ids. Everything else is internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause
            .downcast_ref::<StoreError>()
            .is_some_and(StoreError::is_validation)
    }) || error.to_string().contains("not found")
}

/// Runs one command against a store and returns the JSON to print.
///
/// Separated from `main` so tests can use in-memory databases.
fn execute(command: &Commands, store: &NoteStore) -> Result<String> {
    match command {
        Commands::Add(cmd) => {
            let id = store
                .add_note(&new_note_from(cmd)?)
                .context("Failed to add note")?;
            to_json(&serde_json::json!({ "id": id }))
        }
        Commands::Search(cmd) => {
            let mut options = SearchOptions::default().limit(cmd.limit);
            if let Some(repo) = &cmd.repo {
                options = options.in_repo(repo.as_str());
            }
            if cmd.scores {
                to_json(&store.search_with_scores(&cmd.query, &options)?)
            } else {
                to_json(&store.search(&cmd.query, &options)?)
            }
        }
        Commands::Get { id } => match store.get_note(*id)? {
            Some(note) => to_json(&note),
            None => anyhow::bail!("Note {id} not found"),
        },
        Commands::Meta { id } => to_json(&store.get_meta(*id)?),
        Commands::Update(cmd) => match store
            .update_note(cmd.id, &note_update_from(cmd)?)
            .context("Failed to update note")?
        {
            Some(note) => to_json(&note),
            None => anyhow::bail!("Note {} not found", cmd.id),
        },
        Commands::Verify { id } => {
            if !store.verify_note(*id)? {
                anyhow::bail!("Note {id} not found");
            }
            to_json(&store.get_note(*id)?)
        }
        Commands::Delete { id } => {
            let deleted = store.delete_note(*id)?;
            to_json(&serde_json::json!({ "id": id, "deleted": deleted }))
        }
        Commands::Count { repo } => {
            let count = store.count(repo.as_deref())?;
            to_json(&serde_json::json!({ "repo": repo, "count": count }))
        }
        Commands::List { repo, limit } => to_json(&store.list_by_repo(repo, *limit)?),
        Commands::Tags => to_json(&store.list_tags()?),
        Commands::Reindex => {
            let entries = store.rebuild_index().context("Failed to rebuild index")?;
            to_json(&serde_json::json!({ "entries": entries }))
        }
        Commands::Check => to_json(&store.check_index()?),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

fn new_note_from(cmd: &AddCommand) -> Result<NewNote> {
    let mut input = NewNote::new(
        cmd.repo.as_str(),
        cmd.title.as_str(),
        cmd.problem.as_str(),
        cmd.solution.as_str(),
    );
    input.root_cause = cmd.root_cause.clone();
    input.applies_when = cmd.applies_when.clone();
    input.confidence = parse_confidence(cmd.confidence.as_deref())?;
    input.tags = cmd.tags.as_deref().map(parse_tags).unwrap_or_default();
    input.links = cmd.links.iter().map(|l| parse_link(l)).collect();
    Ok(input)
}

fn note_update_from(cmd: &UpdateCommand) -> Result<NoteUpdate> {
    let links = if cmd.clear_links {
        Some(Vec::new())
    } else if cmd.links.is_empty() {
        None
    } else {
        Some(cmd.links.iter().map(|l| parse_link(l)).collect())
    };

    Ok(NoteUpdate {
        repo_key: cmd.repo.clone(),
        title: cmd.title.clone(),
        problem: cmd.problem.clone(),
        solution: cmd.solution.clone(),
        root_cause: cmd.root_cause.clone(),
        applies_when: cmd.applies_when.clone(),
        confidence: parse_confidence(cmd.confidence.as_deref())?,
        tags: cmd.tags.as_deref().map(parse_tags),
        links,
    })
}

fn parse_confidence(value: Option<&str>) -> Result<Option<Confidence>> {
    Ok(value.map(str::parse::<Confidence>).transpose()?)
}

/// Parses comma-separated tags from a string.
///
/// Splits on commas, trims whitespace from each tag, and filters out empty strings.
fn parse_tags(tags_str: &str) -> Vec<String> {
    tags_str
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parses `label=url` or a bare url.
///
/// Only an `=` before the scheme separator counts as the label delimiter, so
/// query strings in bare urls are left alone.
fn parse_link(raw: &str) -> LinkInput {
    match raw.split_once('=') {
        Some((label, url)) if !label.contains("://") => LinkInput::new(label.trim(), url.trim()),
        _ => LinkInput::url(raw.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> NoteStore {
        NoteStore::new(Database::in_memory().expect("failed to create in-memory database"))
    }

    fn add_command(title: &str) -> AddCommand {
        AddCommand {
            repo: "cli".to_string(),
            title: title.to_string(),
            problem: "problem text".to_string(),
            solution: "solution text".to_string(),
            root_cause: None,
            applies_when: None,
            confidence: None,
            tags: Some("a, b,,".to_string()),
            links: vec!["PR=https://example.com/pr/1".to_string()],
        }
    }

    #[test]
    fn parse_tags_trims_and_drops_empty() {
        assert_eq!(parse_tags(" rust , sqlite,, "), vec!["rust", "sqlite"]);
        assert!(parse_tags(" , ").is_empty());
    }

    #[test]
    fn parse_link_with_label() {
        assert_eq!(
            parse_link("Docs = https://example.com/docs"),
            LinkInput::new("Docs", "https://example.com/docs")
        );
    }

    #[test]
    fn parse_link_bare_url_keeps_query_string() {
        assert_eq!(
            parse_link("https://example.com/search?q=timeout"),
            LinkInput::url("https://example.com/search?q=timeout")
        );
    }

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn execute_add_then_search() {
        let store = store();

        let output = execute(&Commands::Add(add_command("Socket hang")), &store)
            .expect("add should succeed");
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["id"], 1);

        let meta = store.get_meta(NoteId::new(1)).unwrap();
        assert_eq!(meta.tags, vec!["a", "b"]);
        assert_eq!(meta.links[0].label, "PR");

        let output = execute(
            &Commands::Search(SearchCommand {
                query: "socket".to_string(),
                repo: None,
                limit: 0,
                scores: true,
            }),
            &store,
        )
        .expect("search should succeed");
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(1));
        assert!(value[0]["score"].is_number());
    }

    #[test]
    fn blank_title_is_user_error() {
        let err = execute(&Commands::Add(add_command("  ")), &store())
            .expect_err("blank title should fail");

        assert!(is_user_error(&err));
    }

    #[test]
    fn bad_confidence_is_user_error() {
        let mut cmd = add_command("t");
        cmd.confidence = Some("certain".to_string());

        let err = execute(&Commands::Add(cmd), &store()).expect_err("should fail");

        assert!(is_user_error(&err));
    }

    #[test]
    fn missing_note_is_user_error() {
        let err = execute(&Commands::Get { id: NoteId::new(9) }, &store())
            .expect_err("missing note should fail");

        assert!(is_user_error(&err));
    }

    #[test]
    fn database_failure_is_internal_error() {
        let err = anyhow::Error::new(StoreError::Database(
            rusqlite::Error::QueryReturnedNoRows,
        ));

        assert!(!is_user_error(&err));
    }
}
