pub mod config;
pub mod db;
pub mod error;
pub mod index;
pub mod models;
pub mod search;
pub mod service;

pub use config::Config;
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use index::IndexReport;
pub use models::{
    Confidence, DEFAULT_LINK_LABEL, LearningNote, Link, LinkInput, NewNote, NoteId, NoteMeta,
    NoteUpdate, Tag, TagId,
};
pub use search::{DEFAULT_SEARCH_LIMIT, SearchOptions, SearchResult};
pub use service::{DEFAULT_LIST_LIMIT, NoteStore};
