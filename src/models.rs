mod confidence;
mod ids;
mod link;
mod note;
mod tag;
pub(crate) mod timestamp;

pub use confidence::Confidence;
pub use ids::{NoteId, TagId};
pub use link::{DEFAULT_LINK_LABEL, Link, LinkInput};
pub use note::{LearningNote, NewNote, NoteMeta, NoteUpdate};
pub use tag::Tag;

pub(crate) use note::{NOTE_COLUMNS, optional, required};
pub(crate) use tag::clean_tag_names;
