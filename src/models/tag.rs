use serde::{Deserialize, Serialize};

use super::TagId;

/// A deduplicated label shared by any number of notes.
///
/// Names are trimmed on write and compared case-sensitively, so `Bug` and
/// `bug` are two different tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    id: TagId,
    name: String,
    note_count: usize,
}

impl Tag {
    /// Creates a tag with its usage count.
    ///
    /// # Examples
    ///
    /// ```
    /// use learnings::{Tag, TagId};
    ///
    /// let tag = Tag::new(TagId::new(1), "sqlite", 3);
    /// assert_eq!(tag.id(), TagId::new(1));
    /// assert_eq!(tag.name(), "sqlite");
    /// assert_eq!(tag.note_count(), 3);
    /// ```
    pub fn new(id: TagId, name: impl Into<String>, note_count: usize) -> Self {
        Self {
            id,
            name: name.into(),
            note_count,
        }
    }

    /// Returns the tag's unique identifier.
    pub fn id(&self) -> TagId {
        self.id
    }

    /// Returns the tag name as stored.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how many notes carry this tag.
    pub fn note_count(&self) -> usize {
        self.note_count
    }
}

/// Trims submitted tag names and drops blank entries.
///
/// Duplicates are kept; the association table collapses them on insert.
pub(crate) fn clean_tag_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    names
        .iter()
        .map(|n| n.as_ref().trim())
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}
