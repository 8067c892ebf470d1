use rusqlite::Row;
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{Confidence, Link, LinkInput, NoteId, timestamp};
use crate::error::{StoreError, StoreResult};

/// Column list read by [`LearningNote::from_row`], for queries aliasing
/// `learning_notes` as `n`.
pub(crate) const NOTE_COLUMNS: &str = "n.id, n.repo_key, n.title, n.problem, n.solution, \
     n.root_cause, n.applies_when, n.confidence, n.created_at, n.updated_at, n.last_verified_at";

/// A problem/solution pair recorded for a repository.
///
/// Notes are the primary records of the store. Their textual fields are
/// mirrored into the search index; tags and links live in their own tables
/// and are fetched with [`crate::NoteStore::get_meta`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningNote {
    pub id: NoteId,
    pub repo_key: String,
    pub title: String,
    pub problem: String,
    pub solution: String,
    pub root_cause: Option<String>,
    pub applies_when: Option<String>,
    pub confidence: Confidence,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_verified_at: Option<OffsetDateTime>,
}

impl LearningNote {
    /// Maps a row selected with [`NOTE_COLUMNS`] as its leading columns.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let last_verified_at = match row.get::<_, Option<String>>(10)? {
            Some(text) => Some(parse_timestamp_column(10, &text)?),
            None => None,
        };

        Ok(Self {
            id: row.get(0)?,
            repo_key: row.get(1)?,
            title: row.get(2)?,
            problem: row.get(3)?,
            solution: row.get(4)?,
            root_cause: row.get(5)?,
            applies_when: row.get(6)?,
            confidence: row.get(7)?,
            created_at: parse_timestamp_column(8, &row.get::<_, String>(8)?)?,
            updated_at: parse_timestamp_column(9, &row.get::<_, String>(9)?)?,
            last_verified_at,
        })
    }
}

fn parse_timestamp_column(idx: usize, text: &str) -> rusqlite::Result<OffsetDateTime> {
    timestamp::parse(text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Tags and links attached to a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMeta {
    /// Tag names, sorted by name.
    pub tags: Vec<String>,
    /// Links in the order they were added.
    pub links: Vec<Link>,
}

impl NoteMeta {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.links.is_empty()
    }
}

/// Input for [`crate::NoteStore::add_note`].
///
/// # Examples
///
/// ```
/// use learnings::{Confidence, LinkInput, NewNote};
///
/// let input = NewNote::new("api", "Timeouts on upload", "504 after 30s", "Raise proxy timeout")
///     .root_cause("nginx default proxy_read_timeout")
///     .confidence(Confidence::Confirmed)
///     .tags(["nginx", "timeout"])
///     .link(LinkInput::new("PR", "https://example.com/pr/12"));
///
/// assert_eq!(input.tags.len(), 2);
/// assert_eq!(input.links.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNote {
    pub repo_key: String,
    pub title: String,
    pub problem: String,
    pub solution: String,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub applies_when: Option<String>,
    /// `None` stores [`Confidence::Likely`].
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: Vec<LinkInput>,
}

impl NewNote {
    /// Creates an input with the four required fields.
    pub fn new(
        repo_key: impl Into<String>,
        title: impl Into<String>,
        problem: impl Into<String>,
        solution: impl Into<String>,
    ) -> Self {
        Self {
            repo_key: repo_key.into(),
            title: title.into(),
            problem: problem.into(),
            solution: solution.into(),
            ..Self::default()
        }
    }

    pub fn root_cause(mut self, root_cause: impl Into<String>) -> Self {
        self.root_cause = Some(root_cause.into());
        self
    }

    pub fn applies_when(mut self, applies_when: impl Into<String>) -> Self {
        self.applies_when = Some(applies_when.into());
        self
    }

    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Appends tags.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Appends one link.
    pub fn link(mut self, link: LinkInput) -> Self {
        self.links.push(link);
        self
    }
}

/// Partial update for [`crate::NoteStore::update_note`].
///
/// Fields left as `None` keep their stored value. For `root_cause` and
/// `applies_when`, supplying a blank string clears the field. `tags` and
/// `links`, when supplied, replace the note's whole tag set or link list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    #[serde(default)]
    pub repo_key: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub applies_when: Option<String>,
    #[serde(default)]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub links: Option<Vec<LinkInput>>,
}

impl NoteUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repo_key(mut self, repo_key: impl Into<String>) -> Self {
        self.repo_key = Some(repo_key.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn problem(mut self, problem: impl Into<String>) -> Self {
        self.problem = Some(problem.into());
        self
    }

    pub fn solution(mut self, solution: impl Into<String>) -> Self {
        self.solution = Some(solution.into());
        self
    }

    pub fn root_cause(mut self, root_cause: impl Into<String>) -> Self {
        self.root_cause = Some(root_cause.into());
        self
    }

    pub fn applies_when(mut self, applies_when: impl Into<String>) -> Self {
        self.applies_when = Some(applies_when.into());
        self
    }

    pub fn confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn links(mut self, links: Vec<LinkInput>) -> Self {
        self.links = Some(links);
        self
    }

    /// Returns true when no field would change.
    pub fn is_empty(&self) -> bool {
        !self.touches_fields() && self.tags.is_none() && self.links.is_none()
    }

    /// Returns true when a column of `learning_notes` would change.
    pub(crate) fn touches_fields(&self) -> bool {
        self.repo_key.is_some()
            || self.title.is_some()
            || self.problem.is_some()
            || self.solution.is_some()
            || self.root_cause.is_some()
            || self.applies_when.is_some()
            || self.confidence.is_some()
    }
}

/// Trims a required field, rejecting blank values.
pub(crate) fn required(field: &'static str, value: &str) -> StoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StoreError::validation(field, "cannot be empty"));
    }
    Ok(trimmed.to_string())
}

/// Trims an optional field; blank values become `None`.
pub(crate) fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_trims_value() {
        assert_eq!(required("title", "  Fix  ").unwrap(), "Fix");
    }

    #[test]
    fn required_rejects_whitespace() {
        let err = required("solution", " \n\t ").unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "solution", .. }));
    }

    #[test]
    fn optional_maps_blank_to_none() {
        assert_eq!(optional(Some("   ")), None);
        assert_eq!(optional(None), None);
        assert_eq!(optional(Some(" cause ")), Some("cause".to_string()));
    }

    #[test]
    fn new_note_defaults_are_empty() {
        let input = NewNote::new("r", "t", "p", "s");
        assert_eq!(input.confidence, None);
        assert!(input.tags.is_empty());
        assert!(input.links.is_empty());
    }

    #[test]
    fn new_note_deserializes_with_only_required_fields() {
        let input: NewNote = serde_json::from_str(
            r#"{"repo_key":"r","title":"t","problem":"p","solution":"s"}"#,
        )
        .unwrap();
        assert_eq!(input, NewNote::new("r", "t", "p", "s"));
    }

    #[test]
    fn update_emptiness() {
        assert!(NoteUpdate::new().is_empty());
        assert!(!NoteUpdate::new().tags(["a"]).is_empty());
        assert!(!NoteUpdate::new().tags(["a"]).touches_fields());
        assert!(NoteUpdate::new().title("x").touches_fields());
    }

    #[test]
    fn learning_note_serializes_timestamps_as_rfc3339() {
        let at = time::macros::datetime!(2024-01-02 03:04:05.006 UTC);
        let note = LearningNote {
            id: NoteId::new(1),
            repo_key: "r".into(),
            title: "t".into(),
            problem: "p".into(),
            solution: "s".into(),
            root_cause: None,
            applies_when: None,
            confidence: Confidence::Likely,
            created_at: at,
            updated_at: at,
            last_verified_at: None,
        };

        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["created_at"], "2024-01-02T03:04:05.006Z");
        assert_eq!(json["confidence"], "likely");
        assert!(json["last_verified_at"].is_null());
    }
}
