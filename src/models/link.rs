use serde::{Deserialize, Serialize};

/// Label used when a link is submitted without one.
pub const DEFAULT_LINK_LABEL: &str = "Link";

/// An external reference (PR, ticket, doc page) attached to a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub label: String,
    pub url: String,
}

/// A link as submitted by a caller, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInput {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub url: String,
}

impl LinkInput {
    /// Creates a labelled link.
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            url: url.into(),
        }
    }

    /// Creates a link that will get the default label.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            label: None,
            url: url.into(),
        }
    }

    /// Trims both parts and fills in the default label.
    ///
    /// Returns `None` when the URL is blank; such links are dropped.
    pub fn normalize(&self) -> Option<Link> {
        let url = self.url.trim();
        if url.is_empty() {
            return None;
        }

        let label = self
            .label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LINK_LABEL);

        Some(Link {
            label: label.to_string(),
            url: url.to_string(),
        })
    }
}

impl From<(&str, &str)> for LinkInput {
    fn from((label, url): (&str, &str)) -> Self {
        Self::new(label, url)
    }
}
