use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// How sure the author is that a note's solution is correct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Verified to fix the problem.
    Confirmed,
    /// Probably right; the default for new notes.
    #[default]
    Likely,
    /// An untested theory.
    Hypothesis,
}

impl Confidence {
    /// Returns the stored text form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Likely => "likely",
            Self::Hypothesis => "hypothesis",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" => Ok(Self::Confirmed),
            "likely" => Ok(Self::Likely),
            "hypothesis" => Ok(Self::Hypothesis),
            other => Err(StoreError::validation(
                "confidence",
                format!("expected confirmed, likely or hypothesis, got '{other}'"),
            )),
        }
    }
}

impl ToSql for Confidence {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Confidence {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        text.parse()
            .map_err(|e: StoreError| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_likely() {
        assert_eq!(Confidence::default(), Confidence::Likely);
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&Confidence::Hypothesis).unwrap();
        assert_eq!(json, r#""hypothesis""#);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(" Confirmed ".parse::<Confidence>().unwrap(), Confidence::Confirmed);
        assert_eq!("LIKELY".parse::<Confidence>().unwrap(), Confidence::Likely);
    }

    #[test]
    fn parse_rejects_unknown_levels() {
        let err = "certain".parse::<Confidence>().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("certain"));
    }

    #[test]
    fn reads_back_from_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let level: Confidence = conn
            .query_row("SELECT ?1", [Confidence::Confirmed], |row| row.get(0))
            .unwrap();
        assert_eq!(level, Confidence::Confirmed);

        let bad: rusqlite::Result<Confidence> =
            conn.query_row("SELECT 'maybe'", [], |row| row.get(0));
        assert!(bad.is_err());
    }
}
