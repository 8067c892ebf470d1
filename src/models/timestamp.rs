//! Storage format for note timestamps.
//!
//! Timestamps are stored as UTC text with millisecond precision
//! (`2024-05-01T09:30:00.125Z`), so ordering by the column text is the same
//! as ordering by time.

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::{StoreError, StoreResult};

const STORED_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// Returns the current UTC time truncated to the stored precision.
///
/// Truncating up front means a note returned from a write compares equal to
/// the same note read back later.
pub(crate) fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_millisecond(now.millisecond()).unwrap_or(now)
}

/// Formats a timestamp for storage.
pub(crate) fn format(at: OffsetDateTime) -> StoreResult<String> {
    at.to_offset(UtcOffset::UTC)
        .format(STORED_FORMAT)
        .map_err(|e| StoreError::Timestamp(e.to_string()))
}

/// Parses a stored timestamp.
pub(crate) fn parse(text: &str) -> StoreResult<OffsetDateTime> {
    PrimitiveDateTime::parse(text, STORED_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| StoreError::Timestamp(format!("{text}: {e}")))
}
