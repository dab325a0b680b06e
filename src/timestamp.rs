//! Capture time parsing
//!
//! EXIF writes date-times as the fixed literal `YYYY:MM:DD HH:MM:SS`. Several
//! tags may carry one; they are searched in priority order and the first tag
//! present wins, even if its value turns out to be malformed.

use crate::tags::{SemanticRecord, TagValue, DATE_TIME, DATE_TIME_DIGITIZED, DATE_TIME_ORIGINAL};
use chrono::NaiveDateTime;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

/// Literal layout of EXIF date-times
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Canonical priority, including the generic IFD0 `DateTime`
pub const CAPTURE_TIME_TAGS: &[&str] = &[DATE_TIME_ORIGINAL, DATE_TIME_DIGITIZED, DATE_TIME];

/// Capture-specific tags only
pub const EXIF_CAPTURE_TIME_TAGS: &[&str] = &[DATE_TIME_ORIGINAL, DATE_TIME_DIGITIZED];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("{value:?} does not match YYYY:MM:DD HH:MM:SS")]
    InvalidFormat { value: String },

    #[error("{value:?} is not a valid calendar date-time")]
    InvalidDate { value: String },

    #[error("{tag} is a {kind} value, expected text")]
    NotText { tag: &'static str, kind: &'static str },
}

pub type Result<T> = std::result::Result<T, TimestampError>;

/// Parsed capture time and the tag it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureTime {
    pub tag: &'static str,
    pub datetime: NaiveDateTime,
}

impl CaptureTime {
    /// Back to the EXIF literal form
    pub fn literal(&self) -> String {
        self.datetime.format(EXIF_DATETIME_FORMAT).to_string()
    }

    /// `YYYY-MM-DD HH:MM:SS`, as shown to users
    pub fn display(&self) -> String {
        self.datetime.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// Parse an EXIF date-time literal.
///
/// Only the exact `YYYY:MM:DD HH:MM:SS` shape is accepted; surrounding
/// whitespace is ignored.
pub fn parse_capture_time(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();
    if !matches_exif_layout(trimmed) {
        return Err(TimestampError::InvalidFormat {
            value: value.to_string(),
        });
    }

    NaiveDateTime::parse_from_str(trimmed, EXIF_DATETIME_FORMAT).map_err(|_| {
        TimestampError::InvalidDate {
            value: value.to_string(),
        }
    })
}

fn matches_exif_layout(s: &str) -> bool {
    const LAYOUT: &[u8; 19] = b"dddd:dd:dd dd:dd:dd";

    s.len() == LAYOUT.len()
        && s.bytes().zip(LAYOUT.iter()).all(|(c, &expected)| match expected {
            b'd' => c.is_ascii_digit(),
            sep => c == sep,
        })
}

/// Find and parse the capture time from the first present tag in `sources`.
///
/// `Ok(None)` means none of the tags exist. A present tag that fails to
/// parse is an error; lower-priority tags are not consulted.
pub fn extract_capture_time(
    record: &SemanticRecord,
    sources: &[&'static str],
) -> Result<Option<CaptureTime>> {
    for &tag in sources {
        let Some(value) = record.get(tag) else {
            trace!(tag, "Time tag absent");
            continue;
        };

        let text = match value {
            TagValue::Text(s) => s,
            other => {
                return Err(TimestampError::NotText {
                    tag,
                    kind: other.kind(),
                })
            }
        };

        let datetime = parse_capture_time(text)?;
        debug!(tag, %datetime, "Found capture time");
        return Ok(Some(CaptureTime { tag, datetime }));
    }

    debug!("No datetime information found in EXIF data");
    Ok(None)
}
