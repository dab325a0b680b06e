//! Canonical file naming
//!
//! Photos organized by capture time are stored as `YYYYMMDD_HHMMSS.<ext>`
//! (or `YYMMDD_HHMMSS.<ext>` with the two-digit year policy). Two uploads
//! from the same second map to the same name; the store treats that as a
//! duplicate rather than adding a suffix.

use crate::timestamp::parse_capture_time;
use serde::{Deserialize, Serialize};

/// Year width in derived names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YearFormat {
    /// `20230704_153000`
    #[default]
    Full,
    /// `230704_153000`
    TwoDigit,
}

impl YearFormat {
    fn pattern(self) -> &'static str {
        match self {
            YearFormat::Full => "%Y%m%d_%H%M%S",
            YearFormat::TwoDigit => "%y%m%d_%H%M%S",
        }
    }
}

/// Filename stem for an EXIF date-time literal, `None` if it does not parse
pub fn derive_stem(literal: &str, year_format: YearFormat) -> Option<String> {
    let datetime = parse_capture_time(literal).ok()?;
    Some(datetime.format(year_format.pattern()).to_string())
}

/// Full filename with a lower-cased extension (leading dot optional)
pub fn derive_filename(literal: &str, extension: &str, year_format: YearFormat) -> Option<String> {
    let stem = derive_stem(literal, year_format)?;
    let extension = extension.trim_start_matches('.').to_lowercase();
    if extension.is_empty() {
        Some(stem)
    } else {
        Some(format!("{}.{}", stem, extension))
    }
}

/// Lower-cased extension of a filename, without the dot
pub fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Stem used when an uploaded name has nothing before its extension
pub const PLACEHOLDER_STEM: &str = "photo";

/// Make an uploaded filename safe to store.
///
/// Path separators and control characters become `_`, leading dots are
/// stripped so the name cannot be hidden or relative, and the extension is
/// lower-cased. A name left with an empty stem (`" .jpg"`, `"..jpg"`) gets
/// [`PLACEHOLDER_STEM`] so the extension survives. Non-ASCII letters are kept.
pub fn sanitize_filename(original: &str) -> String {
    let cleaned: String = original
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match cleaned.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => {
            let stem = stem.trim_start_matches('.').trim();
            let stem = if stem.is_empty() { PLACEHOLDER_STEM } else { stem };
            format!("{}.{}", stem, ext.to_lowercase())
        }
        _ => match cleaned.trim_start_matches('.').trim() {
            "" => PLACEHOLDER_STEM.to_string(),
            name => name.to_string(),
        },
    }
}
