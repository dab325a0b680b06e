//! Photo Metadata Extraction
//!
//! Reads the EXIF block of an image container (JPEG, PNG, TIFF, WebP, HEIF)
//! with kamadak-exif and normalizes it:
//!
//! 1. **Raw tag block** - primary IFD fields keyed by numeric id, GPS fields
//!    nested under `GPSInfo`
//! 2. **Semantic record** - ids resolved to tag names
//! 3. **Location** / **capture time** - extracted independently
//!
//! Unreadable files and corrupt containers never surface as errors here: they
//! are logged and reported as a record without metadata, so one bad upload
//! cannot abort a batch.
//!
//! ## Example
//!
//! ```rust,ignore
//! use soma_photo::metadata::{extract_metadata, ExtractOptions};
//!
//! let meta = extract_metadata(Path::new("photo.jpg"), &ExtractOptions::default());
//! if let Some(coords) = meta.location.found() {
//!     println!("{:.6}, {:.6}", coords.latitude, coords.longitude);
//! }
//! ```

use serde::{Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Seek};
use std::path::Path;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::gps::{extract_location, GpsCoordinates, GpsError};
use crate::tags::{RawTagBlock, RawValue, Rational, SemanticRecord, TagValue, MAKE, MODEL};
use crate::timestamp::{extract_capture_time, CaptureTime, TimestampError, CAPTURE_TIME_TAGS};

// ============================================================================
// Core Metadata Types
// ============================================================================

/// Outcome of extracting one normalized field.
///
/// Keeps "the image simply has no such data" apart from "the data is there
/// but unusable".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "state",
    content = "value",
    rename_all = "snake_case",
    bound(serialize = "T: Serialize, E: fmt::Display")
)]
pub enum Extracted<T, E> {
    Found(T),
    Missing,
    Malformed(#[serde(serialize_with = "serialize_display")] E),
}

fn serialize_display<E: fmt::Display, S: Serializer>(
    error: &E,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl<T, E> Extracted<T, E> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Extracted::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Extracted::Malformed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Extracted::Found(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Extracted::Missing)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Extracted::Malformed(_))
    }
}

impl<T, E> From<std::result::Result<Option<T>, E>> for Extracted<T, E> {
    fn from(result: std::result::Result<Option<T>, E>) -> Self {
        match result {
            Ok(Some(value)) => Extracted::Found(value),
            Ok(None) => Extracted::Missing,
            Err(e) => Extracted::Malformed(e),
        }
    }
}

/// Normalized metadata for one photo
#[derive(Debug, Clone, Serialize)]
pub struct PhotoMetadata {
    /// Source file path or upload name
    pub source_file: String,

    /// MIME type guessed from the extension
    pub mime_type: String,

    /// Camera manufacturer
    pub make: Option<String>,

    /// Camera model
    pub model: Option<String>,

    /// Resolved tag block; `None` when the container has no EXIF data
    pub tags: Option<SemanticRecord>,

    pub location: Extracted<GpsCoordinates, GpsError>,

    pub captured_at: Extracted<CaptureTime, TimestampError>,
}

impl PhotoMetadata {
    /// Record for a file without readable metadata
    pub fn absent(source_file: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            mime_type: mime_type.into(),
            make: None,
            model: None,
            tags: None,
            location: Extracted::Missing,
            captured_at: Extracted::Missing,
        }
    }

    pub fn has_metadata(&self) -> bool {
        self.tags.is_some()
    }

    pub fn coordinates(&self) -> Option<&GpsCoordinates> {
        self.location.found()
    }

    pub fn capture_time(&self) -> Option<&CaptureTime> {
        self.captured_at.found()
    }
}

/// Extraction settings
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    /// Time tags in priority order
    pub time_tags: &'static [&'static str],
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            time_tags: CAPTURE_TIME_TAGS,
        }
    }
}

// ============================================================================
// Metadata Extraction - Main API
// ============================================================================

/// Extract normalized metadata from an image file.
///
/// Never fails: open and decode errors are logged and yield
/// [`PhotoMetadata::absent`].
pub fn extract_metadata(path: &Path, options: &ExtractOptions) -> PhotoMetadata {
    let source = path.to_string_lossy().to_string();
    let mime = detect_mime_from_extension(path);

    let block = File::open(path)
        .map_err(Into::into)
        .and_then(|file| read_tag_block(&mut BufReader::new(file)));

    normalize(source, mime, block, options)
}

/// Same as [`extract_metadata`] for an in-memory upload named `source`
pub fn extract_metadata_from_bytes(source: &str, bytes: &[u8], options: &ExtractOptions) -> PhotoMetadata {
    let mime = detect_mime_from_extension(Path::new(source));
    let block = read_tag_block(&mut Cursor::new(bytes));
    normalize(source.to_string(), mime, block, options)
}

fn normalize(
    source: String,
    mime: String,
    block: Result<Option<RawTagBlock>>,
    options: &ExtractOptions,
) -> PhotoMetadata {
    let raw = match block {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!(source = %source, "No EXIF data found in image");
            return PhotoMetadata::absent(source, mime);
        }
        Err(e) => {
            warn!(source = %source, error = %e, "Metadata extraction failed, treating as absent");
            return PhotoMetadata::absent(source, mime);
        }
    };

    let record = raw.resolve();
    trace!(source = %source, fields = record.len(), "Resolved EXIF tags");

    let location = Extracted::from(extract_location(&record));
    let captured_at = Extracted::from(extract_capture_time(&record, options.time_tags));

    if let Some(e) = location.error() {
        warn!(source = %source, error = %e, "Malformed GPS data");
    }
    if let Some(e) = captured_at.error() {
        warn!(source = %source, error = %e, "Malformed capture time");
    }

    PhotoMetadata {
        make: record.text(MAKE).map(str::to_string),
        model: record.text(MODEL).map(str::to_string),
        source_file: source,
        mime_type: mime,
        tags: Some(record),
        location,
        captured_at,
    }
}

// ============================================================================
// kamadak-exif Backend
// ============================================================================

/// Read the raw tag block from a container.
///
/// `Ok(None)` when the container carries no EXIF block at all; `Ok(Some)`
/// may still hold an empty block.
pub fn read_tag_block<R: BufRead + Seek>(reader: &mut R) -> Result<Option<RawTagBlock>> {
    match exif::Reader::new().read_from_container(reader) {
        Ok(exif_data) => Ok(Some(raw_block_from_exif(&exif_data))),
        Err(exif::Error::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Flatten the primary IFD into a raw block.
///
/// IFD0 and Exif IFD fields share the top level; GPS fields go into the
/// nested `GPSInfo` block. IFD pointer tags and the interoperability IFD are
/// dropped.
pub fn raw_block_from_exif(exif_data: &exif::Exif) -> RawTagBlock {
    let mut block = RawTagBlock::new();

    for field in exif_data.fields() {
        if field.ifd_num != exif::In::PRIMARY || is_ifd_pointer(field.tag) {
            continue;
        }

        let Some(value) = convert_value(&field.value) else {
            trace!(tag = %field.tag, "Skipping field with unknown value type");
            continue;
        };

        match field.tag.context() {
            exif::Context::Gps => block.insert_gps(field.tag.number(), value),
            exif::Context::Tiff | exif::Context::Exif => block.insert(field.tag.number(), value),
            _ => {}
        }
    }

    block
}

fn is_ifd_pointer(tag: exif::Tag) -> bool {
    tag == exif::Tag::ExifIFDPointer
        || tag == exif::Tag::GPSInfoIFDPointer
        || tag == exif::Tag::InteropIFDPointer
}

/// Map a kamadak value onto the tag value model
fn convert_value(value: &exif::Value) -> Option<RawValue> {
    use exif::Value;

    let converted = match value {
        Value::Ascii(strings) => TagValue::Text(
            strings
                .first()
                .map(|s| String::from_utf8_lossy(s).trim_end_matches('\0').trim().to_string())
                .unwrap_or_default(),
        ),
        Value::Byte(v) => integers(v.iter().map(|&x| i64::from(x))),
        Value::Short(v) => integers(v.iter().map(|&x| i64::from(x))),
        Value::Long(v) => integers(v.iter().map(|&x| i64::from(x))),
        Value::SByte(v) => integers(v.iter().map(|&x| i64::from(x))),
        Value::SShort(v) => integers(v.iter().map(|&x| i64::from(x))),
        Value::SLong(v) => integers(v.iter().map(|&x| i64::from(x))),
        Value::Rational(v) => TagValue::Rational(
            v.iter()
                .map(|r| Rational::new(i64::from(r.num), i64::from(r.denom)))
                .collect(),
        ),
        Value::SRational(v) => TagValue::Rational(
            v.iter()
                .map(|r| Rational::new(i64::from(r.num), i64::from(r.denom)))
                .collect(),
        ),
        Value::Float(v) => TagValue::Float(v.iter().map(|&x| f64::from(x)).collect()),
        Value::Double(v) => TagValue::Float(v.clone()),
        Value::Undefined(bytes, _) => TagValue::Undefined(bytes.clone()),
        _ => return None,
    };

    Some(converted)
}

fn integers(values: impl Iterator<Item = i64>) -> RawValue {
    let mut values: Vec<i64> = values.collect();
    if values.len() == 1 {
        TagValue::Integer(values.remove(0))
    } else {
        TagValue::Integers(values)
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Detect MIME type from file extension
pub fn detect_mime_from_extension(path: &Path) -> String {
    let ext = path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tiff" | "tif" => "image/tiff",
        "bmp" => "image/bmp",
        "heic" | "heif" => "image/heic",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }.to_string()
}

// ============================================================================
// Tests
// ============================================================================
