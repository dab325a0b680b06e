//! soma_photo - EXIF metadata extraction and upload organization for SOMA platform
//!
//! Reads the EXIF block of uploaded photos, resolves it to named fields,
//! normalizes the GPS position to signed decimal degrees and the capture time
//! to a calendar timestamp, then stores each upload under a capture-time name.
//! A route of located photos in capture order feeds the map view.

pub mod config;
pub mod error;
pub mod gps;
pub mod metadata;
pub mod metrics;
pub mod naming;
pub mod organ;
pub mod outcome;
pub mod route;
pub mod store;
pub mod tags;
pub mod timestamp;
pub mod validation;

pub use config::{DuplicatePolicy, MetadataMode, NamingPolicy, PhotoConfig};
pub use error::{PhotoError, Result};
pub use gps::{dms_to_degrees, extract_location, GpsCoordinates, GpsError};
pub use metadata::{extract_metadata, extract_metadata_from_bytes, ExtractOptions, Extracted, PhotoMetadata};
pub use naming::{derive_filename, derive_stem, sanitize_filename, YearFormat};
pub use outcome::{OutcomeLevel, OutcomeStatus, RejectReason, UploadOutcome};
pub use route::{build_route, RoutePoint};
pub use store::PhotoStore;
pub use tags::{FieldKey, RawTagBlock, SemanticRecord, TagValue};
pub use timestamp::{extract_capture_time, parse_capture_time, CaptureTime, TimestampError};
