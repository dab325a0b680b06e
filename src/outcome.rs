//! Per-upload result reported back to the caller

use crate::gps::GpsCoordinates;
use crate::timestamp::CaptureTime;
use serde::{Serialize, Serializer};

/// Why an upload was not stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    /// Bad name, extension, size or content
    InvalidFile(String),
    /// A photo with the same capture-time name already exists
    DuplicateCaptureTime(String),
    /// The kept upload name is already taken
    DuplicateFilename(String),
    /// GPS or time data present but unusable (strict mode)
    MalformedMetadata(String),
    /// Write or rename failed
    ProcessingFailed(String),
}

impl RejectReason {
    pub fn detail(&self) -> &str {
        match self {
            RejectReason::InvalidFile(d)
            | RejectReason::DuplicateCaptureTime(d)
            | RejectReason::DuplicateFilename(d)
            | RejectReason::MalformedMetadata(d)
            | RejectReason::ProcessingFailed(d) => d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    MissingLocation,
    MissingTime,
    MissingBoth,
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeLevel {
    Success,
    Warning,
    Error,
}

impl OutcomeStatus {
    /// Status of a stored upload from which metadata it carried
    pub fn classify(has_location: bool, has_time: bool) -> Self {
        match (has_location, has_time) {
            (true, true) => OutcomeStatus::Success,
            (false, true) => OutcomeStatus::MissingLocation,
            (true, false) => OutcomeStatus::MissingTime,
            (false, false) => OutcomeStatus::MissingBoth,
        }
    }

    pub fn level(&self) -> OutcomeLevel {
        match self {
            OutcomeStatus::Success => OutcomeLevel::Success,
            OutcomeStatus::MissingLocation | OutcomeStatus::MissingTime | OutcomeStatus::MissingBoth => {
                OutcomeLevel::Warning
            }
            OutcomeStatus::Rejected(_) => OutcomeLevel::Error,
        }
    }

    pub fn message(&self) -> String {
        match self {
            OutcomeStatus::Success => "File uploaded successfully.".to_string(),
            OutcomeStatus::MissingLocation => "Image has no location information.".to_string(),
            OutcomeStatus::MissingTime => "Image has no capture time information.".to_string(),
            OutcomeStatus::MissingBoth => "Image has neither location nor capture time information.".to_string(),
            OutcomeStatus::Rejected(RejectReason::InvalidFile(d)) => format!("Invalid file: {}", d),
            OutcomeStatus::Rejected(RejectReason::DuplicateCaptureTime(d)) => {
                format!("A photo taken at the same time is already stored: {}", d)
            }
            OutcomeStatus::Rejected(RejectReason::DuplicateFilename(d)) => {
                format!("A file with the same name is already stored: {}", d)
            }
            OutcomeStatus::Rejected(RejectReason::MalformedMetadata(d)) => format!("Unreadable photo metadata: {}", d),
            OutcomeStatus::Rejected(RejectReason::ProcessingFailed(d)) => {
                format!("An error occurred while processing the file: {}", d)
            }
        }
    }

    pub fn is_stored(&self) -> bool {
        !matches!(self, OutcomeStatus::Rejected(_))
    }
}

/// Result of one upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub original_filename: String,
    pub stored_filename: Option<String>,
    pub location: Option<GpsCoordinates>,
    #[serde(serialize_with = "serialize_capture_time")]
    pub captured_at: Option<CaptureTime>,
    pub level: OutcomeLevel,
    pub status: OutcomeStatus,
    pub message: String,
}

fn serialize_capture_time<S: Serializer>(
    value: &Option<CaptureTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(time) => serializer.serialize_some(&time.display()),
        None => serializer.serialize_none(),
    }
}

impl UploadOutcome {
    pub fn stored(
        original_filename: impl Into<String>,
        stored_filename: impl Into<String>,
        location: Option<GpsCoordinates>,
        captured_at: Option<CaptureTime>,
    ) -> Self {
        let status = OutcomeStatus::classify(location.is_some(), captured_at.is_some());
        Self {
            original_filename: original_filename.into(),
            stored_filename: Some(stored_filename.into()),
            location,
            captured_at,
            level: status.level(),
            message: status.message(),
            status,
        }
    }

    pub fn rejected(original_filename: impl Into<String>, reason: RejectReason) -> Self {
        let status = OutcomeStatus::Rejected(reason);
        Self {
            original_filename: original_filename.into(),
            stored_filename: None,
            location: None,
            captured_at: None,
            level: status.level(),
            message: status.message(),
            status,
        }
    }

    /// Rejected because the target name was taken, by either naming path
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self.status,
            OutcomeStatus::Rejected(RejectReason::DuplicateCaptureTime(_) | RejectReason::DuplicateFilename(_))
        )
    }
}
