//! Upload and organization policy

use crate::error::{PhotoError, Result};
use crate::metadata::ExtractOptions;
use crate::naming::YearFormat;
use crate::timestamp::{CAPTURE_TIME_TAGS, EXIF_CAPTURE_TIME_TAGS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How stored files are named
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// Rename to the capture time; keep the sanitized upload name when there is none
    #[default]
    CaptureTime,
    /// Keep the sanitized upload name
    Original,
}

/// What happens when the target name is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    Overwrite,
}

/// Treatment of present-but-unusable GPS or time data at upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataMode {
    /// Reject the upload
    #[default]
    Strict,
    /// Treat it as missing
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    pub upload_dir: PathBuf,
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub naming: NamingPolicy,
    pub year_format: YearFormat,
    pub on_duplicate: DuplicatePolicy,
    pub metadata_mode: MetadataMode,
    /// Use the generic IFD0 `DateTime` when no capture-specific tag exists
    pub use_generic_datetime: bool,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_file_size: 5 * 1024 * 1024, // 5MB
            allowed_extensions: vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()],
            naming: NamingPolicy::CaptureTime,
            year_format: YearFormat::Full,
            on_duplicate: DuplicatePolicy::Reject,
            metadata_mode: MetadataMode::Strict,
            use_generic_datetime: true,
        }
    }
}

impl PhotoConfig {
    /// Load from a JSON file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| PhotoError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(PhotoError::ConfigError("max_file_size must be positive".to_string()));
        }
        if self.allowed_extensions.is_empty() {
            return Err(PhotoError::ConfigError("allowed_extensions is empty".to_string()));
        }
        Ok(())
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            time_tags: if self.use_generic_datetime {
                CAPTURE_TIME_TAGS
            } else {
                EXIF_CAPTURE_TIME_TAGS
            },
        }
    }

    pub fn is_allowed_extension(&self, extension: &str) -> bool {
        self.allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}
