//! Upload store
//!
//! Owns the destination directory. Each upload is written to a temp file in
//! that directory, inspected, and then renamed into place under the store
//! lock so that at most one file exists per derived name.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{DuplicatePolicy, MetadataMode, NamingPolicy, PhotoConfig};
use crate::error::{PhotoError, Result};
use crate::gps::GpsCoordinates;
use crate::metadata::{extract_metadata, Extracted, PhotoMetadata};
use crate::naming::{derive_filename, extension_of, sanitize_filename};
use crate::outcome::{RejectReason, UploadOutcome};
use crate::route::{build_route, RoutePoint};
use crate::timestamp::CaptureTime;
use crate::validation::validate_upload;

/// Which naming path produced a target name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameSource {
    CaptureTime,
    Upload,
}

pub struct PhotoStore {
    root: PathBuf,
    config: PhotoConfig,
    /// Serializes the exists-check and rename of the namespace
    namespace: Mutex<()>,
}

impl PhotoStore {
    /// Open the store, creating the upload directory if needed
    pub fn open(config: &PhotoConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.upload_dir).map_err(|e| PhotoError::StorageError {
            path: config.upload_dir.clone(),
            message: e.to_string(),
        })?;

        info!(dir = %config.upload_dir.display(), "Photo store ready");
        Ok(Self {
            root: config.upload_dir.clone(),
            config: config.clone(),
            namespace: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &PhotoConfig {
        &self.config
    }

    /// Validate, inspect and store one upload.
    ///
    /// Never returns an error: every failure becomes a rejected outcome.
    pub fn ingest(&self, original_filename: &str, bytes: &[u8]) -> UploadOutcome {
        if let Err(e) = validate_upload(original_filename, bytes, &self.config) {
            debug!(file = original_filename, error = %e, "Upload rejected by validation");
            return UploadOutcome::rejected(original_filename, RejectReason::InvalidFile(e.to_string()));
        }

        let staged = match self.stage(bytes) {
            Ok(file) => file,
            Err(e) => {
                warn!(file = original_filename, error = %e, "Failed to stage upload");
                return UploadOutcome::rejected(original_filename, RejectReason::ProcessingFailed(e.to_string()));
            }
        };

        let metadata = extract_metadata(staged.path(), &self.config.extract_options());
        let (location, captured_at) = match self.usable_metadata(metadata) {
            Ok(fields) => fields,
            Err(reason) => {
                info!(file = original_filename, reason = reason.detail(), "Upload rejected");
                return UploadOutcome::rejected(original_filename, reason);
            }
        };

        let (target_name, source) = self.target_name(original_filename, captured_at.as_ref().map(|t| t.literal()));
        match self.persist(staged, &target_name, source) {
            Ok(()) => {
                info!(file = original_filename, stored = %target_name, "Upload stored");
                UploadOutcome::stored(original_filename, target_name, location, captured_at)
            }
            Err(reason) => {
                info!(file = original_filename, reason = reason.detail(), "Upload rejected");
                UploadOutcome::rejected(original_filename, reason)
            }
        }
    }

    /// Ingest a batch; each file is handled on its own
    pub fn ingest_all<'a, I>(&self, uploads: I) -> Vec<UploadOutcome>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        uploads
            .into_iter()
            .map(|(name, bytes)| self.ingest(name, bytes))
            .collect()
    }

    fn stage(&self, bytes: &[u8]) -> std::io::Result<NamedTempFile> {
        let mut staged = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(&self.root)?;
        staged.write_all(bytes)?;
        staged.as_file().sync_all()?;
        Ok(staged)
    }

    /// Apply the metadata mode to the extracted fields
    fn usable_metadata(
        &self,
        metadata: PhotoMetadata,
    ) -> std::result::Result<(Option<GpsCoordinates>, Option<CaptureTime>), RejectReason> {
        let strict = self.config.metadata_mode == MetadataMode::Strict;

        let location = match metadata.location {
            Extracted::Found(coords) => Some(coords),
            Extracted::Missing => None,
            Extracted::Malformed(e) if strict => {
                return Err(RejectReason::MalformedMetadata(format!("GPS: {}", e)))
            }
            Extracted::Malformed(_) => None,
        };

        let captured_at = match metadata.captured_at {
            Extracted::Found(time) => Some(time),
            Extracted::Missing => None,
            Extracted::Malformed(e) if strict => {
                return Err(RejectReason::MalformedMetadata(format!("capture time: {}", e)))
            }
            Extracted::Malformed(_) => None,
        };

        Ok((location, captured_at))
    }

    fn target_name(&self, original_filename: &str, capture_literal: Option<String>) -> (String, NameSource) {
        if self.config.naming == NamingPolicy::CaptureTime {
            let extension = extension_of(original_filename).unwrap_or_default();
            if let Some(name) =
                capture_literal.and_then(|literal| derive_filename(&literal, &extension, self.config.year_format))
            {
                return (name, NameSource::CaptureTime);
            }
            debug!(file = original_filename, "No capture time, keeping upload name");
        }

        (sanitize_filename(original_filename), NameSource::Upload)
    }

    fn persist(
        &self,
        staged: NamedTempFile,
        target_name: &str,
        source: NameSource,
    ) -> std::result::Result<(), RejectReason> {
        let target = self.root.join(target_name);

        // A poisoned lock only means another upload panicked mid-rename
        let _guard = self.namespace.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let result = match self.config.on_duplicate {
            DuplicatePolicy::Reject => staged.persist_noclobber(&target),
            DuplicatePolicy::Overwrite => staged.persist(&target),
        };

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Err(match source {
                NameSource::CaptureTime => RejectReason::DuplicateCaptureTime(target_name.to_string()),
                NameSource::Upload => RejectReason::DuplicateFilename(target_name.to_string()),
            }),
            Err(e) => Err(RejectReason::ProcessingFailed(e.error.to_string())),
        }
    }

    /// Names of stored photos, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let allowed = extension_of(&name).is_some_and(|ext| self.config.is_allowed_extension(&ext));
            if !name.starts_with('.') && allowed {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Map points for every stored photo with a location, in capture order
    pub fn route(&self) -> Result<Vec<RoutePoint>> {
        let options = self.config.extract_options();
        let photos: Vec<(String, PhotoMetadata)> = self
            .list()?
            .into_iter()
            .map(|name| {
                let metadata = extract_metadata(&self.root.join(&name), &options);
                (name, metadata)
            })
            .collect();
        Ok(build_route(&photos))
    }

    /// Delete a stored photo by name
    pub fn remove(&self, name: &str) -> Result<()> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(PhotoError::ValidationError(format!("Invalid filename: {}", name)));
        }

        let path = self.root.join(name);
        let _guard = self.namespace.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        fs::remove_file(&path).map_err(|e| PhotoError::StorageError {
            path,
            message: e.to_string(),
        })?;
        info!(file = name, "Photo removed");
        Ok(())
    }
}
