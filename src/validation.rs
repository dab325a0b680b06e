//! Upload checks and organ input validation against JSON schemas

use crate::config::PhotoConfig;
use crate::error::{PhotoError, Result};
use crate::naming::extension_of;
use serde_json::Value;
use tracing::debug;

/// Check an uploaded file before it is stored.
///
/// The name must carry an allowed extension, the size must be within the
/// configured limit and the bytes must sniff as an image.
pub fn validate_upload(filename: &str, bytes: &[u8], config: &PhotoConfig) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(PhotoError::ValidationError("Empty filename".to_string()));
    }

    let extension = extension_of(filename).ok_or_else(|| {
        PhotoError::UnsupportedFileType(format!("{} has no extension", filename))
    })?;
    if !config.is_allowed_extension(&extension) {
        return Err(PhotoError::UnsupportedFileType(format!(
            "{} (allowed: {})",
            extension,
            config.allowed_extensions.join(", ")
        )));
    }

    let size = bytes.len() as u64;
    if size > config.max_file_size {
        return Err(PhotoError::FileTooLarge {
            size,
            limit: config.max_file_size,
        });
    }

    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => {
            debug!(filename, mime = kind.mime_type(), "Upload content sniffed");
            Ok(())
        }
        Some(kind) => Err(PhotoError::UnsupportedFileType(format!(
            "{} content is {}",
            filename,
            kind.mime_type()
        ))),
        None => Err(PhotoError::UnsupportedFileType(format!(
            "{} content is not a recognized image",
            filename
        ))),
    }
}

/// Validate input against a JSON schema
pub fn validate_input(input: &Value, schema: &Value) -> Result<()> {
    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field_name in required {
            let field_str = field_name.as_str()
                .ok_or_else(|| PhotoError::ValidationError("Invalid schema: required field not a string".to_string()))?;

            if input.get(field_str).is_none() {
                return Err(PhotoError::ValidationError(
                    format!("Missing required field: {}", field_str)
                ));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        if let Some(input_obj) = input.as_object() {
            for (key, value) in input_obj {
                if let Some(prop_schema) = properties.get(key) {
                    validate_type(key, value, prop_schema)?;
                }
            }
        }
    }

    Ok(())
}

/// Validate that a value matches the expected type
fn validate_type(key: &str, value: &Value, schema: &Value) -> Result<()> {
    if let Some(expected_type) = schema.get("type").and_then(|t| t.as_str()) {
        let valid = match expected_type {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "array" => value.is_array(),
            "object" => value.is_object(),
            "null" => value.is_null(),
            _ => true,
        };

        if !valid {
            return Err(PhotoError::ValidationError(
                format!("Type mismatch for {}: expected {}, got {}", key, expected_type, value)
            ));
        }
    }

    Ok(())
}
