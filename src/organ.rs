//! UMA Organ Interface for soma_photo
//!
//! Exposes photo metadata extraction and upload organization through the
//! Universal Module Architecture (UMA) Stimulus/Response interface.
//!
//! ## Available Operations
//!
//! 1. `photo.metadata` - Normalized EXIF metadata of one image
//! 2. `photo.ingest` - Validate, classify and store an upload
//! 3. `photo.route` - Located photos in capture order, for the map view
//! 4. `photo.delete` - Remove a stored photo
//! 5. `photo.capabilities` - Capability card query
//! 6. `metrics` - Request and upload counters
//!
//! ## Example
//!
//! ```rust,no_run
//! use soma_photo::organ::{PhotoOrgan, Organ, Stimulus};
//! use soma_photo::PhotoConfig;
//! use serde_json::json;
//! use std::collections::HashMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let organ = PhotoOrgan::new(&PhotoConfig::default())?;
//!
//! let response = organ.stimulate(Stimulus {
//!     op: "photo.ingest".to_string(),
//!     input: json!({"source_path": "/tmp/IMG_0001.jpg"}),
//!     context: HashMap::new(),
//! }).await?;
//! println!("{}", response.output["message"]);
//! # Ok(())
//! # }
//! ```

use crate::error::PhotoError;
use crate::metadata::extract_metadata;
use crate::metrics::{Metrics, Timer};
use crate::store::PhotoStore;
use crate::validation::validate_input;
use crate::PhotoConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Operations answered by [`PhotoOrgan`]
pub const OPERATIONS: &[&str] = &[
    "photo.metadata",
    "photo.ingest",
    "photo.route",
    "photo.delete",
    "photo.capabilities",
    "metrics",
];

/// UMA Stimulus - input to organ operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stimulus {
    pub op: String,
    pub input: Value,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

/// UMA Response - output from organ operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,
    pub output: Value,
    pub latency_ms: u64,
    pub cost: Option<f64>,
}

/// Organ trait - all SOMA organs implement this
#[async_trait]
pub trait Organ: Send + Sync {
    async fn stimulate(&self, stimulus: Stimulus) -> Result<Response, OrganError>;
    fn describe(&self) -> OrganCard;
}

/// Organ-level errors
#[derive(Debug, Error)]
pub enum OrganError {
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Processing error: {0}")]
    ProcessingError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Photo error: {0}")]
    Photo(#[from] PhotoError),
}

impl OrganError {
    fn kind(&self) -> &'static str {
        match self {
            OrganError::UnsupportedOperation(_) => "UnsupportedOperation",
            OrganError::InvalidInput(_) => "InvalidInput",
            OrganError::ProcessingError(_) => "ProcessingError",
            OrganError::SerializationError(_) => "SerializationError",
            OrganError::Photo(_) => "PhotoError",
        }
    }
}

/// Organ capability card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganCard {
    pub name: String,
    pub version: String,
    pub description: String,
    pub division: String,
    pub subsystem: String,
    pub tags: Vec<String>,
    pub execution_modes: Vec<String>,
    pub functions: Vec<FunctionCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

/// Function capability card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCard {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub examples: Vec<String>,
    pub idempotent: bool,
    pub side_effects: Vec<String>,
    pub input_schema: Option<Value>,
    pub output_schema: Value,
}

/// Photo Metadata Organ
pub struct PhotoOrgan {
    store: Arc<PhotoStore>,
    metrics: Arc<Metrics>,
}

impl PhotoOrgan {
    /// Open the upload store described by `config`
    pub fn new(config: &PhotoConfig) -> crate::Result<Self> {
        Self::with_metrics(config, Metrics::new())
    }

    pub fn with_metrics(config: &PhotoConfig, metrics: Arc<Metrics>) -> crate::Result<Self> {
        Ok(Self {
            store: Arc::new(PhotoStore::open(config)?),
            metrics,
        })
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn store(&self) -> &PhotoStore {
        &self.store
    }

    fn check_input(&self, op: &str, input: &Value) -> Result<(), OrganError> {
        let card = self.describe();
        let schema = card
            .functions
            .iter()
            .find(|f| f.name == op)
            .and_then(|f| f.input_schema.as_ref());

        match schema {
            Some(schema) => validate_input(input, schema).map_err(|e| OrganError::InvalidInput(e.to_string())),
            None => Ok(()),
        }
    }

    async fn dispatch(&self, op: &str, input: Value) -> Result<Value, OrganError> {
        self.check_input(op, &input)?;

        match op {
            "photo.metadata" => self.handle_metadata(input).await,
            "photo.ingest" => self.handle_ingest(input).await,
            "photo.route" => self.handle_route().await,
            "photo.delete" => self.handle_delete(input).await,
            "photo.capabilities" => self.handle_capabilities(),
            "metrics" => Ok(json!(self.metrics.snapshot())),
            _ => Err(OrganError::UnsupportedOperation(op.to_string())),
        }
    }

    /// Handle photo.metadata operation
    async fn handle_metadata(&self, input: Value) -> Result<Value, OrganError> {
        let input_path = required_str(&input, "input_path")?;
        let options = self.store.config().extract_options();

        let metadata = extract_metadata(Path::new(input_path), &options);
        Ok(serde_json::to_value(&metadata)?)
    }

    /// Handle photo.ingest operation - read the source file and store it
    async fn handle_ingest(&self, input: Value) -> Result<Value, OrganError> {
        let source_path = PathBuf::from(required_str(&input, "source_path")?);
        let original_filename = match input.get("original_filename").and_then(Value::as_str) {
            Some(name) => name.to_string(),
            None => source_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| OrganError::InvalidInput(format!("No filename in {}", source_path.display())))?,
        };

        let bytes = tokio::fs::read(&source_path).await.map_err(|e| {
            OrganError::ProcessingError(format!("Failed to read {}: {}", source_path.display(), e))
        })?;

        let store = Arc::clone(&self.store);
        let outcome = tokio::task::spawn_blocking(move || store.ingest(&original_filename, &bytes))
            .await
            .map_err(|e| OrganError::ProcessingError(format!("Ingest task failed: {}", e)))?;

        self.metrics.record_upload(&outcome);
        Ok(serde_json::to_value(&outcome)?)
    }

    /// Handle photo.route operation
    async fn handle_route(&self) -> Result<Value, OrganError> {
        let store = Arc::clone(&self.store);
        let points = tokio::task::spawn_blocking(move || store.route())
            .await
            .map_err(|e| OrganError::ProcessingError(format!("Route task failed: {}", e)))??;

        Ok(json!({
            "count": points.len(),
            "points": points,
        }))
    }

    /// Handle photo.delete operation
    async fn handle_delete(&self, input: Value) -> Result<Value, OrganError> {
        let filename = required_str(&input, "filename")?.to_string();

        let store = Arc::clone(&self.store);
        let name = filename.clone();
        tokio::task::spawn_blocking(move || store.remove(&name))
            .await
            .map_err(|e| OrganError::ProcessingError(format!("Delete task failed: {}", e)))??;

        Ok(json!({ "deleted": filename }))
    }

    /// Handle photo.capabilities operation
    fn handle_capabilities(&self) -> Result<Value, OrganError> {
        let card = self.describe();
        serde_json::to_value(&card).map_err(OrganError::SerializationError)
    }
}

fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, OrganError> {
    input[key]
        .as_str()
        .ok_or_else(|| OrganError::InvalidInput(format!("Missing {}", key)))
}

#[async_trait]
impl Organ for PhotoOrgan {
    async fn stimulate(&self, stimulus: Stimulus) -> Result<Response, OrganError> {
        let timer = Timer::new();
        let op = stimulus.op;

        let result = self.dispatch(&op, stimulus.input).await;
        let latency = timer.elapsed_ms();
        self.metrics.record_request(&op, result.is_ok(), latency);

        let output = match result {
            Ok(output) => {
                debug!(op = %op, latency_ms = latency, "Stimulus handled");
                return Ok(Response {
                    ok: true,
                    output,
                    latency_ms: latency,
                    cost: None,
                });
            }
            Err(OrganError::UnsupportedOperation(_)) => json!({
                "error": format!("Unsupported operation: {}", op),
                "op": op,
                "available_operations": OPERATIONS,
            }),
            Err(e) => {
                warn!(op = %op, error = %e, "Stimulus failed");
                json!({
                    "error": e.to_string(),
                    "kind": e.kind(),
                    "op": op,
                })
            }
        };

        Ok(Response {
            ok: false,
            output,
            latency_ms: latency,
            cost: None,
        })
    }

    fn describe(&self) -> OrganCard {
        OrganCard {
            name: "soma_photo".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "EXIF metadata extraction and capture-time organization organ for photo uploads".to_string(),
            division: "media".to_string(),
            subsystem: "ingest".to_string(),
            tags: vec![
                "photo".to_string(),
                "exif".to_string(),
                "gps".to_string(),
                "metadata".to_string(),
                "upload".to_string(),
                "map".to_string(),
            ],
            execution_modes: vec![
                "embedded".to_string(),
                "sidecar".to_string(),
                "server".to_string(),
            ],
            author: Some("SOMA Media Team".to_string()),
            repository: None,
            functions: vec![
                FunctionCard {
                    name: "photo.metadata".to_string(),
                    description: "Read the EXIF block of an image and return resolved tags, GPS location and capture time".to_string(),
                    tags: vec!["exif".to_string(), "gps".to_string(), "metadata".to_string()],
                    examples: vec![
                        "Get the GPS position of a JPEG".to_string(),
                        "Check whether a photo carries a capture time".to_string(),
                    ],
                    idempotent: true,
                    side_effects: vec!["reads image file".to_string()],
                    input_schema: Some(json!({
                        "type": "object",
                        "properties": {
                            "input_path": { "type": "string", "description": "Path to image file" }
                        },
                        "required": ["input_path"]
                    })),
                    output_schema: json!({
                        "type": "object",
                        "properties": {
                            "source_file": { "type": "string" },
                            "mime_type": { "type": "string" },
                            "tags": { "type": "object" },
                            "location": { "type": "object" },
                            "captured_at": { "type": "object" }
                        }
                    }),
                },
                FunctionCard {
                    name: "photo.ingest".to_string(),
                    description: "Validate an upload, name it by capture time and store it; reports missing location or time".to_string(),
                    tags: vec!["upload".to_string(), "organize".to_string(), "exif".to_string()],
                    examples: vec![
                        "Store IMG_0001.jpg as 20230704_153000.jpg".to_string(),
                        "Reject a second photo taken in the same second".to_string(),
                    ],
                    idempotent: false,
                    side_effects: vec!["reads source file".to_string(), "writes upload directory".to_string()],
                    input_schema: Some(json!({
                        "type": "object",
                        "properties": {
                            "source_path": { "type": "string", "description": "Path to uploaded file" },
                            "original_filename": { "type": "string", "description": "Client-side filename (default: source file name)" }
                        },
                        "required": ["source_path"]
                    })),
                    output_schema: json!({
                        "type": "object",
                        "properties": {
                            "original_filename": { "type": "string" },
                            "stored_filename": { "type": ["string", "null"] },
                            "level": { "type": "string" },
                            "status": { "type": "object" },
                            "message": { "type": "string" }
                        }
                    }),
                },
                FunctionCard {
                    name: "photo.route".to_string(),
                    description: "List stored photos with a location, ordered by capture time, for map rendering".to_string(),
                    tags: vec!["map".to_string(), "gps".to_string()],
                    examples: vec!["Draw the travel route of an album".to_string()],
                    idempotent: true,
                    side_effects: vec!["reads upload directory".to_string()],
                    input_schema: None,
                    output_schema: json!({
                        "type": "object",
                        "properties": {
                            "count": { "type": "integer" },
                            "points": { "type": "array" }
                        }
                    }),
                },
                FunctionCard {
                    name: "photo.delete".to_string(),
                    description: "Delete a stored photo by filename".to_string(),
                    tags: vec!["upload".to_string()],
                    examples: vec!["Remove 20230704_153000.jpg".to_string()],
                    idempotent: false,
                    side_effects: vec!["deletes file".to_string()],
                    input_schema: Some(json!({
                        "type": "object",
                        "properties": {
                            "filename": { "type": "string", "description": "Stored filename" }
                        },
                        "required": ["filename"]
                    })),
                    output_schema: json!({
                        "type": "object",
                        "properties": {
                            "deleted": { "type": "string" }
                        }
                    }),
                },
                FunctionCard {
                    name: "photo.capabilities".to_string(),
                    description: "Return this capability card".to_string(),
                    tags: vec!["meta".to_string()],
                    examples: vec!["Discover photo operations".to_string()],
                    idempotent: true,
                    side_effects: vec![],
                    input_schema: None,
                    output_schema: json!({
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "version": { "type": "string" },
                            "functions": { "type": "array" }
                        }
                    }),
                },
                FunctionCard {
                    name: "metrics".to_string(),
                    description: "Request latency and upload outcome counters".to_string(),
                    tags: vec!["meta".to_string(), "observability".to_string()],
                    examples: vec!["Count duplicate uploads".to_string()],
                    idempotent: true,
                    side_effects: vec![],
                    input_schema: None,
                    output_schema: json!({
                        "type": "object",
                        "properties": {
                            "total_requests": { "type": "integer" },
                            "operations": { "type": "object" },
                            "uploads": { "type": "object" }
                        }
                    }),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn organ_in(dir: &TempDir) -> PhotoOrgan {
        PhotoOrgan::new(&PhotoConfig {
            upload_dir: dir.path().join("uploads"),
            ..Default::default()
        })
        .unwrap()
    }

    fn stimulus(op: &str, input: Value) -> Stimulus {
        Stimulus {
            op: op.to_string(),
            input,
            context: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_organ_capabilities() {
        let dir = TempDir::new().unwrap();
        let organ = organ_in(&dir);

        let response = organ.stimulate(stimulus("photo.capabilities", json!({}))).await.unwrap();
        assert!(response.ok);
        assert_eq!(response.output["name"], "soma_photo");
    }

    #[tokio::test]
    async fn test_unsupported_operation() {
        let dir = TempDir::new().unwrap();
        let organ = organ_in(&dir);

        let response = organ.stimulate(stimulus("raw.preview", json!({}))).await.unwrap();
        assert!(!response.ok);
        assert!(response.output["error"].as_str().unwrap().contains("Unsupported"));
        assert_eq!(response.output["available_operations"].as_array().unwrap().len(), OPERATIONS.len());
    }

    #[tokio::test]
    async fn test_schema_checked_before_dispatch() {
        let dir = TempDir::new().unwrap();
        let organ = organ_in(&dir);

        let response = organ.stimulate(stimulus("photo.ingest", json!({}))).await.unwrap();
        assert!(!response.ok);
        assert_eq!(response.output["kind"], "InvalidInput");

        let response = organ
            .stimulate(stimulus("photo.delete", json!({"filename": 7})))
            .await
            .unwrap();
        assert!(!response.ok);
        assert_eq!(response.output["kind"], "InvalidInput");

        let snap = organ.metrics().snapshot();
        assert_eq!(snap.failed_requests, 2);
        assert_eq!(snap.operations.photo_ingest, 1);
    }

    #[tokio::test]
    async fn test_delete_operation() {
        let dir = TempDir::new().unwrap();
        let organ = organ_in(&dir);
        std::fs::write(organ.store().root().join("a.jpg"), b"x").unwrap();

        let response = organ
            .stimulate(stimulus("photo.delete", json!({"filename": "a.jpg"})))
            .await
            .unwrap();
        assert!(response.ok);
        assert_eq!(response.output["deleted"], "a.jpg");
        assert!(!organ.store().root().join("a.jpg").exists());

        let response = organ
            .stimulate(stimulus("photo.delete", json!({"filename": "a.jpg"})))
            .await
            .unwrap();
        assert!(!response.ok);
        assert_eq!(response.output["kind"], "PhotoError");
        assert_eq!(organ.metrics().snapshot().operations.photo_delete, 2);
    }

    #[test]
    fn test_organ_card() {
        let dir = TempDir::new().unwrap();
        let card = organ_in(&dir).describe();

        assert_eq!(card.name, "soma_photo");
        assert_eq!(card.division, "media");
        assert_eq!(card.subsystem, "ingest");
        let names: Vec<&str> = card.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, OPERATIONS);
    }
}
