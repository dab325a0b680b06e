use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhotoError {
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Storage error at {}: {message}", path.display())]
    StorageError { path: PathBuf, message: String },

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("EXIF decode error: {0}")]
    Exif(#[from] exif::Error),
}

pub type Result<T> = std::result::Result<T, PhotoError>;
