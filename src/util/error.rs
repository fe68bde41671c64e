//! Error types for the catalog viewer.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for catalog and asset session operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Asset or catalog file does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Catalog document is structurally unusable
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// Asset type is not one the viewer can present
    #[error("Unsupported asset type: {0}")]
    UnsupportedAsset(String),

    /// Asset is missing a field its type requires
    #[error("Asset of type {kind} is missing required field `{field}`")]
    MissingAssetField { kind: &'static str, field: &'static str },

    /// Geometry file could not be parsed
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Image or video frame could not be decoded
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Rendering engine could not be created or used
    #[error("Render engine error: {0}")]
    Engine(String),

    /// Video decoder failed to start or stream
    #[error("Video decoder error: {0}")]
    Video(String),

    /// Background worker could not be spawned or exited early
    #[error("Worker error: {0}")]
    Worker(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image codec error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid catalog error.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::InvalidCatalog(msg.into())
    }

    /// Create an invalid geometry error.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Create a render engine error.
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// True for errors caused by the catalog entry itself rather than by I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnsupportedAsset(_) | Self::MissingAssetField { .. })
    }
}

/// Result type alias for catalog viewer operations.
pub type Result<T> = std::result::Result<T, Error>;
