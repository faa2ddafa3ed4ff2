//! Error types for Synheart Drowsiness

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse landmark frame: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Missing landmark index {index} (mesh has {available} points)")]
    MissingLandmark { index: usize, available: usize },

    #[error("Invalid landmark frame: {0}")]
    InvalidFrame(#[from] crate::schema::ValidationError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl ComputeError {
    /// True for errors that mean "no valid measurement this frame" rather
    /// than a broken input stream.
    pub fn is_invalid_sample(&self) -> bool {
        matches!(
            self,
            ComputeError::DegenerateGeometry(_) | ComputeError::MissingLandmark { .. }
        )
    }
}
