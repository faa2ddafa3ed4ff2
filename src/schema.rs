//! landmark_frame.v1 input schema
//!
//! One record per video frame from the landmark-detection collaborator.
//! A frame carries either no face, a full normalized face mesh (selected
//! through a [`LandmarkLayout`]), or pre-selected eye/mouth regions already in
//! pixel space.

use crate::error::ComputeError;
use crate::geometry::LandmarkLayout;
use crate::types::{FaceRegions, Point};
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "landmark_frame.v1";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Face landmarks for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FaceLandmarks {
    /// Full face mesh in normalized `[0, 1]` coordinates
    Mesh { mesh: Vec<Point> },
    /// Eye and mouth points in pixel space
    Regions(FaceRegions),
}

/// A single landmark frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Capture time in seconds since the Unix epoch; the processor clock is
    /// used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    pub frame_width: u32,
    pub frame_height: u32,
    /// `None` when no face was detected
    #[serde(default)]
    pub face: Option<FaceLandmarks>,
}

impl LandmarkFrame {
    /// Frame with no detected face
    pub fn no_face(frame_width: u32, frame_height: u32) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            timestamp: None,
            frame_width,
            frame_height,
            face: None,
        }
    }

    /// Frame with pixel-space regions
    pub fn with_regions(frame_width: u32, frame_height: u32, regions: FaceRegions) -> Self {
        Self {
            face: Some(FaceLandmarks::Regions(regions)),
            ..Self::no_face(frame_width, frame_height)
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }

    /// Eye and mouth regions in pixel space, or `None` for a no-face frame
    pub fn regions(&self, layout: &LandmarkLayout) -> Result<Option<FaceRegions>, ComputeError> {
        match &self.face {
            None => Ok(None),
            Some(FaceLandmarks::Regions(regions)) => Ok(Some(regions.clone())),
            Some(FaceLandmarks::Mesh { mesh }) => layout
                .extract(mesh, self.frame_width, self.frame_height)
                .map(Some),
        }
    }

    /// Check structural validity of the frame
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ValidationError::InvalidFrameSize {
                width: self.frame_width,
                height: self.frame_height,
            });
        }

        if let Some(ts) = self.timestamp {
            if !ts.is_finite() {
                return Err(ValidationError::InvalidTimestamp);
            }
        }

        let points: Box<dyn Iterator<Item = &Point>> = match &self.face {
            None => Box::new(std::iter::empty()),
            Some(FaceLandmarks::Mesh { mesh }) => Box::new(mesh.iter()),
            Some(FaceLandmarks::Regions(r)) => Box::new(
                r.left_eye
                    .iter()
                    .chain(r.right_eye.iter())
                    .chain(r.mouth.iter()),
            ),
        };
        if let Some(index) = points.into_iter().position(|p| !p.is_finite()) {
            return Err(ValidationError::NonFiniteCoordinate { index });
        }

        Ok(())
    }
}

/// Validation errors for landmark frames
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Invalid frame size {width}x{height}")]
    InvalidFrameSize { width: u32, height: u32 },

    #[error("Timestamp is not a finite number")]
    InvalidTimestamp,

    #[error("Landmark {index} has a non-finite coordinate")]
    NonFiniteCoordinate { index: usize },
}

/// Parser for landmark frame streams
pub struct FrameAdapter;

impl FrameAdapter {
    /// Parse a single JSON frame
    pub fn parse_frame(json: &str) -> Result<LandmarkFrame, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a JSON array of frames
    pub fn parse_array(json: &str) -> Result<Vec<LandmarkFrame>, ComputeError> {
        let frames: Vec<LandmarkFrame> = serde_json::from_str(json)?;
        Ok(frames)
    }

    /// Parse NDJSON (one frame per line, blank lines ignored)
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<LandmarkFrame>, ComputeError> {
        let mut frames = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<LandmarkFrame>(trimmed) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(frames)
    }

    /// Validate a batch of frames, returning only the failures
    pub fn validate_frames(frames: &[LandmarkFrame]) -> Vec<FrameValidation> {
        frames
            .iter()
            .enumerate()
            .filter_map(|(index, frame)| {
                frame
                    .validate()
                    .err()
                    .map(|error| FrameValidation { index, error })
            })
            .collect()
    }
}

/// A frame that failed validation
#[derive(Debug, Clone)]
pub struct FrameValidation {
    pub index: usize,
    pub error: ValidationError,
}
