//! Core types for the drowsiness pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: landmark points, ratio samples, detector events, and the per-frame
//! records handed to the logging and rendering collaborators.

use serde::{Deserialize, Serialize};

/// A 2-D landmark coordinate in pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Eye and mouth landmark regions for one face, in pixel space.
///
/// Eyes are ordered `[corner, upper, upper, corner, lower, lower]`; the mouth
/// is ordered `[top lip, bottom lip, left corner, right corner]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRegions {
    pub left_eye: [Point; 6],
    pub right_eye: [Point; 6],
    pub mouth: [Point; 4],
}

/// A single frame's aperture ratios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioSample {
    /// Mean eye aspect ratio of both eyes
    pub ear: f64,
    /// Mouth aspect ratio
    pub mar: f64,
}

/// Discrete events emitted by the temporal detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorEvent {
    /// A closed-eye run of blink length ended
    Blink,
    /// An open-mouth run of yawn length ended
    Yawn,
    /// Closed-eye run reached the drowsy threshold (one per run)
    AlarmStart,
    /// Eyes reopened while the alarm was active
    AlarmEnd,
}

/// Per-frame record for the logging collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub ear: f64,
    pub mar: f64,
    pub total_blinks: u32,
    pub total_yawns: u32,
    pub is_drowsy: bool,
}

impl FrameRecord {
    /// Record with the rounding used by the session log: time to 2 decimals,
    /// ratios to 3 decimals.
    pub fn rounded(&self) -> Self {
        Self {
            timestamp: round_to(self.timestamp, 2),
            ear: round_to(self.ear, 3),
            mar: round_to(self.mar, 3),
            ..self.clone()
        }
    }
}

/// Display state handed to the renderer after every frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Frame sequence number within the session (0-based)
    pub frame_index: u64,
    pub face_detected: bool,
    /// False when a face was present but its geometry was unusable
    pub measurement_valid: bool,
    pub ear: Option<f64>,
    pub mar: Option<f64>,
    pub total_blinks: u32,
    pub total_yawns: u32,
    /// Drowsiness alert flag for the overlay
    pub alert: bool,
    pub events: Vec<DetectorEvent>,
    /// Log record, present only for frames that reached the detector
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<FrameRecord>,
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < 1e-12);
        assert!((b.distance(&a) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_record_rounding() {
        let record = FrameRecord {
            timestamp: 1_700_000_000.126_9,
            ear: 0.234_56,
            mar: 0.612_44,
            total_blinks: 4,
            total_yawns: 1,
            is_drowsy: false,
        };
        let rounded = record.rounded();
        assert!((rounded.timestamp - 1_700_000_000.13).abs() < 1e-6);
        assert!((rounded.ear - 0.235).abs() < 1e-9);
        assert!((rounded.mar - 0.612).abs() < 1e-9);
        assert_eq!(rounded.total_blinks, 4);
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&DetectorEvent::AlarmStart).unwrap();
        assert_eq!(json, "\"alarm_start\"");
    }
}
