//! Aperture ratio extraction
//!
//! This module turns landmark geometry into scalar aperture ratios:
//! - Eye aspect ratio (EAR) from six eye points
//! - Mouth aspect ratio (MAR) from four mouth points
//! - Region selection from a full face mesh via a named index layout
//!
//! Everything here is pure. A zero-length reference segment yields
//! `ComputeError::DegenerateGeometry` instead of an infinite ratio.

use crate::error::ComputeError;
use crate::types::{FaceRegions, Point, RatioSample};
use serde::{Deserialize, Serialize};

/// Eye aspect ratio: `(|p1-p5| + |p2-p4|) / (2 * |p0-p3|)`
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> Result<f64, ComputeError> {
    let vertical_a = eye[1].distance(&eye[5]);
    let vertical_b = eye[2].distance(&eye[4]);
    let horizontal = eye[0].distance(&eye[3]);

    checked_ratio(vertical_a + vertical_b, 2.0 * horizontal, "eye corners coincide")
}

/// Mouth aspect ratio: `|p0-p1| / |p2-p3|`
pub fn mouth_aspect_ratio(mouth: &[Point; 4]) -> Result<f64, ComputeError> {
    let vertical = mouth[0].distance(&mouth[1]);
    let horizontal = mouth[2].distance(&mouth[3]);

    checked_ratio(vertical, horizontal, "mouth corners coincide")
}

/// Compute the frame's ratio sample: mean EAR of both eyes and the MAR
pub fn ratio_sample(regions: &FaceRegions) -> Result<RatioSample, ComputeError> {
    let left = eye_aspect_ratio(&regions.left_eye)?;
    let right = eye_aspect_ratio(&regions.right_eye)?;
    let mar = mouth_aspect_ratio(&regions.mouth)?;

    Ok(RatioSample {
        ear: (left + right) / 2.0,
        mar,
    })
}

fn checked_ratio(numerator: f64, denominator: f64, reason: &str) -> Result<f64, ComputeError> {
    if !numerator.is_finite() || !denominator.is_finite() {
        return Err(ComputeError::DegenerateGeometry(
            "non-finite landmark coordinate".to_string(),
        ));
    }
    if denominator <= f64::EPSILON {
        return Err(ComputeError::DegenerateGeometry(reason.to_string()));
    }
    Ok(numerator / denominator)
}

/// Landmark index tables for selecting eye and mouth points from a face mesh.
///
/// Indices must follow the point order expected by [`eye_aspect_ratio`] and
/// [`mouth_aspect_ratio`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkLayout {
    pub left_eye: [usize; 6],
    pub right_eye: [usize; 6],
    pub mouth: [usize; 4],
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self::MEDIAPIPE_FACE_MESH
    }
}

impl LandmarkLayout {
    /// MediaPipe Face Mesh (468/478 point) indices
    pub const MEDIAPIPE_FACE_MESH: LandmarkLayout = LandmarkLayout {
        left_eye: [33, 160, 158, 133, 153, 144],
        right_eye: [362, 385, 387, 263, 373, 380],
        mouth: [13, 14, 78, 308],
    };

    /// Highest index referenced by this layout
    pub fn max_index(&self) -> usize {
        self.left_eye
            .iter()
            .chain(self.right_eye.iter())
            .chain(self.mouth.iter())
            .copied()
            .max()
            .unwrap_or(0)
    }

    /// Select the eye and mouth regions from a mesh of normalized `[0, 1]`
    /// coordinates and project them into pixel space.
    ///
    /// Coordinates are truncated to whole pixels, matching what a frame
    /// buffer lookup would produce.
    pub fn extract(
        &self,
        mesh: &[Point],
        frame_width: u32,
        frame_height: u32,
    ) -> Result<FaceRegions, ComputeError> {
        let width = f64::from(frame_width);
        let height = f64::from(frame_height);

        let project = |index: usize| -> Result<Point, ComputeError> {
            let p = mesh.get(index).ok_or(ComputeError::MissingLandmark {
                index,
                available: mesh.len(),
            })?;
            Ok(Point::new((p.x * width).trunc(), (p.y * height).trunc()))
        };

        Ok(FaceRegions {
            left_eye: select(&self.left_eye, &project)?,
            right_eye: select(&self.right_eye, &project)?,
            mouth: select(&self.mouth, &project)?,
        })
    }
}

fn select<const N: usize>(
    indices: &[usize; N],
    project: &impl Fn(usize) -> Result<Point, ComputeError>,
) -> Result<[Point; N], ComputeError> {
    let mut points = [Point::default(); N];
    for (slot, &index) in points.iter_mut().zip(indices.iter()) {
        *slot = project(index)?;
    }
    Ok(points)
}
