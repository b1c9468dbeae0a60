//! Interaction probability model
//!
//! Turns two poses into the probability that the pair is close enough, and
//! oriented head-to-head enough, to be exchanging food. A logistic model
//! over three geometric terms, gated by hard centroid-distance bounds that
//! short-circuit to exactly 0.0 before the head terms are computed.

use crate::calibration::{ModelCalibration, HEAD_OFFSET};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Position and heading of one tracked subject in one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Hive x coordinate
    pub x: f64,
    /// Hive y coordinate
    pub y: f64,
    /// Heading angle in radians
    pub orientation: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, orientation: f64) -> Self {
        Self { x, y, orientation }
    }

    /// Euclidean distance between the two body centroids
    pub fn centroid_distance(&self, other: &Pose) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Scores a pair of poses; implemented by [`ProbabilityModel`].
///
/// Interaction sources receive an `Arc<dyn PairScorer>` so fetch-side filtering
/// is not tied to one model.
pub trait PairScorer: Send + Sync {
    fn score(&self, pose0: &Pose, pose1: &Pose) -> f64;
}

/// Approximate head position: the centroid moved [`HEAD_OFFSET`] along the heading
pub fn head_offset(pose: &Pose) -> (f64, f64) {
    (
        pose.x + HEAD_OFFSET * pose.orientation.cos(),
        pose.y + HEAD_OFFSET * pose.orientation.sin(),
    )
}

/// Distance between the approximate head positions of two poses
pub fn head_distance(pose0: &Pose, pose1: &Pose) -> f64 {
    let (hx0, hy0) = head_offset(pose0);
    let (hx1, hy1) = head_offset(pose1);
    (hx0 - hx1).hypot(hy0 - hy1)
}

/// Cosine similarity of the two heading unit vectors.
///
/// cos(a0)cos(a1) + sin(a0)sin(a1) == cos(a0 - a1); the difference form keeps
/// identical headings at exactly 1.0 and opposite headings at exactly -1.0.
pub fn heading_alignment(angle0: f64, angle1: f64) -> f64 {
    (angle0 - angle1).cos()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Score a pair with explicit weights, bias and hard centroid bounds
pub fn score_with(
    pose0: &Pose,
    pose1: &Pose,
    weights: [f64; 3],
    bias: f64,
    hard_min: f64,
    hard_max: f64,
) -> f64 {
    let centroid_distance = pose0.centroid_distance(pose1);
    if centroid_distance <= hard_min || centroid_distance >= hard_max {
        return 0.0;
    }

    let z = weights[0] * centroid_distance
        + weights[1] * head_distance(pose0, pose1)
        + weights[2] * heading_alignment(pose0.orientation, pose1.orientation)
        + bias;
    sigmoid(z)
}

/// Calibrated interaction probability model
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityModel {
    calibration: ModelCalibration,
}

impl ProbabilityModel {
    /// Create model from a calibration, rejecting invalid bounds
    pub fn new(calibration: ModelCalibration) -> Result<Self> {
        calibration.validate()?;
        Ok(Self { calibration })
    }

    /// Model with the production calibration
    pub fn production() -> Self {
        Self {
            calibration: ModelCalibration::production(),
        }
    }

    pub fn calibration(&self) -> &ModelCalibration {
        &self.calibration
    }

    /// Interaction probability for one pair, exactly 0.0 outside the hard bounds
    pub fn score(&self, pose0: &Pose, pose1: &Pose) -> f64 {
        let c = &self.calibration;
        score_with(pose0, pose1, c.weights, c.bias, c.hard_min, c.hard_max)
    }

    /// Element-wise [`score`](Self::score) over two equal-length pose sequences
    pub fn score_batch(&self, poses0: &[Pose], poses1: &[Pose]) -> Result<Vec<f64>> {
        if poses0.len() != poses1.len() {
            return Err(Error::InvalidInput(format!(
                "pose sequences differ in length: {} vs {}",
                poses0.len(),
                poses1.len()
            )));
        }
        Ok(poses0
            .iter()
            .zip(poses1)
            .map(|(p0, p1)| self.score(p0, p1))
            .collect())
    }
}

impl Default for ProbabilityModel {
    fn default() -> Self {
        Self::production()
    }
}

impl PairScorer for ProbabilityModel {
    fn score(&self, pose0: &Pose, pose1: &Pose) -> f64 {
        ProbabilityModel::score(self, pose0, pose1)
    }
}
