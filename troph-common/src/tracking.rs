//! Tracking database contracts
//!
//! The sweep and the archive loader only see these traits. [`crate::db::TrackingDb`]
//! is the SQLite implementation; tests substitute in-memory fakes.
//!
//! An implementor doubles as the reusable query context: one instance is
//! shared by every worker of a sweep, so connection pools and prepared
//! statements are reused across frames.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::model::{PairScorer, Pose};
use crate::types::{FrameMetadata, FrameTask};
use crate::Result;

/// Per-detection feature columns available to pair scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseFeature {
    XPosHive,
    YPosHive,
    OrientationHive,
}

impl PoseFeature {
    /// Column name in the detections table
    pub fn column(&self) -> &'static str {
        match self {
            PoseFeature::XPosHive => "x_pos_hive",
            PoseFeature::YPosHive => "y_pos_hive",
            PoseFeature::OrientationHive => "orientation_hive",
        }
    }
}

/// Features the pose scorer consumes, in `(x, y, orientation)` order
pub const POSE_FEATURES: [PoseFeature; 3] = [
    PoseFeature::XPosHive,
    PoseFeature::YPosHive,
    PoseFeature::OrientationHive,
];

/// One scored pair returned by an [`InteractionSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRow {
    pub frame_id: u64,
    pub bee_id0: u64,
    pub bee_id1: u64,
    /// Feature payload of the first detection
    pub pose0: Pose,
    /// Feature payload of the second detection
    pub pose1: Pose,
    /// Score assigned by the scorer
    pub score: f64,
}

/// Answers proximity queries for one frame
#[async_trait]
pub trait InteractionSource: Send + Sync {
    /// Pairs in `frame_id` whose score lies in `[min_distance, max_distance]`
    async fn find_interactions(
        &self,
        frame_id: u64,
        max_distance: f64,
        min_distance: f64,
        scorer: Arc<dyn PairScorer>,
        features: &[PoseFeature],
    ) -> Result<Vec<InteractionRow>>;
}

/// Enumerates the frames a camera captured in a time range
#[async_trait]
pub trait FrameIndex: Send + Sync {
    /// Frames of `cam_id` with `from_ts <= timestamp < to_ts`, ordered by capture time
    async fn frames_in_window(&self, cam_id: u16, from_ts: f64, to_ts: f64)
        -> Result<Vec<FrameTask>>;
}

/// Looks up capture timestamps for frame ids
#[async_trait]
pub trait FrameMetadataSource: Send + Sync {
    /// Metadata for the ids that are known; unknown ids are simply absent
    async fn metadata_for(&self, frame_ids: &BTreeSet<u64>) -> Result<Vec<FrameMetadata>>;
}
