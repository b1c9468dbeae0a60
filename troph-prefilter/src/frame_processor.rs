//! Per-frame candidate fetching
//!
//! Adapts one [`FrameTask`] into a proximity query against the tracking
//! database and normalizes the scored pairs into candidate rows.

use std::sync::Arc;
use tracing::trace;
use troph_common::model::PairScorer;
use troph_common::tracking::{InteractionSource, POSE_FEATURES};
use troph_common::types::{CandidateRow, FrameTask};
use troph_common::{ProbabilityModel, Result};

/// Outcome of one frame task: the task plus its (possibly empty) candidate table
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub task: FrameTask,
    pub candidates: Vec<CandidateRow>,
}

/// Scores frames against an interaction source.
///
/// Cheap to clone; every worker of a sweep holds a clone sharing the same
/// source and model.
#[derive(Clone)]
pub struct FrameProcessor {
    source: Arc<dyn InteractionSource>,
    model: Arc<ProbabilityModel>,
}

impl FrameProcessor {
    pub fn new(source: Arc<dyn InteractionSource>, model: ProbabilityModel) -> Self {
        Self {
            source,
            model: Arc::new(model),
        }
    }

    pub fn model(&self) -> &ProbabilityModel {
        &self.model
    }

    /// Candidate pairs of one frame whose score lies in `[min_distance, max_distance]`
    pub async fn fetch_candidates(
        &self,
        task: &FrameTask,
        max_distance: f64,
        min_distance: f64,
        scorer: Arc<dyn PairScorer>,
    ) -> Result<FrameResult> {
        let rows = self
            .source
            .find_interactions(task.frame_id, max_distance, min_distance, scorer, &POSE_FEATURES)
            .await?;

        let candidates = rows
            .iter()
            .map(|row| CandidateRow {
                frame_id: row.frame_id,
                bee_id0: row.bee_id0,
                bee_id1: row.bee_id1,
            })
            .collect::<Vec<_>>();

        trace!(
            frame_id = task.frame_id,
            cam_id = task.cam_id,
            candidates = candidates.len(),
            "Fetched frame"
        );
        Ok(FrameResult {
            task: *task,
            candidates,
        })
    }

    /// Fetch with the calibrated model at its high-recall operating point
    pub async fn high_recall_fetch(&self, task: &FrameTask) -> Result<FrameResult> {
        let calibration = self.model.calibration();
        let (max_distance, min_distance) =
            (calibration.upper_cutoff, calibration.high_recall_threshold);
        let scorer: Arc<dyn PairScorer> = self.model.clone();
        self.fetch_candidates(task, max_distance, min_distance, scorer)
            .await
    }

    /// Unit of work submitted to the sweep's worker pool
    pub async fn process_task(&self, task: FrameTask) -> Result<FrameResult> {
        self.high_recall_fetch(&task).await
    }
}
