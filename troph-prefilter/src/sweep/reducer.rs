//! Per-window result reduction
//!
//! Task results arrive in completion order. They are keyed by
//! `(cam_id, timestamp, frame_id)`, so the reduced window does not depend on
//! arrival order.

use std::collections::BTreeMap;
use troph_common::types::{CandidateRow, FrameKey, FrameTask, InteractionCandidate};
use troph_common::Result;

use crate::frame_processor::FrameResult;

/// Accumulates the frame results of one window
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WindowReducer {
    tables: BTreeMap<FrameKey, Vec<CandidateRow>>,
    failed: Vec<FrameTask>,
    completed: usize,
}

impl WindowReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one task result in.
    ///
    /// Empty candidate tables go to the failed-frame list; others are stored
    /// under the task's key.
    pub fn merge(&mut self, result: FrameResult) {
        self.completed += 1;
        if result.candidates.is_empty() {
            self.failed.push(result.task);
        } else {
            self.tables.insert(result.task.key(), result.candidates);
        }
    }

    /// Combine two partial reductions of the same window
    pub fn combine(mut self, other: WindowReducer) -> WindowReducer {
        self.completed += other.completed;
        self.failed.extend(other.failed);
        self.tables.extend(other.tables);
        self
    }

    /// Results merged so far
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Frames that produced no candidates so far
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn finish(mut self) -> WindowOutcome {
        self.failed.sort_by_key(|task| task.key());
        WindowOutcome {
            tables: self.tables,
            failed: self.failed,
        }
    }
}

/// Reduced window, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOutcome {
    /// Candidate tables in `(cam_id, timestamp, frame_id)` order
    pub tables: BTreeMap<FrameKey, Vec<CandidateRow>>,
    /// Tasks with no candidates, in the same key order
    pub failed: Vec<FrameTask>,
}

impl WindowOutcome {
    pub fn has_candidates(&self) -> bool {
        !self.tables.is_empty()
    }

    /// Concatenate all tables and narrow ids to their persisted widths.
    ///
    /// Fails with a schema violation if a bee id does not fit in 16 bits.
    pub fn into_candidates(self) -> Result<Vec<InteractionCandidate>> {
        self.tables
            .into_values()
            .flatten()
            .map(InteractionCandidate::try_from)
            .collect()
    }
}
