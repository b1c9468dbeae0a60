//! Core data types shared by the sweep and the archive loader

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{Error, Result};

/// One pair flagged by the prefilter in one frame, at persisted widths.
///
/// Serializes as a 3-element array `(frame_id, bee_id0, bee_id1)`.
/// No ordering between `bee_id0` and `bee_id1` is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionCandidate {
    pub frame_id: u64,
    pub bee_id0: u16,
    pub bee_id1: u16,
}

/// Candidate row as produced by the fetch path, before width enforcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRow {
    pub frame_id: u64,
    pub bee_id0: u64,
    pub bee_id1: u64,
}

impl TryFrom<CandidateRow> for InteractionCandidate {
    type Error = Error;

    /// Narrow bee ids to 16 bits, failing loudly instead of truncating
    fn try_from(row: CandidateRow) -> Result<Self> {
        let narrow = |column: &'static str, value: u64| {
            u16::try_from(value).map_err(|_| Error::SchemaViolation { column, value })
        };
        Ok(Self {
            frame_id: row.frame_id,
            bee_id0: narrow("bee_id0", row.bee_id0)?,
            bee_id1: narrow("bee_id1", row.bee_id1)?,
        })
    }
}

/// One frame queued for scoring: `(timestamp, frame_id, cam_id)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameTask {
    /// Capture time, seconds since the Unix epoch
    pub timestamp: f64,
    pub frame_id: u64,
    pub cam_id: u16,
}

impl FrameTask {
    pub fn new(timestamp: f64, frame_id: u64, cam_id: u16) -> Self {
        Self {
            timestamp,
            frame_id,
            cam_id,
        }
    }

    /// Reducer key for this task's result
    pub fn key(&self) -> FrameKey {
        FrameKey {
            cam_id: self.cam_id,
            timestamp: self.timestamp,
            frame_id: self.frame_id,
        }
    }
}

/// `(cam_id, timestamp, frame_id)` key; orders by capture time within a camera
#[derive(Debug, Clone, Copy)]
pub struct FrameKey {
    pub cam_id: u16,
    pub timestamp: f64,
    pub frame_id: u64,
}

impl PartialEq for FrameKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrameKey {}

impl PartialOrd for FrameKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrameKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cam_id
            .cmp(&other.cam_id)
            .then_with(|| self.timestamp.total_cmp(&other.timestamp))
            .then_with(|| self.frame_id.cmp(&other.frame_id))
    }
}

/// One camera's one calendar day; the unit of persistence and resumability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub cam_id: u16,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    /// Day window starting at midnight UTC of `day`
    pub fn for_day(cam_id: u16, day: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&day.and_time(chrono::NaiveTime::MIN));
        Self {
            cam_id,
            start,
            end: start + Duration::days(1),
        }
    }

    /// Window bounds as epoch seconds, for frame enumeration
    pub fn epoch_bounds(&self) -> (f64, f64) {
        (self.start.timestamp() as f64, self.end.timestamp() as f64)
    }
}

/// Frame metadata from the tracking database
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub frame_id: u64,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

/// Archived candidate joined with its frame metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub frame_id: u64,
    pub bee_id0: u16,
    pub bee_id1: u16,
    pub timestamp: f64,
    pub datetime: DateTime<Utc>,
}

/// Convert epoch seconds (with fractional part) to a UTC datetime
pub fn epoch_to_datetime(timestamp: f64) -> Option<DateTime<Utc>> {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).round() as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
}
