//! Integration tests for the camera-day sweep
//!
//! A fake tracking backend stands in for the database so tests control which
//! frames exist, which pairs each frame yields and which frames fail.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use troph_common::archive::codec::read_failed_record;
use troph_common::archive::{archive_path, failed_record_path, read_candidates, ArchiveSource};
use troph_common::model::PairScorer;
use troph_common::tracking::{FrameIndex, InteractionRow, InteractionSource, PoseFeature};
use troph_common::types::{FrameTask, Window};
use troph_common::{Error, Pose, ProbabilityModel, Result};
use troph_prefilter::{FrameProcessor, SweepRequest, SweepScheduler};

#[derive(Default)]
struct FakeTracking {
    frames: Vec<FrameTask>,
    pairs: HashMap<u64, Vec<(u64, u64)>>,
    failing_frame: Option<u64>,
    requested: Mutex<Vec<u64>>,
}

impl FakeTracking {
    fn requested(&self) -> Vec<u64> {
        let mut ids = self.requested.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl FrameIndex for FakeTracking {
    async fn frames_in_window(
        &self,
        cam_id: u16,
        from_ts: f64,
        to_ts: f64,
    ) -> Result<Vec<FrameTask>> {
        Ok(self
            .frames
            .iter()
            .filter(|f| f.cam_id == cam_id && f.timestamp >= from_ts && f.timestamp < to_ts)
            .copied()
            .collect())
    }
}

#[async_trait]
impl InteractionSource for FakeTracking {
    async fn find_interactions(
        &self,
        frame_id: u64,
        _max_distance: f64,
        _min_distance: f64,
        _scorer: Arc<dyn PairScorer>,
        _features: &[PoseFeature],
    ) -> Result<Vec<InteractionRow>> {
        self.requested.lock().unwrap().push(frame_id);
        if self.failing_frame == Some(frame_id) {
            return Err(Error::InvalidInput(format!("frame {} unavailable", frame_id)));
        }
        let pose = Pose::new(0.0, 0.0, 0.0);
        Ok(self
            .pairs
            .get(&frame_id)
            .map(|pairs| {
                pairs
                    .iter()
                    .map(|&(bee_id0, bee_id1)| InteractionRow {
                        frame_id,
                        bee_id0,
                        bee_id1,
                        pose0: pose,
                        pose1: pose,
                        score: 0.9,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
}

/// Epoch seconds of 2021-01-`d` 00:00:00 UTC
fn day_start(d: u32) -> f64 {
    1_609_459_200.0 + f64::from(d - 1) * 86_400.0
}

/// `n` frames of `cam_id` spaced ten seconds apart on day `d`, ids from `first_id`
fn frames_on(d: u32, cam_id: u16, first_id: u64, n: u64) -> Vec<FrameTask> {
    (0..n)
        .map(|i| FrameTask::new(day_start(d) + i as f64 * 10.0, first_id + i, cam_id))
        .collect()
}

fn scheduler(tracking: &Arc<FakeTracking>) -> SweepScheduler {
    let processor = FrameProcessor::new(tracking.clone(), ProbabilityModel::production());
    SweepScheduler::new(tracking.clone(), processor, 2, 3)
}

fn request(from: u32, to: u32, cameras: &[u16], output_dir: &Path) -> SweepRequest {
    SweepRequest {
        from: day(from),
        to: day(to),
        cameras: cameras.to_vec(),
        output_dir: output_dir.to_path_buf(),
    }
}

#[tokio::test]
async fn test_sweep_writes_archive_and_rerun_skips() {
    let dir = TempDir::new().unwrap();
    let mut tracking = FakeTracking {
        frames: frames_on(1, 0, 100, 4),
        ..Default::default()
    };
    tracking.pairs.insert(100, vec![(1, 2), (3, 4)]);
    tracking.pairs.insert(103, vec![(5, 6)]);
    let tracking = Arc::new(tracking);

    let summary = scheduler(&tracking)
        .run(&request(1, 1, &[0, 1], dir.path()))
        .await
        .unwrap();
    assert_eq!(summary.windows_written, 1);
    assert_eq!(summary.windows_skipped, 0);
    // Camera 1 has no frames at all
    assert_eq!(summary.windows_empty, 1);
    assert_eq!(summary.frames_submitted, 2);
    assert_eq!(summary.candidates_written, 3);
    assert!(!archive_path(dir.path(), &Window::for_day(1, day(1))).exists());

    let path = archive_path(dir.path(), &Window::for_day(0, day(1)));
    let rows = read_candidates(ArchiveSource::from_path(&path).unwrap()).unwrap();
    let flat: Vec<(u64, u16, u16)> = rows
        .iter()
        .map(|c| (c.frame_id, c.bee_id0, c.bee_id1))
        .collect();
    assert_eq!(flat, vec![(100, 1, 2), (100, 3, 4), (103, 5, 6)]);

    let written = std::fs::read(&path).unwrap();
    let requested_before = tracking.requested().len();

    let rerun = scheduler(&tracking)
        .run(&request(1, 1, &[0, 1], dir.path()))
        .await
        .unwrap();
    assert_eq!(rerun.windows_written, 0);
    assert_eq!(rerun.windows_skipped, 1);
    assert_eq!(rerun.candidates_written, 0);
    assert_eq!(tracking.requested().len(), requested_before);
    assert_eq!(std::fs::read(&path).unwrap(), written);
}

#[tokio::test]
async fn test_sweep_submits_every_third_frame() {
    let dir = TempDir::new().unwrap();
    let mut tracking = FakeTracking {
        frames: frames_on(1, 2, 10, 10),
        ..Default::default()
    };
    for id in 10..20 {
        tracking.pairs.insert(id, vec![(1, 2)]);
    }
    let tracking = Arc::new(tracking);

    let summary = scheduler(&tracking)
        .run(&request(1, 1, &[2], dir.path()))
        .await
        .unwrap();

    assert_eq!(tracking.requested(), vec![10, 13, 16, 19]);
    assert_eq!(summary.frames_submitted, 4);
    assert_eq!(summary.candidates_written, 4);
}

#[tokio::test]
async fn test_all_empty_window_writes_failed_record_only() {
    let dir = TempDir::new().unwrap();
    let tracking = Arc::new(FakeTracking {
        frames: frames_on(1, 0, 1, 7),
        ..Default::default()
    });

    let summary = scheduler(&tracking)
        .run(&request(1, 1, &[0], dir.path()))
        .await
        .unwrap();
    assert_eq!(summary.windows_written, 0);
    assert_eq!(summary.windows_empty, 1);
    assert_eq!(summary.frames_without_candidates, 3);

    let path = archive_path(dir.path(), &Window::for_day(0, day(1)));
    assert!(!path.exists());
    let failed = read_failed_record(&failed_record_path(&path)).unwrap();
    let ids: Vec<u64> = failed.iter().map(|t| t.frame_id).collect();
    assert_eq!(ids, vec![1, 4, 7]);
}

#[tokio::test]
async fn test_partially_empty_window_records_failed_frames() {
    let dir = TempDir::new().unwrap();
    let mut tracking = FakeTracking {
        frames: frames_on(1, 0, 1, 4),
        ..Default::default()
    };
    tracking.pairs.insert(4, vec![(8, 9)]);
    let tracking = Arc::new(tracking);

    let summary = scheduler(&tracking)
        .run(&request(1, 1, &[0], dir.path()))
        .await
        .unwrap();
    assert_eq!(summary.windows_written, 1);
    assert_eq!(summary.frames_without_candidates, 1);

    let path = archive_path(dir.path(), &Window::for_day(0, day(1)));
    assert!(path.is_file());
    let failed = read_failed_record(&failed_record_path(&path)).unwrap();
    assert_eq!(failed, vec![FrameTask::new(day_start(1), 1, 0)]);
}

#[tokio::test]
async fn test_task_error_aborts_sweep_and_keeps_earlier_archives() {
    let dir = TempDir::new().unwrap();
    let mut frames = frames_on(1, 0, 1, 3);
    frames.extend(frames_on(2, 0, 101, 3));
    let mut tracking = FakeTracking {
        frames,
        failing_frame: Some(101),
        ..Default::default()
    };
    tracking.pairs.insert(1, vec![(1, 2)]);
    let tracking = Arc::new(tracking);

    let err = scheduler(&tracking)
        .run(&request(1, 3, &[0], dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    assert!(archive_path(dir.path(), &Window::for_day(0, day(1))).is_file());
    assert!(!archive_path(dir.path(), &Window::for_day(0, day(2))).exists());
    // Day 3 is never reached
    assert!(!tracking.requested().iter().any(|&id| id > 200));
}

#[tokio::test]
async fn test_wide_bee_id_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut tracking = FakeTracking {
        frames: frames_on(1, 0, 1, 1),
        ..Default::default()
    };
    tracking.pairs.insert(1, vec![(70_000, 2)]);
    let tracking = Arc::new(tracking);

    let err = scheduler(&tracking)
        .run(&request(1, 1, &[0], dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SchemaViolation { column: "bee_id0", value: 70_000 }));
    assert!(!archive_path(dir.path(), &Window::for_day(0, day(1))).exists());
}

#[tokio::test]
async fn test_inverted_range_is_rejected() {
    let dir = TempDir::new().unwrap();
    let tracking = Arc::new(FakeTracking::default());

    let err = scheduler(&tracking)
        .run(&request(2, 1, &[0], dir.path()))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(tracking.requested().is_empty());
}

#[tokio::test]
async fn test_last_day_is_swept() {
    let dir = TempDir::new().unwrap();
    let mut frames = frames_on(1, 0, 1, 1);
    frames.extend(frames_on(2, 0, 2, 1));
    let mut tracking = FakeTracking {
        frames,
        ..Default::default()
    };
    tracking.pairs.insert(1, vec![(1, 2)]);
    tracking.pairs.insert(2, vec![(1, 2)]);
    let tracking = Arc::new(tracking);

    let summary = scheduler(&tracking)
        .run(&request(1, 2, &[0], dir.path()))
        .await
        .unwrap();
    assert_eq!(summary.windows_written, 2);
    assert!(archive_path(dir.path(), &Window::for_day(0, day(2))).is_file());
}
