//! Resumable camera-day sweep
//!
//! Walks a date range one day at a time, and each day camera by camera.
//! Every (camera, day) window maps to one archive; if that archive exists the
//! window is skipped, so a sweep can be re-run over an overlapping range.
//!
//! Otherwise the window's frames are enumerated, every `subsample_stride`-th
//! frame (from index 0) becomes a task, and tasks run on a bounded set of
//! workers feeding one reducer. The first failing task aborts the window and
//! the sweep; archives already written stay valid.
//!
//! The existence check is the only guard on the output directory. Two sweeps
//! over overlapping ranges can both compute a window and both write it, and
//! an interrupted write leaves a partial archive that later runs will skip.

pub mod reducer;
pub mod session;

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use troph_common::archive::{archive_path, failed_record_path, write_archive, write_failed_record};
use troph_common::tracking::FrameIndex;
use troph_common::types::{FrameTask, Window};
use troph_common::{Error, Result};

use crate::frame_processor::FrameProcessor;
pub use reducer::{WindowOutcome, WindowReducer};
pub use session::{SweepSession, SweepState, SweepSummary};

/// What to sweep and where to put it
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    /// First day (UTC)
    pub from: NaiveDate,
    /// Last day (UTC); a window starting on this day is still processed
    pub to: NaiveDate,
    pub cameras: Vec<u16>,
    pub output_dir: PathBuf,
}

/// Per-window result of [`SweepScheduler::process_window`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowReport {
    /// Archive already present
    Skipped,
    /// Every frame came back without candidates; no archive written
    Empty { frames: usize },
    /// Archive written
    Written {
        frames: usize,
        frames_without_candidates: usize,
        candidates: usize,
    },
}

/// Days from `from` through `to`, both inclusive
pub fn sweep_days(from: NaiveDate, to: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    from.iter_days().take_while(move |day| *day <= to)
}

/// Keep every `stride`-th frame, starting with the first
pub fn subsample(frames: Vec<FrameTask>, stride: usize) -> Vec<FrameTask> {
    frames.into_iter().step_by(stride.max(1)).collect()
}

/// Drives the sweep over a frame index and a frame processor
pub struct SweepScheduler {
    frames: Arc<dyn FrameIndex>,
    processor: FrameProcessor,
    workers: usize,
    subsample_stride: usize,
}

impl SweepScheduler {
    pub fn new(
        frames: Arc<dyn FrameIndex>,
        processor: FrameProcessor,
        workers: usize,
        subsample_stride: usize,
    ) -> Self {
        Self {
            frames,
            processor,
            workers: workers.max(1),
            subsample_stride: subsample_stride.max(1),
        }
    }

    /// Sweep every window of the request, skipping windows already archived
    pub async fn run(&self, request: &SweepRequest) -> Result<SweepSummary> {
        if request.to < request.from {
            return Err(Error::InvalidInput(format!(
                "sweep range ends ({}) before it starts ({})",
                request.to, request.from
            )));
        }
        std::fs::create_dir_all(&request.output_dir)?;

        let mut session = SweepSession::new();
        info!(
            run_id = %session.run_id,
            from = %request.from,
            to = %request.to,
            cameras = ?request.cameras,
            workers = self.workers,
            calibration = %self.processor.model().calibration().version,
            output_dir = %request.output_dir.display(),
            "Starting prefilter sweep"
        );

        for day in sweep_days(request.from, request.to) {
            session.transition_to(SweepState::AdvancingDay);
            for &cam_id in &request.cameras {
                session.transition_to(SweepState::AdvancingCamera);
                let window = Window::for_day(cam_id, day);

                match self
                    .process_window(&window, &request.output_dir, &mut session)
                    .await
                {
                    Ok(report) => record(&mut session.summary, report),
                    Err(e) => {
                        session.transition_to(SweepState::Failed);
                        warn!(
                            run_id = %session.run_id,
                            cam_id,
                            day = %day,
                            error = %e,
                            "Window failed, aborting sweep"
                        );
                        return Err(e);
                    }
                }
            }
            info!(
                run_id = %session.run_id,
                day = %day,
                skipped = session.summary.windows_skipped,
                written = session.summary.windows_written,
                "Day complete"
            );
        }

        session.transition_to(SweepState::Done);
        info!(
            run_id = %session.run_id,
            written = session.summary.windows_written,
            skipped = session.summary.windows_skipped,
            empty = session.summary.windows_empty,
            frames = session.summary.frames_submitted,
            candidates = session.summary.candidates_written,
            "Prefilter sweep completed"
        );
        Ok(session.summary)
    }

    /// Process one window end to end, or skip it if its archive exists
    pub async fn process_window(
        &self,
        window: &Window,
        output_dir: &Path,
        session: &mut SweepSession,
    ) -> Result<WindowReport> {
        let path = archive_path(output_dir, window);
        if path.is_file() {
            session.transition_to(SweepState::Skip);
            debug!(cam_id = window.cam_id, archive = %path.display(), "Archive exists, skipping");
            return Ok(WindowReport::Skipped);
        }

        session.transition_to(SweepState::Processing);
        let (from_ts, to_ts) = window.epoch_bounds();
        let frames = self
            .frames
            .frames_in_window(window.cam_id, from_ts, to_ts)
            .await?;
        let total_frames = frames.len();
        let tasks = subsample(frames, self.subsample_stride);
        let submitted = tasks.len();
        info!(
            cam_id = window.cam_id,
            window = %window.start.date_naive(),
            frames = total_frames,
            tasks = submitted,
            "Processing window"
        );

        session.transition_to(SweepState::Reducing);
        let outcome = self.dispatch(tasks).await?;

        session.transition_to(SweepState::Persisting);
        let frames_without_candidates = outcome.failed.len();
        if frames_without_candidates > 0 {
            write_failed_record(&failed_record_path(&path), &outcome.failed)?;
            warn!(
                cam_id = window.cam_id,
                window = %window.start.date_naive(),
                "Found {} frame IDs without interaction data! Saved for debugging",
                frames_without_candidates
            );
        }

        if !outcome.has_candidates() {
            return Ok(WindowReport::Empty { frames: submitted });
        }

        let rows = outcome.into_candidates()?;
        let candidates = rows.len();
        let archive = path.clone();
        tokio::task::spawn_blocking(move || write_archive(&archive, &rows)).await??;
        info!(
            cam_id = window.cam_id,
            archive = %path.display(),
            candidates,
            "Archive written"
        );

        Ok(WindowReport::Written {
            frames: submitted,
            frames_without_candidates,
            candidates,
        })
    }

    /// Run `tasks` with at most `workers` in flight and reduce their results.
    ///
    /// Returning early drops the join set, which aborts tasks still in flight.
    async fn dispatch(&self, tasks: Vec<FrameTask>) -> Result<WindowOutcome> {
        let total = tasks.len();
        let mut pending = tasks.into_iter();
        let mut in_flight = JoinSet::new();
        for task in pending.by_ref().take(self.workers) {
            let processor = self.processor.clone();
            in_flight.spawn(async move { processor.process_task(task).await });
        }

        let mut reducer = WindowReducer::new();
        while let Some(joined) = in_flight.join_next().await {
            reducer.merge(joined??);

            if let Some(task) = pending.next() {
                let processor = self.processor.clone();
                in_flight.spawn(async move { processor.process_task(task).await });
            }

            let done = reducer.completed();
            if done % 1000 == 0 {
                debug!(
                    progress = format!("{}/{}", done, total),
                    failed_keys = reducer.failed_count(),
                    "Window progress"
                );
            }
        }

        Ok(reducer.finish())
    }
}

fn record(summary: &mut SweepSummary, report: WindowReport) {
    match report {
        WindowReport::Skipped => summary.windows_skipped += 1,
        WindowReport::Empty { frames } => {
            summary.windows_empty += 1;
            summary.frames_submitted += frames;
            summary.frames_without_candidates += frames;
        }
        WindowReport::Written {
            frames,
            frames_without_candidates,
            candidates,
        } => {
            summary.windows_written += 1;
            summary.frames_submitted += frames;
            summary.frames_without_candidates += frames_without_candidates;
            summary.candidates_written += candidates;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn frames(n: usize) -> Vec<FrameTask> {
        (0..n)
            .map(|i| FrameTask::new(i as f64, 100 + i as u64, 0))
            .collect()
    }

    #[test]
    fn test_subsample_keeps_every_third_from_zero() {
        for n in [0usize, 1, 2, 3, 4, 7, 9, 10] {
            let kept = subsample(frames(n), 3);
            assert_eq!(kept.len(), n.div_ceil(3));
            let ids: Vec<u64> = kept.iter().map(|t| t.frame_id).collect();
            let expected: Vec<u64> = (0..n).step_by(3).map(|i| 100 + i as u64).collect();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn test_sweep_days_includes_last_day() {
        let days: Vec<NaiveDate> = sweep_days(date(2021, 1, 30), date(2021, 2, 1)).collect();
        assert_eq!(days, vec![date(2021, 1, 30), date(2021, 1, 31), date(2021, 2, 1)]);
    }

    #[test]
    fn test_sweep_days_empty_for_inverted_range() {
        assert_eq!(sweep_days(date(2021, 1, 2), date(2021, 1, 1)).count(), 0);
    }

    #[test]
    fn test_record_accumulates_summary() {
        let mut summary = SweepSummary::default();
        record(&mut summary, WindowReport::Skipped);
        record(&mut summary, WindowReport::Empty { frames: 4 });
        record(
            &mut summary,
            WindowReport::Written {
                frames: 10,
                frames_without_candidates: 3,
                candidates: 21,
            },
        );
        assert_eq!(
            summary,
            SweepSummary {
                windows_written: 1,
                windows_skipped: 1,
                windows_empty: 1,
                frames_submitted: 14,
                frames_without_candidates: 7,
                candidates_written: 21,
            }
        );
    }
}
