//! Sweep run state machine
//!
//! AdvancingDay → AdvancingCamera → (Skip | Processing → Reducing → Persisting)
//! → AdvancingCamera … → AdvancingDay … → Done

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Sweep workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Moving to the next calendar day
    AdvancingDay,
    /// Moving to the next camera of the current day
    AdvancingCamera,
    /// Window archive already exists
    Skip,
    /// Enumerating and dispatching frame tasks
    Processing,
    /// Folding task results into the window reducer
    Reducing,
    /// Writing the failed-frame record and archive
    Persisting,
    /// All windows handled
    Done,
    /// A window aborted the run
    Failed,
}

/// Counters reported at the end of a sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub windows_written: usize,
    pub windows_skipped: usize,
    /// Processed windows whose every frame had no candidates
    pub windows_empty: usize,
    pub frames_submitted: usize,
    pub frames_without_candidates: usize,
    pub candidates_written: usize,
}

/// One sweep invocation
#[derive(Debug, Clone)]
pub struct SweepSession {
    pub run_id: Uuid,
    pub state: SweepState,
    pub summary: SweepSummary,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SweepSession {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: SweepState::AdvancingDay,
            summary: SweepSummary::default(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state; entering `Done` or `Failed` stamps the end time
    pub fn transition_to(&mut self, new_state: SweepState) {
        let old_state = self.state;
        self.state = new_state;

        if matches!(new_state, SweepState::Done | SweepState::Failed) {
            self.ended_at = Some(Utc::now());
        }

        tracing::trace!(
            run_id = %self.run_id,
            from = ?old_state,
            to = ?new_state,
            "Sweep state transition"
        );
    }
}

impl Default for SweepSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_starts_advancing_day() {
        let session = SweepSession::new();
        assert_eq!(session.state, SweepState::AdvancingDay);
        assert_eq!(session.summary, SweepSummary::default());
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn test_transition_updates_state() {
        let mut session = SweepSession::new();
        session.transition_to(SweepState::AdvancingCamera);
        assert_eq!(session.state, SweepState::AdvancingCamera);
        assert!(session.ended_at.is_none());
    }

    #[test]
    fn test_terminal_states_set_end_time() {
        let mut session = SweepSession::new();
        session.transition_to(SweepState::Processing);
        assert!(session.ended_at.is_none());
        session.transition_to(SweepState::Failed);
        assert!(session.ended_at.is_some());

        let mut session = SweepSession::new();
        session.transition_to(SweepState::Done);
        assert!(session.ended_at.unwrap() >= session.started_at);
    }
}
