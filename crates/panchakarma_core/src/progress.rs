//! crates/panchakarma_core/src/progress.rs
//!
//! The phase aggregator. Every progress figure shown to patients and
//! practitioners is derived here from a flat snapshot of sessions.

use crate::domain::{Phase, Session, SessionStatus};

/// Display state of one phase on the treatment timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    /// No sessions yet; rendered with a lock marker.
    Locked,
    InProgress,
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhaseProgress {
    pub phase: Phase,
    pub total: usize,
    pub completed: usize,
    /// Rounded to a whole percent for display.
    pub percentage: u32,
    pub state: PhaseState,
    /// The phase's sessions in ascending `scheduled_at` order.
    pub sessions: Vec<Session>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    /// Always three entries, in `Phase::ALL` order.
    pub phases: Vec<PhaseProgress>,
    pub total_sessions: usize,
    pub completed_sessions: usize,
    /// Unrounded so that progress bars can animate smoothly.
    pub completion_percentage: f64,
}

impl ProgressReport {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseProgress> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// The first phase that still has unfinished sessions.
    pub fn current_phase(&self) -> Option<Phase> {
        self.phases
            .iter()
            .find(|p| p.state == PhaseState::InProgress)
            .map(|p| p.phase)
    }
}

/// Rounds half away from zero, so 50.5 becomes 51.
fn rounded_percent(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u32
}

/// Groups `sessions` by phase and computes per-phase and overall completion.
///
/// Pure and deterministic: the same snapshot in any order yields the same
/// report, so it is safe to call on every poll.
pub fn compute_progress(sessions: &[Session]) -> ProgressReport {
    let phases: Vec<PhaseProgress> = Phase::ALL
        .iter()
        .map(|&phase| {
            let mut in_phase: Vec<Session> = sessions
                .iter()
                .filter(|s| s.phase == phase)
                .cloned()
                .collect();
            in_phase.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));

            let total = in_phase.len();
            let completed = in_phase
                .iter()
                .filter(|s| s.status == SessionStatus::Completed)
                .count();
            let state = if total == 0 {
                PhaseState::Locked
            } else if completed == total {
                PhaseState::Complete
            } else {
                PhaseState::InProgress
            };

            PhaseProgress {
                phase,
                total,
                completed,
                percentage: rounded_percent(completed, total),
                state,
                sessions: in_phase,
            }
        })
        .collect();

    let total_sessions: usize = phases.iter().map(|p| p.total).sum();
    let completed_sessions: usize = phases.iter().map(|p| p.completed).sum();
    let completion_percentage = if total_sessions > 0 {
        100.0 * completed_sessions as f64 / total_sessions as f64
    } else {
        0.0
    };

    ProgressReport {
        phases,
        total_sessions,
        completed_sessions,
        completion_percentage,
    }
}
