//! crates/panchakarma_core/src/dashboard.rs
//!
//! The practitioner's overview: caseload counters derived from their sessions.

use crate::domain::{Session, SessionStatus};
use crate::progress::{compute_progress, ProgressReport};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub total_patients: usize,
    pub total_sessions: usize,
    pub completed_sessions: usize,
    /// Scheduled or rescheduled, ascending by time.
    pub upcoming: Vec<Session>,
    /// Completed sessions still waiting for patient feedback.
    pub pending_feedback: usize,
    pub progress: ProgressReport,
}

pub fn summarize(sessions: &[Session]) -> DashboardSummary {
    let total_patients = sessions
        .iter()
        .map(|s| s.patient_id)
        .collect::<HashSet<_>>()
        .len();

    let mut upcoming: Vec<Session> = sessions
        .iter()
        .filter(|s| s.status.is_upcoming())
        .cloned()
        .collect();
    upcoming.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));

    let pending_feedback = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed && !s.has_feedback())
        .count();

    let progress = compute_progress(sessions);

    DashboardSummary {
        total_patients,
        total_sessions: progress.total_sessions,
        completed_sessions: progress.completed_sessions,
        upcoming,
        pending_feedback,
        progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, booked, feedback_for};
    use uuid::Uuid;

    #[test]
    fn counts_caseload() {
        let practitioner = Uuid::new_v4();
        let (asha, ravi) = (Uuid::new_v4(), Uuid::new_v4());

        let later = booked(practitioner, asha, at("2024-05-03T09:00"));
        let mut sooner = booked(practitioner, ravi, at("2024-05-02T09:00"));
        sooner.status = SessionStatus::Rescheduled;
        let mut done_quiet = booked(practitioner, asha, at("2024-05-01T09:00"));
        done_quiet.status = SessionStatus::Completed;
        let mut done_reviewed = booked(practitioner, ravi, at("2024-04-30T09:00"));
        done_reviewed.status = SessionStatus::Completed;
        done_reviewed.feedback = Some(feedback_for(&done_reviewed));

        let summary = summarize(&[later.clone(), sooner.clone(), done_quiet, done_reviewed]);

        assert_eq!(summary.total_patients, 2);
        assert_eq!(summary.total_sessions, 4);
        assert_eq!(summary.completed_sessions, 2);
        assert_eq!(summary.pending_feedback, 1);
        let upcoming: Vec<Uuid> = summary.upcoming.iter().map(|s| s.id).collect();
        assert_eq!(upcoming, vec![sooner.id, later.id]);
    }
}
