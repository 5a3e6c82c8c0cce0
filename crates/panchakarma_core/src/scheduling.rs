//! crates/panchakarma_core/src/scheduling.rs
//!
//! The scheduling conflict resolver: decides whether a practitioner can take a
//! new session at a given instant, and builds the per-day calendar view.

use crate::domain::{Session, SessionStatus};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use uuid::Uuid;

/// The widest window the resolver honours: one day.
pub const MAX_WINDOW_MINUTES: i64 = 24 * 60;

/// How close two sessions of the same practitioner may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictWindow {
    /// Only identical instants collide.
    #[default]
    ExactInstant,
    /// Sessions strictly closer than this collide.
    Within(Duration),
}

impl ConflictWindow {
    /// `0` selects the exact-instant rule. Anything wider than
    /// `MAX_WINDOW_MINUTES` is capped.
    pub fn from_minutes(minutes: i64) -> Self {
        if minutes <= 0 {
            ConflictWindow::ExactInstant
        } else {
            ConflictWindow::Within(Duration::minutes(minutes.min(MAX_WINDOW_MINUTES)))
        }
    }

    pub fn collides(&self, a: NaiveDateTime, b: NaiveDateTime) -> bool {
        match self {
            ConflictWindow::ExactInstant => a == b,
            ConflictWindow::Within(window) => a - b < *window && b - a < *window,
        }
    }
}

/// A slot a practitioner wants to book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCandidate {
    pub practitioner_id: Uuid,
    pub scheduled_at: NaiveDateTime,
    /// A session being moved; it never conflicts with itself.
    pub ignore_session: Option<Uuid>,
}

impl SlotCandidate {
    pub fn new(practitioner_id: Uuid, scheduled_at: NaiveDateTime) -> Self {
        Self {
            practitioner_id,
            scheduled_at,
            ignore_session: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityResult {
    pub conflicts: Vec<Session>,
    /// Live sessions on the same day, ascending by time. Informational only.
    pub day_load: Vec<Session>,
    pub bookable: bool,
}

fn occupies_slot(session: &Session, candidate: &SlotCandidate) -> bool {
    session.practitioner_id == candidate.practitioner_id
        && session.status != SessionStatus::Cancelled
        && Some(session.id) != candidate.ignore_session
}

/// Checks `candidate` against `existing` without touching any state.
///
/// Cancelled sessions free their slot. Sessions of other practitioners are
/// ignored, so callers may pass an unfiltered snapshot.
pub fn check_availability(
    candidate: &SlotCandidate,
    existing: &[Session],
    window: ConflictWindow,
) -> AvailabilityResult {
    let mut conflicts: Vec<Session> = existing
        .iter()
        .filter(|s| occupies_slot(s, candidate))
        .filter(|s| window.collides(s.scheduled_at, candidate.scheduled_at))
        .cloned()
        .collect();
    conflicts.sort_by_key(|s| s.scheduled_at);

    let day = candidate.scheduled_at.date();
    let day_load: Vec<Session> = day_view(candidate.practitioner_id, day, existing)
        .into_iter()
        .filter(|s| occupies_slot(s, candidate))
        .collect();

    AvailabilityResult {
        bookable: conflicts.is_empty(),
        conflicts,
        day_load,
    }
}

/// All of a practitioner's sessions on `date`, ascending by time.
pub fn day_view(practitioner_id: Uuid, date: NaiveDate, sessions: &[Session]) -> Vec<Session> {
    let mut day: Vec<Session> = sessions
        .iter()
        .filter(|s| s.practitioner_id == practitioner_id && s.scheduled_at.date() == date)
        .cloned()
        .collect();
    day.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
    day
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, booked};

    #[test]
    fn exact_instant_collides_and_blocks_booking() {
        let practitioner = Uuid::new_v4();
        let existing = booked(practitioner, Uuid::new_v4(), at("2024-05-01T09:00"));

        let result = check_availability(
            &SlotCandidate::new(practitioner, at("2024-05-01T09:00")),
            &[existing.clone()],
            ConflictWindow::ExactInstant,
        );

        assert!(!result.bookable);
        assert_eq!(result.conflicts, vec![existing]);
    }

    #[test]
    fn later_slot_same_day_is_bookable_and_reports_day_load() {
        let practitioner = Uuid::new_v4();
        let existing = booked(practitioner, Uuid::new_v4(), at("2024-05-01T09:00"));

        let result = check_availability(
            &SlotCandidate::new(practitioner, at("2024-05-01T10:00")),
            &[existing.clone()],
            ConflictWindow::ExactInstant,
        );

        assert!(result.bookable);
        assert!(result.conflicts.is_empty());
        assert_eq!(result.day_load, vec![existing]);
    }

    #[test]
    fn other_practitioners_and_cancelled_sessions_do_not_conflict() {
        let practitioner = Uuid::new_v4();
        let colleague = booked(Uuid::new_v4(), Uuid::new_v4(), at("2024-05-01T09:00"));
        let mut cancelled = booked(practitioner, Uuid::new_v4(), at("2024-05-01T09:00"));
        cancelled.status = SessionStatus::Cancelled;

        let result = check_availability(
            &SlotCandidate::new(practitioner, at("2024-05-01T09:00")),
            &[colleague, cancelled],
            ConflictWindow::ExactInstant,
        );

        assert!(result.bookable);
        assert!(result.day_load.is_empty());
    }

    #[test]
    fn window_policy_catches_overlapping_sessions() {
        let practitioner = Uuid::new_v4();
        let existing = booked(practitioner, Uuid::new_v4(), at("2024-05-01T09:00"));
        let window = ConflictWindow::from_minutes(60);

        let near = SlotCandidate::new(practitioner, at("2024-05-01T09:59"));
        assert!(!check_availability(&near, &[existing.clone()], window).bookable);

        let clear = SlotCandidate::new(practitioner, at("2024-05-01T10:00"));
        assert!(check_availability(&clear, &[existing], window).bookable);
    }

    #[test]
    fn moved_session_does_not_conflict_with_itself() {
        let practitioner = Uuid::new_v4();
        let existing = booked(practitioner, Uuid::new_v4(), at("2024-05-01T09:00"));
        let candidate = SlotCandidate {
            ignore_session: Some(existing.id),
            ..SlotCandidate::new(practitioner, at("2024-05-01T09:30"))
        };

        assert!(check_availability(&candidate, &[existing], ConflictWindow::from_minutes(60)).bookable);
    }

    #[test]
    fn day_view_is_sorted_and_limited_to_the_date() {
        let practitioner = Uuid::new_v4();
        let afternoon = booked(practitioner, Uuid::new_v4(), at("2024-05-01T15:00"));
        let morning = booked(practitioner, Uuid::new_v4(), at("2024-05-01T08:30"));
        let next_day = booked(practitioner, Uuid::new_v4(), at("2024-05-02T08:30"));

        let day = day_view(
            practitioner,
            at("2024-05-01T00:00").date(),
            &[afternoon.clone(), next_day, morning.clone()],
        );

        assert_eq!(day, vec![morning, afternoon]);
    }

    #[test]
    fn zero_minutes_means_exact_instant() {
        assert_eq!(ConflictWindow::from_minutes(0), ConflictWindow::ExactInstant);
    }

    #[test]
    fn oversized_window_is_capped_at_a_day() {
        assert_eq!(
            ConflictWindow::from_minutes(i64::MAX),
            ConflictWindow::Within(Duration::minutes(MAX_WINDOW_MINUTES))
        );
    }
}
