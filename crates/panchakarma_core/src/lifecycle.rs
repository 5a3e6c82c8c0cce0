//! crates/panchakarma_core/src/lifecycle.rs
//!
//! The session state machine.
//!
//! ```text
//! SCHEDULED ──► RESCHEDULED ──► COMPLETED
//!     │              │
//!     ├──────────────┴────────► CANCELLED
//!     └───────────────────────► COMPLETED
//! ```
//!
//! Transitions are planned here as `StatusChange` values and persisted by the
//! session store; nothing in this module performs I/O.

use crate::domain::{Actor, Role, Session, SessionStatus, StatusChange};
use crate::error::{CoreError, CoreResult};
use crate::notice::{self, Notice};
use crate::scheduling::{check_availability, ConflictWindow, SlotCandidate};
use chrono::{Duration, NaiveDateTime};

/// What the practitioner asks to happen to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRequest {
    Reschedule { to: NaiveDateTime },
    Complete,
    Cancel,
}

impl TransitionRequest {
    pub fn target(&self) -> SessionStatus {
        match self {
            TransitionRequest::Reschedule { .. } => SessionStatus::Rescheduled,
            TransitionRequest::Complete => SessionStatus::Completed,
            TransitionRequest::Cancel => SessionStatus::Cancelled,
        }
    }
}

/// How early a session may be marked completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionPolicy {
    /// `None` disables the check entirely.
    pub grace: Option<Duration>,
}

impl Default for CompletionPolicy {
    fn default() -> Self {
        Self {
            grace: Some(Duration::minutes(30)),
        }
    }
}

impl CompletionPolicy {
    pub fn disabled() -> Self {
        Self { grace: None }
    }

    fn is_premature(&self, scheduled_at: NaiveDateTime, now: NaiveDateTime) -> bool {
        match self.grace {
            Some(grace) => now + grace < scheduled_at,
            None => false,
        }
    }
}

/// Everything a transition is validated against.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub actor: Actor,
    pub now: NaiveDateTime,
    pub completion: CompletionPolicy,
    pub window: ConflictWindow,
    /// The practitioner's other sessions, consulted when rescheduling.
    pub calendar: &'a [Session],
}

fn allowed(from: SessionStatus, to: SessionStatus) -> bool {
    use SessionStatus::*;
    matches!(
        (from, to),
        (Scheduled, Rescheduled)
            | (Scheduled, Completed)
            | (Rescheduled, Completed)
            | (Scheduled, Cancelled)
            | (Rescheduled, Cancelled)
    )
}

/// The statuses `session` can move to next. Empty for terminal sessions.
pub fn next_valid_statuses(session: &Session) -> Vec<SessionStatus> {
    [
        SessionStatus::Rescheduled,
        SessionStatus::Completed,
        SessionStatus::Cancelled,
    ]
    .into_iter()
    .filter(|&to| allowed(session.status, to))
    .collect()
}

/// Validates `request` against `session` and returns the change to persist.
pub fn plan_transition(
    session: &Session,
    request: TransitionRequest,
    ctx: &TransitionContext<'_>,
) -> CoreResult<StatusChange> {
    if ctx.actor.role != Role::Practitioner || ctx.actor.id != session.practitioner_id {
        return Err(CoreError::Forbidden(format!(
            "only the owning practitioner may update session {}",
            session.id
        )));
    }

    let to = request.target();
    if !allowed(session.status, to) {
        return Err(CoreError::InvalidTransition {
            from: session.status,
            to,
        });
    }

    let rescheduled_to = match request {
        TransitionRequest::Reschedule { to: new_slot } => {
            let candidate = SlotCandidate {
                ignore_session: Some(session.id),
                ..SlotCandidate::new(session.practitioner_id, new_slot)
            };
            let availability = check_availability(&candidate, ctx.calendar, ctx.window);
            if !availability.bookable {
                return Err(CoreError::Conflict {
                    at: new_slot,
                    conflicting: availability.conflicts.iter().map(|s| s.id).collect(),
                });
            }
            Some(new_slot)
        }
        TransitionRequest::Complete => {
            if ctx.completion.is_premature(session.scheduled_at, ctx.now) {
                return Err(CoreError::PrematureCompletion {
                    session_id: session.id,
                    scheduled_at: session.scheduled_at,
                });
            }
            None
        }
        TransitionRequest::Cancel => None,
    };

    Ok(StatusChange {
        from: session.status,
        to,
        changed_at: ctx.now,
        rescheduled_to,
    })
}

/// Applies an already validated change to an in-memory session.
pub fn apply(mut session: Session, change: StatusChange) -> Session {
    session.status = change.to;
    if let Some(slot) = change.rescheduled_to {
        session.scheduled_at = slot;
    }
    session.history.push(change);
    session
}

/// The patient notices a persisted change gives rise to.
pub fn notices_for(session: &Session, change: &StatusChange) -> Vec<Notice> {
    match change.to {
        SessionStatus::Completed => notice::on_completed(session),
        SessionStatus::Rescheduled => notice::on_rescheduled(session),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::NoticeKind;
    use crate::test_support::{at, booked};
    use uuid::Uuid;

    fn ctx<'a>(session: &Session, now: &str, calendar: &'a [Session]) -> TransitionContext<'a> {
        TransitionContext {
            actor: Actor::practitioner(session.practitioner_id),
            now: at(now),
            completion: CompletionPolicy::default(),
            window: ConflictWindow::ExactInstant,
            calendar,
        }
    }

    fn all_requests() -> [TransitionRequest; 3] {
        [
            TransitionRequest::Reschedule { to: at("2024-05-03T09:00") },
            TransitionRequest::Complete,
            TransitionRequest::Cancel,
        ]
    }

    #[test]
    fn scheduled_session_accepts_every_transition() {
        let session = booked(Uuid::new_v4(), Uuid::new_v4(), at("2024-05-01T09:00"));
        for request in all_requests() {
            let change = plan_transition(&session, request, &ctx(&session, "2024-05-01T09:30", &[]))
                .expect("transition from SCHEDULED");
            assert_eq!(change.from, SessionStatus::Scheduled);
            assert_eq!(change.to, request.target());
        }
    }

    #[test]
    fn terminal_sessions_reject_every_transition() {
        for terminal in [SessionStatus::Completed, SessionStatus::Cancelled] {
            let mut session = booked(Uuid::new_v4(), Uuid::new_v4(), at("2024-05-01T09:00"));
            session.status = terminal;
            assert!(next_valid_statuses(&session).is_empty());

            for request in all_requests() {
                let err = plan_transition(&session, request, &ctx(&session, "2024-05-01T10:00", &[]))
                    .unwrap_err();
                assert_eq!(
                    err,
                    CoreError::InvalidTransition {
                        from: terminal,
                        to: request.target()
                    }
                );
            }
        }
    }

    #[test]
    fn rescheduled_session_cannot_be_moved_again() {
        let mut session = booked(Uuid::new_v4(), Uuid::new_v4(), at("2024-05-01T09:00"));
        session.status = SessionStatus::Rescheduled;

        assert_eq!(
            next_valid_statuses(&session),
            vec![SessionStatus::Completed, SessionStatus::Cancelled]
        );
        let err = plan_transition(
            &session,
            TransitionRequest::Reschedule { to: at("2024-05-04T09:00") },
            &ctx(&session, "2024-05-01T08:00", &[]),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
    }

    #[test]
    fn completing_too_early_is_rejected() {
        let session = booked(Uuid::new_v4(), Uuid::new_v4(), at("2024-05-01T09:00"));

        let err = plan_transition(
            &session,
            TransitionRequest::Complete,
            &ctx(&session, "2024-05-01T08:00", &[]),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::PrematureCompletion { .. }));

        // Inside the grace period.
        assert!(plan_transition(
            &session,
            TransitionRequest::Complete,
            &ctx(&session, "2024-05-01T08:45", &[]),
        )
        .is_ok());
    }

    #[test]
    fn disabled_completion_policy_allows_early_completion() {
        let session = booked(Uuid::new_v4(), Uuid::new_v4(), at("2024-05-01T09:00"));
        let context = TransitionContext {
            completion: CompletionPolicy::disabled(),
            ..ctx(&session, "2024-04-01T08:00", &[])
        };
        assert!(plan_transition(&session, TransitionRequest::Complete, &context).is_ok());
    }

    #[test]
    fn reschedule_into_an_occupied_slot_conflicts() {
        let practitioner = Uuid::new_v4();
        let session = booked(practitioner, Uuid::new_v4(), at("2024-05-01T09:00"));
        let other = booked(practitioner, Uuid::new_v4(), at("2024-05-02T11:00"));
        let calendar = [session.clone(), other.clone()];

        let err = plan_transition(
            &session,
            TransitionRequest::Reschedule { to: at("2024-05-02T11:00") },
            &ctx(&session, "2024-04-30T12:00", &calendar),
        )
        .unwrap_err();

        assert_eq!(
            err,
            CoreError::Conflict {
                at: at("2024-05-02T11:00"),
                conflicting: vec![other.id]
            }
        );
    }

    #[test]
    fn only_the_owning_practitioner_may_transition() {
        let session = booked(Uuid::new_v4(), Uuid::new_v4(), at("2024-05-01T09:00"));
        for actor in [Actor::practitioner(Uuid::new_v4()), Actor::patient(session.patient_id)] {
            let context = TransitionContext {
                actor,
                ..ctx(&session, "2024-05-01T09:30", &[])
            };
            let err = plan_transition(&session, TransitionRequest::Cancel, &context).unwrap_err();
            assert!(matches!(err, CoreError::Forbidden(_)));
        }
    }

    #[test]
    fn apply_records_history_and_moves_the_slot() {
        let session = booked(Uuid::new_v4(), Uuid::new_v4(), at("2024-05-01T09:00"));
        let change = plan_transition(
            &session,
            TransitionRequest::Reschedule { to: at("2024-05-05T10:00") },
            &ctx(&session, "2024-04-30T12:00", &[]),
        )
        .unwrap();

        let moved = apply(session, change.clone());

        assert_eq!(moved.status, SessionStatus::Rescheduled);
        assert_eq!(moved.scheduled_at, at("2024-05-05T10:00"));
        assert_eq!(moved.history, vec![change]);
    }

    #[test]
    fn completion_produces_recovery_guidance() {
        let session = booked(Uuid::new_v4(), Uuid::new_v4(), at("2024-05-01T09:00"));
        let change = plan_transition(
            &session,
            TransitionRequest::Complete,
            &ctx(&session, "2024-05-01T10:00", &[]),
        )
        .unwrap();
        let completed = apply(session, change.clone());

        let kinds: Vec<_> = notices_for(&completed, &change).iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NoticeKind::RecoveryGuidance, NoticeKind::FeedbackRequest]);
        assert!(notices_for(&completed, &StatusChange { to: SessionStatus::Cancelled, ..change }).is_empty());
    }
}
