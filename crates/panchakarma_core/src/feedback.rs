//! crates/panchakarma_core/src/feedback.rs
//!
//! The feedback linker: validates a patient's feedback form and ties it to
//! exactly one eligible session.

use crate::domain::{Feedback, FeedbackInput, Session, SessionStatus};
use crate::error::{CoreError, CoreResult, Ineligibility};
use chrono::NaiveDateTime;
use uuid::Uuid;

pub const RATING_RANGE: std::ops::RangeInclusive<i32> = 1..=5;
pub const IMPROVEMENT_RANGE: std::ops::RangeInclusive<i32> = 1..=10;

/// Checks the form fields, independent of any session.
pub fn validate(input: &FeedbackInput) -> CoreResult<()> {
    if !RATING_RANGE.contains(&input.rating) {
        return Err(CoreError::Validation(format!(
            "rating must be between 1 and 5, got {}",
            input.rating
        )));
    }
    if input.message.trim().is_empty() {
        return Err(CoreError::Validation("message must not be empty".to_string()));
    }
    if let Some(level) = input.improvement_level {
        if !IMPROVEMENT_RANGE.contains(&level) {
            return Err(CoreError::Validation(format!(
                "improvement level must be between 1 and 10, got {}",
                level
            )));
        }
    }
    Ok(())
}

fn ineligibility(patient_id: Uuid, session: &Session) -> Option<Ineligibility> {
    if session.patient_id != patient_id {
        Some(Ineligibility::WrongOwner)
    } else if session.has_feedback() {
        Some(Ineligibility::AlreadyHasFeedback)
    } else if session.status != SessionStatus::Scheduled {
        Some(Ineligibility::WrongStatus(session.status))
    } else {
        None
    }
}

/// The sessions `patient_id` may still leave feedback on.
pub fn eligible_sessions(patient_id: Uuid, sessions: &[Session]) -> Vec<&Session> {
    sessions
        .iter()
        .filter(|s| ineligibility(patient_id, s).is_none())
        .collect()
}

/// Links `input` to its session and returns the session carrying the new
/// feedback. Persisting it is left to the caller.
pub fn attach_feedback(
    input: &FeedbackInput,
    patient_id: Uuid,
    sessions: &[Session],
    now: NaiveDateTime,
) -> CoreResult<Session> {
    validate(input)?;

    let session = sessions
        .iter()
        .find(|s| s.id == input.session_id)
        .ok_or(CoreError::SessionNotEligible {
            session_id: input.session_id,
            reason: Ineligibility::UnknownSession,
        })?;

    if let Some(reason) = ineligibility(patient_id, session) {
        return Err(CoreError::SessionNotEligible {
            session_id: session.id,
            reason,
        });
    }

    let mut linked = session.clone();
    linked.feedback = Some(Feedback {
        id: Uuid::new_v4(),
        session_id: session.id,
        patient_id,
        // Range checked by `validate`.
        rating: input.rating as u8,
        message: input.message.trim().to_string(),
        symptoms: input.symptoms.clone().filter(|s| !s.trim().is_empty()),
        side_effects: input.side_effects.clone().filter(|s| !s.trim().is_empty()),
        improvement_level: input.improvement_level.map(|l| l as u8),
        created_at: now,
    });
    Ok(linked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{at, booked, feedback_for};

    fn form(session_id: Uuid, rating: i32) -> FeedbackInput {
        FeedbackInput {
            session_id,
            rating,
            message: "Much calmer after Shirodhara".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn links_feedback_to_an_eligible_session() {
        let patient = Uuid::new_v4();
        let session = booked(Uuid::new_v4(), patient, at("2024-05-01T09:00"));
        let input = FeedbackInput {
            improvement_level: Some(7),
            symptoms: Some("  ".to_string()),
            ..form(session.id, 5)
        };

        let linked = attach_feedback(&input, patient, &[session.clone()], at("2024-05-01T11:00")).unwrap();

        let feedback = linked.feedback.expect("feedback attached");
        assert_eq!(feedback.session_id, session.id);
        assert_eq!(feedback.rating, 5);
        assert_eq!(feedback.improvement_level, Some(7));
        assert_eq!(feedback.symptoms, None);
        assert_eq!(feedback.created_at, at("2024-05-01T11:00"));
    }

    #[test]
    fn rejects_out_of_range_ratings() {
        let patient = Uuid::new_v4();
        let session = booked(Uuid::new_v4(), patient, at("2024-05-01T09:00"));
        for rating in [0, 6] {
            let err = attach_feedback(&form(session.id, rating), patient, &[session.clone()], at("2024-05-01T11:00"))
                .unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "rating {}", rating);
        }
    }

    #[test]
    fn rejects_blank_message_and_bad_improvement_level() {
        let input = FeedbackInput {
            message: "   ".to_string(),
            ..form(Uuid::new_v4(), 3)
        };
        assert!(matches!(validate(&input), Err(CoreError::Validation(_))));

        let input = FeedbackInput {
            improvement_level: Some(11),
            ..form(Uuid::new_v4(), 3)
        };
        assert!(matches!(validate(&input), Err(CoreError::Validation(_))));
    }

    #[test]
    fn rejects_a_session_that_already_has_feedback() {
        let patient = Uuid::new_v4();
        let mut session = booked(Uuid::new_v4(), patient, at("2024-05-01T09:00"));
        session.feedback = Some(feedback_for(&session));

        let err = attach_feedback(&form(session.id, 4), patient, &[session.clone()], at("2024-05-01T11:00"))
            .unwrap_err();
        assert_eq!(
            err,
            CoreError::SessionNotEligible {
                session_id: session.id,
                reason: Ineligibility::AlreadyHasFeedback
            }
        );
    }

    #[test]
    fn rejects_wrong_owner_and_wrong_status() {
        let patient = Uuid::new_v4();
        let foreign = booked(Uuid::new_v4(), Uuid::new_v4(), at("2024-05-01T09:00"));
        let mut cancelled = booked(Uuid::new_v4(), patient, at("2024-05-02T09:00"));
        cancelled.status = SessionStatus::Cancelled;
        let sessions = [foreign.clone(), cancelled.clone()];

        let err = attach_feedback(&form(foreign.id, 4), patient, &sessions, at("2024-05-03T09:00")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::SessionNotEligible { reason: Ineligibility::WrongOwner, .. }
        ));

        let err = attach_feedback(&form(cancelled.id, 4), patient, &sessions, at("2024-05-03T09:00")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::SessionNotEligible {
                reason: Ineligibility::WrongStatus(SessionStatus::Cancelled),
                ..
            }
        ));

        let err = attach_feedback(&form(Uuid::new_v4(), 4), patient, &sessions, at("2024-05-03T09:00")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::SessionNotEligible { reason: Ineligibility::UnknownSession, .. }
        ));
    }

    #[test]
    fn eligible_sessions_filters_to_open_scheduled_sessions() {
        let patient = Uuid::new_v4();
        let open = booked(Uuid::new_v4(), patient, at("2024-05-01T09:00"));
        let mut done = booked(Uuid::new_v4(), patient, at("2024-05-02T09:00"));
        done.status = SessionStatus::Completed;
        let mut answered = booked(Uuid::new_v4(), patient, at("2024-05-03T09:00"));
        answered.feedback = Some(feedback_for(&answered));

        let sessions = [open.clone(), done, answered];
        let eligible: Vec<Uuid> = eligible_sessions(patient, &sessions).iter().map(|s| s.id).collect();
        assert_eq!(eligible, vec![open.id]);
    }
}
