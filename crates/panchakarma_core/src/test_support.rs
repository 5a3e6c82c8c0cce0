//! Builders shared by the unit tests.

use crate::domain::{Feedback, Phase, Session, SessionStatus};
use chrono::NaiveDateTime;
use uuid::Uuid;

pub fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").expect("valid test timestamp")
}

pub fn session(phase: Phase, status: SessionStatus, scheduled_at: NaiveDateTime) -> Session {
    Session {
        id: Uuid::new_v4(),
        therapy_plan_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        practitioner_id: Uuid::new_v4(),
        phase,
        procedure_name: "Abhyanga".to_string(),
        scheduled_at,
        status,
        notes: None,
        feedback: None,
        history: Vec::new(),
    }
}

pub fn booked(practitioner_id: Uuid, patient_id: Uuid, scheduled_at: NaiveDateTime) -> Session {
    Session {
        practitioner_id,
        patient_id,
        ..session(Phase::Main, SessionStatus::Scheduled, scheduled_at)
    }
}

pub fn feedback_for(session: &Session) -> Feedback {
    Feedback {
        id: Uuid::new_v4(),
        session_id: session.id,
        patient_id: session.patient_id,
        rating: 4,
        message: "Felt lighter".to_string(),
        symptoms: None,
        side_effects: None,
        improvement_level: None,
        created_at: session.scheduled_at,
    }
}
