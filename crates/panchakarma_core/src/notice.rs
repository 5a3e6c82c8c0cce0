//! crates/panchakarma_core/src/notice.rs
//!
//! Patient-facing notices produced by scheduling and completion. The core only
//! builds them; delivery belongs to a `Notifier` adapter.

use crate::domain::Session;
use chrono::NaiveDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    SessionReminder,
    PreProcedureInstructions,
    RecoveryGuidance,
    FeedbackRequest,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::SessionReminder => "session_reminder",
            NoticeKind::PreProcedureInstructions => "pre_procedure_instructions",
            NoticeKind::RecoveryGuidance => "recovery_guidance",
            NoticeKind::FeedbackRequest => "feedback_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub recipient_id: Uuid,
    pub session_id: Uuid,
    pub subject: String,
    pub body: String,
}

impl Notice {
    fn new(kind: NoticeKind, session: &Session, subject: String, body: String) -> Self {
        Self {
            kind,
            recipient_id: session.patient_id,
            session_id: session.id,
            subject,
            body,
        }
    }
}

fn format_slot(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Notices sent to the patient when a session is booked.
pub fn on_scheduled(session: &Session) -> Vec<Notice> {
    vec![
        Notice::new(
            NoticeKind::SessionReminder,
            session,
            format!("Session reminder: {}", session.procedure_name),
            format!(
                "Your {} session is scheduled for {}. Please arrive 15 minutes early.",
                session.procedure_name,
                format_slot(session.scheduled_at)
            ),
        ),
        Notice::new(
            NoticeKind::PreProcedureInstructions,
            session,
            format!("Preparing for {}", session.procedure_name),
            format!(
                "Before your {} session: eat a light meal, stay hydrated and avoid heavy exertion.",
                session.procedure_name
            ),
        ),
    ]
}

/// Notices sent to the patient when a session moves to a new slot.
pub fn on_rescheduled(session: &Session) -> Vec<Notice> {
    vec![Notice::new(
        NoticeKind::SessionReminder,
        session,
        format!("Session moved: {}", session.procedure_name),
        format!(
            "Your {} session has been moved to {}.",
            session.procedure_name,
            format_slot(session.scheduled_at)
        ),
    )]
}

/// Notices sent to the patient once the practitioner marks a session completed.
pub fn on_completed(session: &Session) -> Vec<Notice> {
    vec![
        Notice::new(
            NoticeKind::RecoveryGuidance,
            session,
            format!("Recovery guidance after {}", session.procedure_name),
            format!(
                "Your {} session is complete. Rest, keep warm, drink warm water and follow the diet your practitioner prescribed.",
                session.procedure_name
            ),
        ),
        Notice::new(
            NoticeKind::FeedbackRequest,
            session,
            format!("Feedback request: {}", session.procedure_name),
            format!(
                "Your session '{}' has been completed. Please take a moment to share how you feel.",
                session.procedure_name
            ),
        ),
    ]
}
