//! crates/panchakarma_core/src/error.rs
//!
//! The error taxonomy returned across the public contract of the core.

use crate::domain::SessionStatus;
use crate::ports::PortError;
use chrono::NaiveDateTime;
use std::fmt;
use uuid::Uuid;

/// Why a session cannot take a feedback submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ineligibility {
    UnknownSession,
    WrongOwner,
    WrongStatus(SessionStatus),
    AlreadyHasFeedback,
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligibility::UnknownSession => f.write_str("session is not among the patient's sessions"),
            Ineligibility::WrongOwner => f.write_str("session belongs to another patient"),
            Ineligibility::WrongStatus(s) => write!(f, "session is {}", s),
            Ineligibility::AlreadyHasFeedback => f.write_str("feedback was already submitted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    /// Malformed input: bad rating, missing required field.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: SessionStatus, to: SessionStatus },

    #[error("Session {session_id} is scheduled at {scheduled_at} and cannot be completed yet")]
    PrematureCompletion {
        session_id: Uuid,
        scheduled_at: NaiveDateTime,
    },

    #[error("Session {session_id} is not eligible for feedback: {reason}")]
    SessionNotEligible {
        session_id: Uuid,
        reason: Ineligibility,
    },

    /// The requested slot collides with the listed sessions.
    #[error("Schedule conflict at {}: {} existing session(s)", .at, .conflicting.len())]
    Conflict {
        at: NaiveDateTime,
        conflicting: Vec<Uuid>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The session store failed or timed out.
    #[error("{}", upstream_message(.operation, .entity, .source))]
    UpstreamUnavailable {
        operation: &'static str,
        entity: Option<Uuid>,
        source: PortError,
    },
}

pub type CoreResult<T> = Result<T, CoreError>;

fn upstream_message(operation: &str, entity: &Option<Uuid>, source: &PortError) -> String {
    match entity {
        Some(id) => format!("{} failed for {}: {}", operation, id, source),
        None => format!("{} failed: {}", operation, source),
    }
}

impl CoreError {
    /// Lifts a port failure into the taxonomy, keeping the operation and entity
    /// for the caller's message.
    pub fn upstream(operation: &'static str, entity: Option<Uuid>, source: PortError) -> Self {
        match source {
            PortError::NotFound(what) => CoreError::NotFound(what),
            source => CoreError::UpstreamUnavailable {
                operation,
                entity,
                source,
            },
        }
    }
}
