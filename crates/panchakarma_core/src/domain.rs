//! crates/panchakarma_core/src/domain.rs
//!
//! Defines the pure, core data structures for the therapy tracker.
//! These structs are independent of any database or serialization format.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Enumerations
//=========================================================================================

/// One of the three sequential Panchakarma treatment stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Preparation,
    Main,
    FollowUp,
}

impl Phase {
    /// Canonical treatment order. Every per-phase view is emitted in this order.
    pub const ALL: [Phase; 3] = [Phase::Preparation, Phase::Main, Phase::FollowUp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Preparation => "PREPARATION",
            Phase::Main => "MAIN",
            Phase::FollowUp => "FOLLOWUP",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PREPARATION" => Ok(Phase::Preparation),
            "MAIN" => Ok(Phase::Main),
            "FOLLOWUP" | "FOLLOW_UP" => Ok(Phase::FollowUp),
            other => Err(format!("unknown phase '{}'", other)),
        }
    }
}

/// Lifecycle status of a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Scheduled,
    Rescheduled,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "SCHEDULED",
            SessionStatus::Rescheduled => "RESCHEDULED",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Cancelled => "CANCELLED",
        }
    }

    /// Completed and cancelled sessions never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// A session still expected to take place.
    pub fn is_upcoming(&self) -> bool {
        matches!(self, SessionStatus::Scheduled | SessionStatus::Rescheduled)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(SessionStatus::Scheduled),
            "RESCHEDULED" => Ok(SessionStatus::Rescheduled),
            "COMPLETED" => Ok(SessionStatus::Completed),
            "CANCELLED" => Ok(SessionStatus::Cancelled),
            other => Err(format!("unknown session status '{}'", other)),
        }
    }
}

//=========================================================================================
// Entities
//=========================================================================================

/// A practitioner-authored assignment of a patient to a phase with a date range.
#[derive(Debug, Clone, PartialEq)]
pub struct TherapyPlan {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub phase: Phase,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// A single recorded status change. The history of a session is the ordered
/// list of these.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub from: SessionStatus,
    pub to: SessionStatus,
    pub changed_at: NaiveDateTime,
    /// The new slot, present only when `to` is `Rescheduled`.
    pub rescheduled_to: Option<NaiveDateTime>,
}

/// A single scheduled procedure instance under a therapy plan.
///
/// `phase`, `patient_id` and `practitioner_id` are inherited from the plan at
/// creation time so that a flat list of sessions is enough to aggregate on.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub therapy_plan_id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub phase: Phase,
    pub procedure_name: String,
    pub scheduled_at: NaiveDateTime,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub feedback: Option<Feedback>,
    pub history: Vec<StatusChange>,
}

impl Session {
    pub fn has_feedback(&self) -> bool {
        self.feedback.is_some()
    }
}

/// A patient's feedback on one session. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub id: Uuid,
    pub session_id: Uuid,
    pub patient_id: Uuid,
    pub rating: u8,
    pub message: String,
    pub symptoms: Option<String>,
    pub side_effects: Option<String>,
    pub improvement_level: Option<u8>,
    pub created_at: NaiveDateTime,
}

//=========================================================================================
// Inputs
//=========================================================================================

/// Input for creating a therapy plan. The practitioner is the caller.
#[derive(Debug, Clone)]
pub struct NewTherapyPlan {
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub phase: Phase,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Input for booking a session against a plan, as sent by the practitioner.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub therapy_plan_id: Uuid,
    pub procedure_name: String,
    pub scheduled_at: NaiveDateTime,
    pub notes: Option<String>,
}

/// A fully resolved session ready to be persisted by the store.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub therapy_plan_id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub phase: Phase,
    pub procedure_name: String,
    pub scheduled_at: NaiveDateTime,
    pub notes: Option<String>,
}

/// Structured feedback form submitted by a patient.
#[derive(Debug, Clone, Default)]
pub struct FeedbackInput {
    pub session_id: Uuid,
    /// Kept wide so that out-of-range values can be rejected instead of wrapped.
    pub rating: i32,
    pub message: String,
    pub symptoms: Option<String>,
    pub side_effects: Option<String>,
    pub improvement_level: Option<i32>,
}

//=========================================================================================
// Actors
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Practitioner,
    Patient,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "practitioner" => Ok(Role::Practitioner),
            "patient" => Ok(Role::Patient),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// The user performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn practitioner(id: Uuid) -> Self {
        Self { id, role: Role::Practitioner }
    }

    pub fn patient(id: Uuid) -> Self {
        Self { id, role: Role::Patient }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_order_is_canonical() {
        let mut phases = vec![Phase::FollowUp, Phase::Preparation, Phase::Main];
        phases.sort();
        assert_eq!(phases, Phase::ALL.to_vec());
    }

    #[test]
    fn status_parses_wire_names() {
        assert_eq!("completed".parse::<SessionStatus>(), Ok(SessionStatus::Completed));
        assert_eq!("RESCHEDULED".parse::<SessionStatus>(), Ok(SessionStatus::Rescheduled));
        assert!("DONE".parse::<SessionStatus>().is_err());
        assert_eq!("FOLLOWUP".parse::<Phase>(), Ok(Phase::FollowUp));
    }

    #[test]
    fn terminal_statuses() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(!SessionStatus::Scheduled.is_terminal());
        assert!(SessionStatus::Rescheduled.is_upcoming());
    }
}
