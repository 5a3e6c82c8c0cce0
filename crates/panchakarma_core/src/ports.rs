//! crates/panchakarma_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or mailers.

use crate::domain::{
    Feedback, NewSession, NewTherapyPlan, Session, StatusChange, TherapyPlan,
};
use crate::notice::Notice;
use async_trait::async_trait;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The store rejected a write because it collides with existing data.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// The collaborator could not be reached or did not answer in time.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Filters
//=========================================================================================

/// Whose sessions to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFilter {
    Patient(Uuid),
    Practitioner(Uuid),
}

/// Whose therapy plans to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFilter {
    Patient(Uuid),
    Practitioner(Uuid),
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The system of record for plans, sessions and feedback.
///
/// Implementations serialize writes and must enforce the exact-instant
/// double-booking rule themselves, returning `PortError::Conflict`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    // --- Sessions ---
    /// Sessions are returned in ascending `scheduled_at` order.
    async fn list_sessions(&self, filter: SessionFilter) -> PortResult<Vec<Session>>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session>;

    async fn create_session(&self, input: NewSession) -> PortResult<Session>;

    /// Applies a status change and appends it to the session's history.
    async fn update_session_status(
        &self,
        session_id: Uuid,
        change: StatusChange,
    ) -> PortResult<Session>;

    // --- Feedback ---
    async fn create_feedback(&self, feedback: Feedback) -> PortResult<Feedback>;

    // --- Therapy Plans ---
    async fn list_therapy_plans(&self, filter: PlanFilter) -> PortResult<Vec<TherapyPlan>>;

    async fn get_therapy_plan(&self, plan_id: Uuid) -> PortResult<TherapyPlan>;

    async fn create_therapy_plan(&self, input: NewTherapyPlan) -> PortResult<TherapyPlan>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Hands a notice to the delivery channel.
    async fn notify(&self, notice: &Notice) -> PortResult<()>;
}
