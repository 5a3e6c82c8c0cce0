pub mod dashboard;
pub mod domain;
pub mod error;
pub mod feedback;
pub mod lifecycle;
pub mod notice;
pub mod ports;
pub mod progress;
pub mod scheduling;
pub mod workflow;

#[cfg(test)]
mod test_support;

pub use domain::{
    Actor, Feedback, FeedbackInput, NewSession, NewTherapyPlan, Phase, Role, Session,
    SessionRequest, SessionStatus, StatusChange, TherapyPlan,
};
pub use error::{CoreError, CoreResult, Ineligibility};
pub use feedback::{attach_feedback, eligible_sessions};
pub use lifecycle::{next_valid_statuses, CompletionPolicy, TransitionRequest};
pub use notice::{Notice, NoticeKind};
pub use ports::{Notifier, PlanFilter, PortError, PortResult, SessionFilter, SessionStore};
pub use progress::{compute_progress, PhaseProgress, PhaseState, ProgressReport};
pub use scheduling::{check_availability, AvailabilityResult, ConflictWindow, SlotCandidate, MAX_WINDOW_MINUTES};
pub use workflow::{Dispatched, PlanRequest, TherapyPolicy, TherapyWorkflow};
