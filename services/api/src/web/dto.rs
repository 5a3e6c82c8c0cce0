//! services/api/src/web/dto.rs
//!
//! Wire representations of the core types. The core crate stays free of
//! serialization concerns; everything the REST and WebSocket layers emit or
//! accept passes through these structs.

use chrono::{NaiveDate, NaiveDateTime};
use panchakarma_core::dashboard::DashboardSummary;
use panchakarma_core::{
    AvailabilityResult, Feedback, FeedbackInput, Notice, Phase, PhaseProgress, PhaseState,
    PlanRequest, ProgressReport, Session, SessionRequest, SessionStatus, StatusChange,
    TherapyPlan,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Enumerations
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PhaseDto {
    Preparation,
    Main,
    FollowUp,
}

impl From<Phase> for PhaseDto {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Preparation => PhaseDto::Preparation,
            Phase::Main => PhaseDto::Main,
            Phase::FollowUp => PhaseDto::FollowUp,
        }
    }
}

impl From<PhaseDto> for Phase {
    fn from(phase: PhaseDto) -> Self {
        match phase {
            PhaseDto::Preparation => Phase::Preparation,
            PhaseDto::Main => Phase::Main,
            PhaseDto::FollowUp => Phase::FollowUp,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatusDto {
    Scheduled,
    Rescheduled,
    Completed,
    Cancelled,
}

impl From<SessionStatus> for SessionStatusDto {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Scheduled => SessionStatusDto::Scheduled,
            SessionStatus::Rescheduled => SessionStatusDto::Rescheduled,
            SessionStatus::Completed => SessionStatusDto::Completed,
            SessionStatus::Cancelled => SessionStatusDto::Cancelled,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseStateDto {
    Locked,
    InProgress,
    Complete,
}

impl From<PhaseState> for PhaseStateDto {
    fn from(state: PhaseState) -> Self {
        match state {
            PhaseState::Locked => PhaseStateDto::Locked,
            PhaseState::InProgress => PhaseStateDto::InProgress,
            PhaseState::Complete => PhaseStateDto::Complete,
        }
    }
}

//=========================================================================================
// Request Payloads
//=========================================================================================

#[derive(Deserialize, ToSchema, Debug)]
pub struct CreateTherapyPlanRequest {
    pub patient_id: Uuid,
    pub phase: PhaseDto,
    #[serde(default)]
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl From<CreateTherapyPlanRequest> for PlanRequest {
    fn from(req: CreateTherapyPlanRequest) -> Self {
        PlanRequest {
            patient_id: req.patient_id,
            phase: req.phase.into(),
            description: req.description,
            start_date: req.start_date,
            end_date: req.end_date,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct ScheduleSessionRequest {
    pub therapy_plan_id: Uuid,
    pub procedure_name: String,
    pub scheduled_at: NaiveDateTime,
    pub notes: Option<String>,
}

impl From<ScheduleSessionRequest> for SessionRequest {
    fn from(req: ScheduleSessionRequest) -> Self {
        SessionRequest {
            therapy_plan_id: req.therapy_plan_id,
            procedure_name: req.procedure_name,
            scheduled_at: req.scheduled_at,
            notes: req.notes,
        }
    }
}

/// The target status; `scheduled_at` is required when rescheduling.
#[derive(Deserialize, ToSchema, Debug)]
pub struct UpdateStatusRequest {
    pub status: SessionStatusDto,
    pub scheduled_at: Option<NaiveDateTime>,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct AvailabilityRequest {
    pub scheduled_at: NaiveDateTime,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct SubmitFeedbackRequest {
    pub session_id: Uuid,
    /// 1 to 5.
    pub rating: i32,
    #[serde(default)]
    pub message: String,
    pub symptoms: Option<String>,
    pub side_effects: Option<String>,
    /// 1 to 10.
    pub improvement_level: Option<i32>,
}

impl From<SubmitFeedbackRequest> for FeedbackInput {
    fn from(req: SubmitFeedbackRequest) -> Self {
        FeedbackInput {
            session_id: req.session_id,
            rating: req.rating,
            message: req.message,
            symptoms: req.symptoms,
            side_effects: req.side_effects,
            improvement_level: req.improvement_level,
        }
    }
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct DayViewQuery {
    /// The calendar day, `YYYY-MM-DD`.
    pub date: NaiveDate,
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct ProgressQuery {
    /// Narrows a practitioner's caseload to one patient. Ignored for patients.
    pub patient_id: Option<Uuid>,
}

//=========================================================================================
// Response Payloads
//=========================================================================================

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct TherapyPlanResponse {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub phase: PhaseDto,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl From<TherapyPlan> for TherapyPlanResponse {
    fn from(plan: TherapyPlan) -> Self {
        Self {
            id: plan.id,
            patient_id: plan.patient_id,
            practitioner_id: plan.practitioner_id,
            phase: plan.phase.into(),
            description: plan.description,
            start_date: plan.start_date,
            end_date: plan.end_date,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct FeedbackResponse {
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

impl From<Feedback> for FeedbackResponse {
    fn from(f: Feedback) -> Self {
        Self {
            id: f.id,
            session_id: f.session_id,
            patient_id: f.patient_id,
            rating: f.rating,
            message: f.message,
            symptoms: f.symptoms,
            side_effects: f.side_effects,
            improvement_level: f.improvement_level,
            created_at: f.created_at,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct StatusChangeResponse {
    pub from: SessionStatusDto,
    pub to: SessionStatusDto,
    pub changed_at: NaiveDateTime,
    pub rescheduled_to: Option<NaiveDateTime>,
}

impl From<StatusChange> for StatusChangeResponse {
    fn from(c: StatusChange) -> Self {
        Self {
            from: c.from.into(),
            to: c.to.into(),
            changed_at: c.changed_at,
            rescheduled_to: c.rescheduled_to,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct SessionResponse {
    pub id: Uuid,
    pub therapy_plan_id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub phase: PhaseDto,
    pub procedure_name: String,
    pub scheduled_at: NaiveDateTime,
    pub status: SessionStatusDto,
    pub notes: Option<String>,
    pub feedback: Option<FeedbackResponse>,
    pub history: Vec<StatusChangeResponse>,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            id: s.id,
            therapy_plan_id: s.therapy_plan_id,
            patient_id: s.patient_id,
            practitioner_id: s.practitioner_id,
            phase: s.phase.into(),
            procedure_name: s.procedure_name,
            scheduled_at: s.scheduled_at,
            status: s.status.into(),
            notes: s.notes,
            feedback: s.feedback.map(Into::into),
            history: s.history.into_iter().map(Into::into).collect(),
        }
    }
}

fn sessions(list: Vec<Session>) -> Vec<SessionResponse> {
    list.into_iter().map(Into::into).collect()
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct NoticeResponse {
    pub kind: String,
    pub recipient_id: Uuid,
    pub session_id: Uuid,
    pub subject: String,
}

impl From<Notice> for NoticeResponse {
    fn from(n: Notice) -> Self {
        Self {
            kind: n.kind.as_str().to_string(),
            recipient_id: n.recipient_id,
            session_id: n.session_id,
            subject: n.subject,
        }
    }
}

/// A written session plus any notices the notifier failed to deliver.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct SessionUpdateResponse {
    pub session: SessionResponse,
    pub undelivered_notices: Vec<NoticeResponse>,
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct AvailabilityResponse {
    pub bookable: bool,
    pub conflicts: Vec<SessionResponse>,
    pub day_load: Vec<SessionResponse>,
}

impl From<AvailabilityResult> for AvailabilityResponse {
    fn from(r: AvailabilityResult) -> Self {
        Self {
            bookable: r.bookable,
            conflicts: sessions(r.conflicts),
            day_load: sessions(r.day_load),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct PhaseProgressResponse {
    pub phase: PhaseDto,
    pub total: usize,
    pub completed: usize,
    pub percentage: u32,
    pub state: PhaseStateDto,
    pub sessions: Vec<SessionResponse>,
}

impl From<PhaseProgress> for PhaseProgressResponse {
    fn from(p: PhaseProgress) -> Self {
        Self {
            phase: p.phase.into(),
            total: p.total,
            completed: p.completed,
            percentage: p.percentage,
            state: p.state.into(),
            sessions: sessions(p.sessions),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ProgressResponse {
    /// Always Preparation, Main, FollowUp in that order.
    pub phases: Vec<PhaseProgressResponse>,
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub completion_percentage: f64,
    pub current_phase: Option<PhaseDto>,
}

impl From<ProgressReport> for ProgressResponse {
    fn from(r: ProgressReport) -> Self {
        let current_phase = r.current_phase().map(Into::into);
        Self {
            phases: r.phases.into_iter().map(Into::into).collect(),
            total_sessions: r.total_sessions,
            completed_sessions: r.completed_sessions,
            completion_percentage: r.completion_percentage,
            current_phase,
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct DashboardResponse {
    pub total_patients: usize,
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub upcoming: Vec<SessionResponse>,
    pub pending_feedback: usize,
    pub progress: ProgressResponse,
}

impl From<DashboardSummary> for DashboardResponse {
    fn from(d: DashboardSummary) -> Self {
        Self {
            total_patients: d.total_patients,
            total_sessions: d.total_sessions,
            completed_sessions: d.completed_sessions,
            upcoming: sessions(d.upcoming),
            pending_feedback: d.pending_feedback,
            progress: d.progress.into(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct HealthResponse {
    pub status: String,
}
