//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.
//!
//! Every protected handler receives the acting user from `require_actor` and
//! delegates to the `TherapyWorkflow`; core failures become rejections via
//! `error::reject`.

use crate::error::{reject, Rejection};
use crate::web::dto::{
    AvailabilityRequest, AvailabilityResponse, CreateTherapyPlanRequest, DashboardResponse,
    DayViewQuery, FeedbackResponse, HealthResponse, NoticeResponse, PhaseDto,
    PhaseProgressResponse, PhaseStateDto, ProgressQuery, ProgressResponse,
    ScheduleSessionRequest, SessionResponse, SessionStatusDto, SessionUpdateResponse,
    StatusChangeResponse, SubmitFeedbackRequest, TherapyPlanResponse, UpdateStatusRequest,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::NaiveDateTime;
use panchakarma_core::{Actor, CoreError, Dispatched, Session, TransitionRequest};
use std::sync::Arc;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        create_therapy_plan_handler,
        list_therapy_plans_handler,
        schedule_session_handler,
        list_sessions_handler,
        update_session_status_handler,
        next_statuses_handler,
        check_availability_handler,
        day_view_handler,
        submit_feedback_handler,
        list_feedback_handler,
        eligible_feedback_handler,
        therapy_progress_handler,
        dashboard_handler,
    ),
    components(
        schemas(
            AvailabilityRequest, AvailabilityResponse, CreateTherapyPlanRequest,
            DashboardResponse, FeedbackResponse, HealthResponse, NoticeResponse, PhaseDto,
            PhaseProgressResponse, PhaseStateDto, ProgressResponse, ScheduleSessionRequest,
            SessionResponse, SessionStatusDto, SessionUpdateResponse, StatusChangeResponse,
            SubmitFeedbackRequest, TherapyPlanResponse, UpdateStatusRequest,
        )
    ),
    tags(
        (name = "Panchakarma Therapy API", description = "Therapy plans, session scheduling, feedback and progress.")
    )
)]
pub struct ApiDoc;

/// The wall-clock instant used for completion and feedback timestamps.
fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn dispatched(result: Dispatched<Session>) -> SessionUpdateResponse {
    SessionUpdateResponse {
        session: result.value.into(),
        undelivered_notices: result.undelivered.into_iter().map(Into::into).collect(),
    }
}

fn session_list(sessions: Vec<Session>) -> Json<Vec<SessionResponse>> {
    Json(sessions.into_iter().map(Into::into).collect())
}

//=========================================================================================
// Health
//=========================================================================================

/// Liveness probe. Requires no identity headers.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

//=========================================================================================
// Therapy Plans
//=========================================================================================

/// Create a therapy plan for a patient. Practitioners only.
#[utoipa::path(
    post,
    path = "/therapy-plans",
    request_body = CreateTherapyPlanRequest,
    responses(
        (status = 201, description = "Plan created", body = TherapyPlanResponse),
        (status = 400, description = "End date before start date"),
        (status = 403, description = "Caller is not a practitioner")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn create_therapy_plan_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreateTherapyPlanRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let plan = app_state
        .workflow
        .create_therapy_plan(&actor, payload.into())
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(TherapyPlanResponse::from(plan))))
}

/// List the caller's therapy plans, newest first.
#[utoipa::path(
    get,
    path = "/therapy-plans",
    responses((status = 200, description = "The caller's plans", body = [TherapyPlanResponse])),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn list_therapy_plans_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, Rejection> {
    let plans = app_state.workflow.therapy_plans_for(&actor).await.map_err(reject)?;
    Ok(Json(
        plans.into_iter().map(TherapyPlanResponse::from).collect::<Vec<_>>(),
    ))
}

//=========================================================================================
// Sessions
//=========================================================================================

/// Book a session against one of the practitioner's plans.
#[utoipa::path(
    post,
    path = "/sessions",
    request_body = ScheduleSessionRequest,
    responses(
        (status = 201, description = "Session scheduled", body = SessionUpdateResponse),
        (status = 400, description = "Missing procedure name"),
        (status = 403, description = "Plan belongs to another practitioner"),
        (status = 404, description = "Plan not found"),
        (status = 409, description = "The practitioner is already booked at that time")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn schedule_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<ScheduleSessionRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let result = app_state
        .workflow
        .schedule_session(&actor, payload.into())
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(dispatched(result))))
}

/// List the caller's sessions in ascending time order.
#[utoipa::path(
    get,
    path = "/sessions",
    responses((status = 200, description = "The caller's sessions", body = [SessionResponse])),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, Rejection> {
    let sessions = app_state.workflow.sessions_for(&actor).await.map_err(reject)?;
    Ok(session_list(sessions))
}

/// Move a session to a new status.
#[utoipa::path(
    put,
    path = "/sessions/{id}/status",
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = SessionUpdateResponse),
        (status = 400, description = "Missing reschedule time or a move back to SCHEDULED"),
        (status = 403, description = "Session belongs to another practitioner"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Invalid transition, premature completion or schedule conflict")
    ),
    params(
        ("id" = Uuid, Path, description = "The session ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn update_session_status_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let request = match (payload.status, payload.scheduled_at) {
        (SessionStatusDto::Rescheduled, Some(to)) => TransitionRequest::Reschedule { to },
        (SessionStatusDto::Rescheduled, None) => {
            return Err(reject(CoreError::Validation(
                "scheduled_at is required when rescheduling".to_string(),
            )))
        }
        (SessionStatusDto::Completed, _) => TransitionRequest::Complete,
        (SessionStatusDto::Cancelled, _) => TransitionRequest::Cancel,
        (SessionStatusDto::Scheduled, _) => {
            return Err(reject(CoreError::Validation(
                "a session cannot be moved back to SCHEDULED".to_string(),
            )))
        }
    };

    let result = app_state
        .workflow
        .transition_session(&actor, session_id, request, now())
        .await
        .map_err(reject)?;
    Ok(Json(dispatched(result)))
}

/// The statuses the caller may move this session to next.
#[utoipa::path(
    get,
    path = "/sessions/{id}/next-statuses",
    responses(
        (status = 200, description = "Allowed target statuses", body = [SessionStatusDto]),
        (status = 404, description = "Session not found")
    ),
    params(
        ("id" = Uuid, Path, description = "The session ID."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn next_statuses_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, Rejection> {
    let statuses = app_state
        .workflow
        .next_valid_statuses(&actor, session_id)
        .await
        .map_err(reject)?;
    Ok(Json(
        statuses.into_iter().map(SessionStatusDto::from).collect::<Vec<_>>(),
    ))
}

//=========================================================================================
// Scheduling
//=========================================================================================

/// Pre-check a slot before booking it.
#[utoipa::path(
    post,
    path = "/availability",
    request_body = AvailabilityRequest,
    responses(
        (status = 200, description = "Conflicts and the day's load", body = AvailabilityResponse),
        (status = 403, description = "Caller is not a practitioner")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn check_availability_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<AvailabilityRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let result = app_state
        .workflow
        .check_availability(&actor, payload.scheduled_at)
        .await
        .map_err(reject)?;
    Ok(Json(AvailabilityResponse::from(result)))
}

/// The practitioner's sessions on one day.
#[utoipa::path(
    get,
    path = "/schedule/day",
    params(
        DayViewQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    ),
    responses((status = 200, description = "Sessions on that day, ascending", body = [SessionResponse]))
)]
pub async fn day_view_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<DayViewQuery>,
) -> Result<impl IntoResponse, Rejection> {
    let sessions = app_state
        .workflow
        .day_view(&actor, query.date)
        .await
        .map_err(reject)?;
    Ok(session_list(sessions))
}

//=========================================================================================
// Feedback
//=========================================================================================

/// Leave feedback on one of the patient's sessions.
#[utoipa::path(
    post,
    path = "/feedback",
    request_body = SubmitFeedbackRequest,
    responses(
        (status = 201, description = "Feedback linked to the session", body = SessionResponse),
        (status = 400, description = "Rating or improvement level out of range, or empty message"),
        (status = 422, description = "Session is not eligible for feedback")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn submit_feedback_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<SubmitFeedbackRequest>,
) -> Result<impl IntoResponse, Rejection> {
    let session = app_state
        .workflow
        .submit_feedback(&actor, payload.into(), now())
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// Sessions of the practitioner that carry feedback, newest feedback first.
#[utoipa::path(
    get,
    path = "/feedback",
    responses(
        (status = 200, description = "Reviewed sessions", body = [SessionResponse]),
        (status = 403, description = "Caller is not a practitioner")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn list_feedback_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, Rejection> {
    let sessions = app_state.workflow.feedback_received(&actor).await.map_err(reject)?;
    Ok(session_list(sessions))
}

/// The patient's sessions that can still take feedback.
#[utoipa::path(
    get,
    path = "/feedback/eligible",
    responses(
        (status = 200, description = "Sessions open for feedback, soonest first", body = [SessionResponse]),
        (status = 403, description = "Caller is not a patient")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn eligible_feedback_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, Rejection> {
    let sessions = app_state.workflow.feedback_eligible(&actor).await.map_err(reject)?;
    Ok(session_list(sessions))
}

//=========================================================================================
// Derived Views
//=========================================================================================

/// Phase-by-phase therapy progress.
#[utoipa::path(
    get,
    path = "/therapy-progress",
    params(
        ProgressQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    ),
    responses((status = 200, description = "The progress report", body = ProgressResponse))
)]
pub async fn therapy_progress_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<ProgressQuery>,
) -> Result<impl IntoResponse, Rejection> {
    let report = app_state
        .workflow
        .progress(&actor, query.patient_id)
        .await
        .map_err(reject)?;
    Ok(Json(ProgressResponse::from(report)))
}

/// The practitioner's caseload overview.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Caseload counters", body = DashboardResponse),
        (status = 403, description = "Caller is not a practitioner")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the caller."),
        ("x-user-role" = String, Header, description = "`practitioner` or `patient`.")
    )
)]
pub async fn dashboard_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, Rejection> {
    let summary = app_state.workflow.dashboard(&actor).await.map_err(reject)?;
    Ok(Json(DashboardResponse::from(summary)))
}
