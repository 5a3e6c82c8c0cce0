//! crates/panchakarma_core/src/workflow.rs
//!
//! The application service. It fetches snapshots through the `SessionStore`
//! port, runs the pure components on them, persists the result and hands any
//! notices to the `Notifier` port.

use crate::dashboard::{summarize, DashboardSummary};
use crate::domain::{
    Actor, FeedbackInput, NewSession, NewTherapyPlan, Role, Session, SessionRequest,
    SessionStatus, TherapyPlan,
};
use crate::error::{CoreError, CoreResult};
use crate::feedback::{attach_feedback, eligible_sessions};
use crate::lifecycle::{
    next_valid_statuses, notices_for, plan_transition, CompletionPolicy,
    TransitionContext, TransitionRequest,
};
use crate::notice::{self, Notice};
use crate::ports::{Notifier, PlanFilter, PortError, SessionFilter, SessionStore};
use crate::progress::{compute_progress, ProgressReport};
use crate::scheduling::{check_availability, day_view, AvailabilityResult, ConflictWindow, SlotCandidate};
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The configurable scheduling and completion rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TherapyPolicy {
    pub window: ConflictWindow,
    pub completion: CompletionPolicy,
}

/// A result together with the notices that could not be delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched<T> {
    pub value: T,
    pub undelivered: Vec<Notice>,
}

/// Input for a new plan; the practitioner is taken from the actor.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub patient_id: Uuid,
    pub phase: crate::domain::Phase,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct TherapyWorkflow {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    policy: TherapyPolicy,
}

fn require_practitioner(actor: &Actor) -> CoreResult<()> {
    match actor.role {
        Role::Practitioner => Ok(()),
        Role::Patient => Err(CoreError::Forbidden(
            "this operation is reserved for practitioners".to_string(),
        )),
    }
}

fn require_patient(actor: &Actor) -> CoreResult<()> {
    match actor.role {
        Role::Patient => Ok(()),
        Role::Practitioner => Err(CoreError::Forbidden(
            "this operation is reserved for patients".to_string(),
        )),
    }
}

fn can_see(actor: &Actor, session: &Session) -> bool {
    match actor.role {
        Role::Practitioner => session.practitioner_id == actor.id,
        Role::Patient => session.patient_id == actor.id,
    }
}

impl TherapyWorkflow {
    pub fn new(store: Arc<dyn SessionStore>, notifier: Arc<dyn Notifier>, policy: TherapyPolicy) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    /// The sessions `actor` is allowed to see.
    pub async fn sessions_for(&self, actor: &Actor) -> CoreResult<Vec<Session>> {
        let filter = match actor.role {
            Role::Practitioner => SessionFilter::Practitioner(actor.id),
            Role::Patient => SessionFilter::Patient(actor.id),
        };
        self.store
            .list_sessions(filter)
            .await
            .map_err(|e| CoreError::upstream("list_sessions", Some(actor.id), e))
    }

    async fn practitioner_calendar(&self, practitioner_id: Uuid) -> CoreResult<Vec<Session>> {
        self.store
            .list_sessions(SessionFilter::Practitioner(practitioner_id))
            .await
            .map_err(|e| CoreError::upstream("list_sessions", Some(practitioner_id), e))
    }

    async fn visible_session(&self, actor: &Actor, session_id: Uuid) -> CoreResult<Session> {
        let session = self
            .store
            .get_session(session_id)
            .await
            .map_err(|e| CoreError::upstream("get_session", Some(session_id), e))?;
        if !can_see(actor, &session) {
            // Do not reveal that the session exists.
            return Err(CoreError::NotFound(format!("Session {} not found", session_id)));
        }
        Ok(session)
    }

    async fn dispatch(&self, notices: Vec<Notice>) -> Vec<Notice> {
        let mut undelivered = Vec::new();
        for notice in notices {
            if let Err(e) = self.notifier.notify(&notice).await {
                error!(
                    "Failed to deliver {} notice for session {}: {}",
                    notice.kind.as_str(),
                    notice.session_id,
                    e
                );
                undelivered.push(notice);
            }
        }
        undelivered
    }

    // --- Therapy Plans ---

    pub async fn create_therapy_plan(&self, actor: &Actor, request: PlanRequest) -> CoreResult<TherapyPlan> {
        require_practitioner(actor)?;
        if let Some(end) = request.end_date {
            if end < request.start_date {
                return Err(CoreError::Validation(format!(
                    "end date {} is before start date {}",
                    end, request.start_date
                )));
            }
        }

        let plan = self
            .store
            .create_therapy_plan(NewTherapyPlan {
                patient_id: request.patient_id,
                practitioner_id: actor.id,
                phase: request.phase,
                description: request.description.trim().to_string(),
                start_date: request.start_date,
                end_date: request.end_date,
            })
            .await
            .map_err(|e| CoreError::upstream("create_therapy_plan", Some(request.patient_id), e))?;

        info!(
            "Practitioner {} created {} plan {} for patient {}",
            actor.id, plan.phase, plan.id, plan.patient_id
        );
        Ok(plan)
    }

    /// Plans are listed newest first.
    pub async fn therapy_plans_for(&self, actor: &Actor) -> CoreResult<Vec<TherapyPlan>> {
        let filter = match actor.role {
            Role::Practitioner => PlanFilter::Practitioner(actor.id),
            Role::Patient => PlanFilter::Patient(actor.id),
        };
        let mut plans = self
            .store
            .list_therapy_plans(filter)
            .await
            .map_err(|e| CoreError::upstream("list_therapy_plans", Some(actor.id), e))?;
        plans.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
        Ok(plans)
    }

    // --- Scheduling ---

    pub async fn check_availability(
        &self,
        actor: &Actor,
        scheduled_at: NaiveDateTime,
    ) -> CoreResult<AvailabilityResult> {
        require_practitioner(actor)?;
        let calendar = self.practitioner_calendar(actor.id).await?;
        Ok(check_availability(
            &SlotCandidate::new(actor.id, scheduled_at),
            &calendar,
            self.policy.window,
        ))
    }

    pub async fn day_view(&self, actor: &Actor, date: NaiveDate) -> CoreResult<Vec<Session>> {
        require_practitioner(actor)?;
        let calendar = self.practitioner_calendar(actor.id).await?;
        Ok(day_view(actor.id, date, &calendar))
    }

    /// Books a session after a local conflict pre-check. The store performs the
    /// authoritative check and may still reject the write.
    pub async fn schedule_session(
        &self,
        actor: &Actor,
        request: SessionRequest,
    ) -> CoreResult<Dispatched<Session>> {
        require_practitioner(actor)?;
        let procedure_name = request.procedure_name.trim().to_string();
        if procedure_name.is_empty() {
            return Err(CoreError::Validation("procedure name is required".to_string()));
        }

        let plan = self
            .store
            .get_therapy_plan(request.therapy_plan_id)
            .await
            .map_err(|e| CoreError::upstream("get_therapy_plan", Some(request.therapy_plan_id), e))?;
        if plan.practitioner_id != actor.id {
            return Err(CoreError::Forbidden(
                "sessions can only be scheduled against your own therapy plans".to_string(),
            ));
        }

        let calendar = self.practitioner_calendar(actor.id).await?;
        let availability = check_availability(
            &SlotCandidate::new(actor.id, request.scheduled_at),
            &calendar,
            self.policy.window,
        );
        if !availability.bookable {
            warn!(
                "Schedule conflict for practitioner {} at {}",
                actor.id, request.scheduled_at
            );
            return Err(CoreError::Conflict {
                at: request.scheduled_at,
                conflicting: availability.conflicts.iter().map(|s| s.id).collect(),
            });
        }

        let session = self
            .store
            .create_session(NewSession {
                therapy_plan_id: plan.id,
                patient_id: plan.patient_id,
                practitioner_id: plan.practitioner_id,
                phase: plan.phase,
                procedure_name,
                scheduled_at: request.scheduled_at,
                notes: request.notes.filter(|n| !n.trim().is_empty()),
            })
            .await
            .map_err(|e| match e {
                PortError::Conflict(reason) => {
                    warn!("Store rejected booking at {}: {}", request.scheduled_at, reason);
                    CoreError::Conflict {
                        at: request.scheduled_at,
                        conflicting: Vec::new(),
                    }
                }
                e => CoreError::upstream("create_session", Some(plan.id), e),
            })?;

        info!(
            "Scheduled {} session {} at {}",
            session.procedure_name, session.id, session.scheduled_at
        );
        let undelivered = self.dispatch(notice::on_scheduled(&session)).await;
        Ok(Dispatched {
            value: session,
            undelivered,
        })
    }

    // --- Session lifecycle ---

    pub async fn next_valid_statuses(&self, actor: &Actor, session_id: Uuid) -> CoreResult<Vec<SessionStatus>> {
        let session = self.visible_session(actor, session_id).await?;
        if actor.role == Role::Patient {
            return Ok(Vec::new());
        }
        Ok(next_valid_statuses(&session))
    }

    pub async fn transition_session(
        &self,
        actor: &Actor,
        session_id: Uuid,
        request: TransitionRequest,
        now: NaiveDateTime,
    ) -> CoreResult<Dispatched<Session>> {
        let session = self.visible_session(actor, session_id).await?;
        let calendar = match request {
            TransitionRequest::Reschedule { .. } => self.practitioner_calendar(session.practitioner_id).await?,
            _ => Vec::new(),
        };

        let change = plan_transition(
            &session,
            request,
            &TransitionContext {
                actor: *actor,
                now,
                completion: self.policy.completion,
                window: self.policy.window,
                calendar: &calendar,
            },
        )?;

        let updated = self
            .store
            .update_session_status(session_id, change.clone())
            .await
            .map_err(|e| match e {
                PortError::Conflict(_) => CoreError::Conflict {
                    at: change.rescheduled_to.unwrap_or(session.scheduled_at),
                    conflicting: Vec::new(),
                },
                e => CoreError::upstream("update_session_status", Some(session_id), e),
            })?;

        info!("Session {} moved from {} to {}", session_id, change.from, change.to);
        let undelivered = self.dispatch(notices_for(&updated, &change)).await;
        Ok(Dispatched {
            value: updated,
            undelivered,
        })
    }

    // --- Feedback ---

    pub async fn submit_feedback(
        &self,
        actor: &Actor,
        input: FeedbackInput,
        now: NaiveDateTime,
    ) -> CoreResult<Session> {
        require_patient(actor)?;
        let sessions = self.sessions_for(actor).await?;
        let mut linked = attach_feedback(&input, actor.id, &sessions, now)?;

        if let Some(feedback) = linked.feedback.take() {
            let stored = self
                .store
                .create_feedback(feedback)
                .await
                .map_err(|e| match e {
                    PortError::Conflict(_) => CoreError::SessionNotEligible {
                        session_id: input.session_id,
                        reason: crate::error::Ineligibility::AlreadyHasFeedback,
                    },
                    e => CoreError::upstream("create_feedback", Some(input.session_id), e),
                })?;
            info!("Patient {} left feedback on session {}", actor.id, stored.session_id);
            linked.feedback = Some(stored);
        }
        Ok(linked)
    }

    /// The patient's sessions that can still take feedback, soonest first.
    pub async fn feedback_eligible(&self, actor: &Actor) -> CoreResult<Vec<Session>> {
        require_patient(actor)?;
        let sessions = self.sessions_for(actor).await?;
        let mut open: Vec<Session> = eligible_sessions(actor.id, &sessions).into_iter().cloned().collect();
        open.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
        Ok(open)
    }

    /// Sessions of the practitioner that carry feedback, newest feedback first.
    pub async fn feedback_received(&self, actor: &Actor) -> CoreResult<Vec<Session>> {
        require_practitioner(actor)?;
        let mut reviewed: Vec<Session> = self
            .sessions_for(actor)
            .await?
            .into_iter()
            .filter(Session::has_feedback)
            .collect();
        reviewed.sort_by_key(|s| std::cmp::Reverse(s.feedback.as_ref().map(|f| f.created_at)));
        Ok(reviewed)
    }

    // --- Derived views ---

    /// Progress for a patient. Patients always get their own; practitioners may
    /// narrow their caseload to one patient.
    pub async fn progress(&self, actor: &Actor, patient_id: Option<Uuid>) -> CoreResult<ProgressReport> {
        let mut sessions = self.sessions_for(actor).await?;
        if let (Role::Practitioner, Some(patient_id)) = (actor.role, patient_id) {
            sessions.retain(|s| s.patient_id == patient_id);
        }
        Ok(compute_progress(&sessions))
    }

    pub async fn dashboard(&self, actor: &Actor) -> CoreResult<DashboardSummary> {
        require_practitioner(actor)?;
        let sessions = self.sessions_for(actor).await?;
        Ok(summarize(&sessions))
    }
}
