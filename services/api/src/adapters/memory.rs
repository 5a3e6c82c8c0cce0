//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `SessionStore` port, used when no
//! database is configured and by the test suites. It applies the same
//! double-booking and single-feedback rules as the Postgres schema.

use async_trait::async_trait;
use panchakarma_core::lifecycle::apply;
use panchakarma_core::ports::{PlanFilter, PortError, PortResult, SessionFilter, SessionStore};
use panchakarma_core::{
    Feedback, NewSession, NewTherapyPlan, Session, SessionStatus, StatusChange, TherapyPlan,
};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    plans: HashMap<Uuid, TherapyPlan>,
    sessions: HashMap<Uuid, Session>,
}

impl Tables {
    fn slot_taken(&self, practitioner_id: Uuid, at: NaiveDateTime, except: Option<Uuid>) -> bool {
        self.sessions.values().any(|s| {
            s.practitioner_id == practitioner_id
                && s.scheduled_at == at
                && s.status != SessionStatus::Cancelled
                && Some(s.id) != except
        })
    }
}

#[derive(Default)]
pub struct MemorySessionStore {
    tables: RwLock<Tables>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(mut sessions: Vec<Session>) -> Vec<Session> {
    sessions.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
    sessions
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn list_sessions(&self, filter: SessionFilter) -> PortResult<Vec<Session>> {
        let tables = self.tables.read().await;
        let matching = tables
            .sessions
            .values()
            .filter(|s| match filter {
                SessionFilter::Patient(id) => s.patient_id == id,
                SessionFilter::Practitioner(id) => s.practitioner_id == id,
            })
            .cloned()
            .collect();
        Ok(sorted(matching))
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        self.tables
            .read()
            .await
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn create_session(&self, input: NewSession) -> PortResult<Session> {
        let mut tables = self.tables.write().await;
        if !tables.plans.contains_key(&input.therapy_plan_id) {
            return Err(PortError::NotFound(format!(
                "Therapy plan {} not found",
                input.therapy_plan_id
            )));
        }
        if tables.slot_taken(input.practitioner_id, input.scheduled_at, None) {
            return Err(PortError::Conflict(format!(
                "practitioner {} already has a session at {}",
                input.practitioner_id, input.scheduled_at
            )));
        }

        let session = Session {
            id: Uuid::new_v4(),
            therapy_plan_id: input.therapy_plan_id,
            patient_id: input.patient_id,
            practitioner_id: input.practitioner_id,
            phase: input.phase,
            procedure_name: input.procedure_name,
            scheduled_at: input.scheduled_at,
            status: SessionStatus::Scheduled,
            notes: input.notes,
            feedback: None,
            history: Vec::new(),
        };
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn update_session_status(
        &self,
        session_id: Uuid,
        change: StatusChange,
    ) -> PortResult<Session> {
        let mut tables = self.tables.write().await;
        let current = tables
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))?;

        if current.status != change.from {
            return Err(PortError::Conflict(format!(
                "session {} is {} but the change expects {}",
                session_id, current.status, change.from
            )));
        }
        if let Some(slot) = change.rescheduled_to {
            if tables.slot_taken(current.practitioner_id, slot, Some(session_id)) {
                return Err(PortError::Conflict(format!(
                    "the new slot for session {} is already taken",
                    session_id
                )));
            }
        }

        let updated = apply(current, change);
        tables.sessions.insert(session_id, updated.clone());
        Ok(updated)
    }

    async fn create_feedback(&self, feedback: Feedback) -> PortResult<Feedback> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .get_mut(&feedback.session_id)
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", feedback.session_id)))?;
        if session.feedback.is_some() {
            return Err(PortError::Conflict(format!(
                "session {} already has feedback",
                feedback.session_id
            )));
        }
        session.feedback = Some(feedback.clone());
        Ok(feedback)
    }

    async fn list_therapy_plans(&self, filter: PlanFilter) -> PortResult<Vec<TherapyPlan>> {
        let tables = self.tables.read().await;
        Ok(tables
            .plans
            .values()
            .filter(|p| match filter {
                PlanFilter::Patient(id) => p.patient_id == id,
                PlanFilter::Practitioner(id) => p.practitioner_id == id,
            })
            .cloned()
            .collect())
    }

    async fn get_therapy_plan(&self, plan_id: Uuid) -> PortResult<TherapyPlan> {
        self.tables
            .read()
            .await
            .plans
            .get(&plan_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Therapy plan {} not found", plan_id)))
    }

    async fn create_therapy_plan(&self, input: NewTherapyPlan) -> PortResult<TherapyPlan> {
        let plan = TherapyPlan {
            id: Uuid::new_v4(),
            patient_id: input.patient_id,
            practitioner_id: input.practitioner_id,
            phase: input.phase,
            description: input.description,
            start_date: input.start_date,
            end_date: input.end_date,
        };
        self.tables.write().await.plans.insert(plan.id, plan.clone());
        Ok(plan)
    }
}
