//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SessionStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use panchakarma_core::ports::{PlanFilter, PortError, PortResult, SessionFilter, SessionStore};
use panchakarma_core::{
    Feedback, NewSession, NewTherapyPlan, Phase, Session, SessionStatus, StatusChange,
    TherapyPlan,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SessionStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => PortError::Unavailable(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn not_found_or(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        e => unexpected(e),
    }
}

fn conflict_or(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => PortError::Conflict(what),
        e => unexpected(e),
    }
}

fn parse_phase(raw: &str) -> PortResult<Phase> {
    raw.parse().map_err(PortError::Unexpected)
}

fn parse_status(raw: &str) -> PortResult<SessionStatus> {
    raw.parse().map_err(PortError::Unexpected)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct PlanRecord {
    id: Uuid,
    patient_id: Uuid,
    practitioner_id: Uuid,
    phase: String,
    description: String,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
}
impl PlanRecord {
    fn to_domain(self) -> PortResult<TherapyPlan> {
        Ok(TherapyPlan {
            id: self.id,
            patient_id: self.patient_id,
            practitioner_id: self.practitioner_id,
            phase: parse_phase(&self.phase)?,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
        })
    }
}

/// A session joined with its (optional) feedback row.
#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    therapy_plan_id: Uuid,
    patient_id: Uuid,
    practitioner_id: Uuid,
    phase: String,
    procedure_name: String,
    scheduled_at: NaiveDateTime,
    status: String,
    notes: Option<String>,
    feedback_id: Option<Uuid>,
    rating: Option<i16>,
    message: Option<String>,
    symptoms: Option<String>,
    side_effects: Option<String>,
    improvement_level: Option<i16>,
    feedback_created_at: Option<NaiveDateTime>,
}
impl SessionRecord {
    fn to_domain(self, history: Vec<StatusChange>) -> PortResult<Session> {
        let feedback = match (self.feedback_id, self.rating, self.message, self.feedback_created_at) {
            (Some(id), Some(rating), Some(message), Some(created_at)) => Some(Feedback {
                id,
                session_id: self.id,
                patient_id: self.patient_id,
                rating: rating as u8,
                message,
                symptoms: self.symptoms,
                side_effects: self.side_effects,
                improvement_level: self.improvement_level.map(|l| l as u8),
                created_at,
            }),
            _ => None,
        };
        Ok(Session {
            id: self.id,
            therapy_plan_id: self.therapy_plan_id,
            patient_id: self.patient_id,
            practitioner_id: self.practitioner_id,
            phase: parse_phase(&self.phase)?,
            procedure_name: self.procedure_name,
            scheduled_at: self.scheduled_at,
            status: parse_status(&self.status)?,
            notes: self.notes,
            feedback,
            history,
        })
    }
}

#[derive(FromRow)]
struct HistoryRecord {
    session_id: Uuid,
    from_status: String,
    to_status: String,
    changed_at: NaiveDateTime,
    rescheduled_to: Option<NaiveDateTime>,
}
impl HistoryRecord {
    fn to_domain(self) -> PortResult<StatusChange> {
        Ok(StatusChange {
            from: parse_status(&self.from_status)?,
            to: parse_status(&self.to_status)?,
            changed_at: self.changed_at,
            rescheduled_to: self.rescheduled_to,
        })
    }
}

#[derive(FromRow)]
struct FeedbackRecord {
    id: Uuid,
    session_id: Uuid,
    patient_id: Uuid,
    rating: i16,
    message: String,
    symptoms: Option<String>,
    side_effects: Option<String>,
    improvement_level: Option<i16>,
    created_at: NaiveDateTime,
}
impl FeedbackRecord {
    fn to_domain(self) -> Feedback {
        Feedback {
            id: self.id,
            session_id: self.session_id,
            patient_id: self.patient_id,
            rating: self.rating as u8,
            message: self.message,
            symptoms: self.symptoms,
            side_effects: self.side_effects,
            improvement_level: self.improvement_level.map(|l| l as u8),
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// Queries
//=========================================================================================

const SESSION_SELECT: &str = "SELECT s.id, s.therapy_plan_id, s.patient_id, s.practitioner_id, s.phase, \
     s.procedure_name, s.scheduled_at, s.status, s.notes, \
     f.id AS feedback_id, f.rating, f.message, f.symptoms, f.side_effects, f.improvement_level, \
     f.created_at AS feedback_created_at \
     FROM sessions s LEFT JOIN feedback f ON f.session_id = s.id";

const PLAN_COLUMNS: &str =
    "id, patient_id, practitioner_id, phase, description, start_date, end_date";

impl DbAdapter {
    /// Loads the status history of `session_ids`, grouped per session in insertion order.
    async fn histories(&self, session_ids: &[Uuid]) -> PortResult<HashMap<Uuid, Vec<StatusChange>>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            "SELECT session_id, from_status, to_status, changed_at, rescheduled_to \
             FROM session_status_history WHERE session_id = ANY($1) ORDER BY id ASC",
        )
        .bind(session_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut grouped: HashMap<Uuid, Vec<StatusChange>> = HashMap::new();
        for record in records {
            let session_id = record.session_id;
            grouped.entry(session_id).or_default().push(record.to_domain()?);
        }
        Ok(grouped)
    }

    async fn hydrate(&self, records: Vec<SessionRecord>) -> PortResult<Vec<Session>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let mut histories = self.histories(&ids).await?;
        records
            .into_iter()
            .map(|r| {
                let history = histories.remove(&r.id).unwrap_or_default();
                r.to_domain(history)
            })
            .collect()
    }

    async fn lock_status(
        tx: &mut Transaction<'_, Postgres>,
        session_id: Uuid,
    ) -> PortResult<SessionStatus> {
        let (status,): (String,) = sqlx::query_as("SELECT status FROM sessions WHERE id = $1 FOR UPDATE")
            .bind(session_id)
            .fetch_one(&mut **tx)
            .await
            .map_err(not_found_or(format!("Session {} not found", session_id)))?;
        parse_status(&status)
    }
}

//=========================================================================================
// `SessionStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionStore for DbAdapter {
    async fn list_sessions(&self, filter: SessionFilter) -> PortResult<Vec<Session>> {
        let (clause, owner) = match filter {
            SessionFilter::Patient(id) => ("s.patient_id", id),
            SessionFilter::Practitioner(id) => ("s.practitioner_id", id),
        };
        let sql = format!("{} WHERE {} = $1 ORDER BY s.scheduled_at ASC, s.id ASC", SESSION_SELECT, clause);
        let records = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        self.hydrate(records).await
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        let sql = format!("{} WHERE s.id = $1", SESSION_SELECT);
        let record = sqlx::query_as::<_, SessionRecord>(&sql)
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or(format!("Session {} not found", session_id)))?;
        self.hydrate(vec![record])
            .await?
            .pop()
            .ok_or_else(|| PortError::NotFound(format!("Session {} not found", session_id)))
    }

    async fn create_session(&self, input: NewSession) -> PortResult<Session> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO sessions (id, therapy_plan_id, patient_id, practitioner_id, phase, procedure_name, scheduled_at, status, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(id)
        .bind(input.therapy_plan_id)
        .bind(input.patient_id)
        .bind(input.practitioner_id)
        .bind(input.phase.as_str())
        .bind(&input.procedure_name)
        .bind(input.scheduled_at)
        .bind(SessionStatus::Scheduled.as_str())
        .bind(&input.notes)
        .execute(&self.pool)
        .await
        .map_err(conflict_or(format!(
            "practitioner {} already has a session at {}",
            input.practitioner_id, input.scheduled_at
        )))?;

        self.get_session(id).await
    }

    async fn update_session_status(
        &self,
        session_id: Uuid,
        change: StatusChange,
    ) -> PortResult<Session> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let current = Self::lock_status(&mut tx, session_id).await?;
        if current != change.from {
            return Err(PortError::Conflict(format!(
                "session {} is {} but the change expects {}",
                session_id, current, change.from
            )));
        }

        sqlx::query(
            "UPDATE sessions SET status = $1, scheduled_at = COALESCE($2, scheduled_at) WHERE id = $3",
        )
        .bind(change.to.as_str())
        .bind(change.rescheduled_to)
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(conflict_or(format!(
            "the new slot for session {} is already taken",
            session_id
        )))?;

        sqlx::query(
            "INSERT INTO session_status_history (session_id, from_status, to_status, changed_at, rescheduled_to) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session_id)
        .bind(change.from.as_str())
        .bind(change.to.as_str())
        .bind(change.changed_at)
        .bind(change.rescheduled_to)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        self.get_session(session_id).await
    }

    async fn create_feedback(&self, feedback: Feedback) -> PortResult<Feedback> {
        let record = sqlx::query_as::<_, FeedbackRecord>(
            "INSERT INTO feedback (id, session_id, patient_id, rating, message, symptoms, side_effects, improvement_level, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, session_id, patient_id, rating, message, symptoms, side_effects, improvement_level, created_at",
        )
        .bind(feedback.id)
        .bind(feedback.session_id)
        .bind(feedback.patient_id)
        .bind(feedback.rating as i16)
        .bind(&feedback.message)
        .bind(&feedback.symptoms)
        .bind(&feedback.side_effects)
        .bind(feedback.improvement_level.map(|l| l as i16))
        .bind(feedback.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_or(format!(
            "session {} already has feedback",
            feedback.session_id
        )))?;
        Ok(record.to_domain())
    }

    async fn list_therapy_plans(&self, filter: PlanFilter) -> PortResult<Vec<TherapyPlan>> {
        let (clause, owner) = match filter {
            PlanFilter::Patient(id) => ("patient_id", id),
            PlanFilter::Practitioner(id) => ("practitioner_id", id),
        };
        let sql = format!(
            "SELECT {} FROM therapy_plans WHERE {} = $1 ORDER BY created_at DESC",
            PLAN_COLUMNS, clause
        );
        let records = sqlx::query_as::<_, PlanRecord>(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(PlanRecord::to_domain).collect()
    }

    async fn get_therapy_plan(&self, plan_id: Uuid) -> PortResult<TherapyPlan> {
        let sql = format!("SELECT {} FROM therapy_plans WHERE id = $1", PLAN_COLUMNS);
        sqlx::query_as::<_, PlanRecord>(&sql)
            .bind(plan_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or(format!("Therapy plan {} not found", plan_id)))?
            .to_domain()
    }

    async fn create_therapy_plan(&self, input: NewTherapyPlan) -> PortResult<TherapyPlan> {
        let sql = format!(
            "INSERT INTO therapy_plans ({}) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            PLAN_COLUMNS, PLAN_COLUMNS
        );
        sqlx::query_as::<_, PlanRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.patient_id)
            .bind(input.practitioner_id)
            .bind(input.phase.as_str())
            .bind(&input.description)
            .bind(input.start_date)
            .bind(input.end_date)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?
            .to_domain()
    }
}
