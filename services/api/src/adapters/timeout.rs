//! services/api/src/adapters/timeout.rs
//!
//! Wraps any `SessionStore` so that no call can hang: each one is bounded by
//! the configured timeout and reported as `PortError::Unavailable` when it
//! runs out.

use async_trait::async_trait;
use panchakarma_core::ports::{PlanFilter, PortError, PortResult, SessionFilter, SessionStore};
use panchakarma_core::{Feedback, NewSession, NewTherapyPlan, Session, StatusChange, TherapyPlan};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

pub struct TimeoutStore {
    inner: Arc<dyn SessionStore>,
    limit: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn SessionStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = PortResult<T>> + Send,
    ) -> PortResult<T> {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Session store call {} timed out after {:?}", operation, self.limit);
                Err(PortError::Unavailable(format!(
                    "{} timed out after {} ms",
                    operation,
                    self.limit.as_millis()
                )))
            }
        }
    }
}

#[async_trait]
impl SessionStore for TimeoutStore {
    async fn list_sessions(&self, filter: SessionFilter) -> PortResult<Vec<Session>> {
        self.bounded("list_sessions", self.inner.list_sessions(filter)).await
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        self.bounded("get_session", self.inner.get_session(session_id)).await
    }

    async fn create_session(&self, input: NewSession) -> PortResult<Session> {
        self.bounded("create_session", self.inner.create_session(input)).await
    }

    async fn update_session_status(
        &self,
        session_id: Uuid,
        change: StatusChange,
    ) -> PortResult<Session> {
        self.bounded(
            "update_session_status",
            self.inner.update_session_status(session_id, change),
        )
        .await
    }

    async fn create_feedback(&self, feedback: Feedback) -> PortResult<Feedback> {
        self.bounded("create_feedback", self.inner.create_feedback(feedback)).await
    }

    async fn list_therapy_plans(&self, filter: PlanFilter) -> PortResult<Vec<TherapyPlan>> {
        self.bounded("list_therapy_plans", self.inner.list_therapy_plans(filter)).await
    }

    async fn get_therapy_plan(&self, plan_id: Uuid) -> PortResult<TherapyPlan> {
        self.bounded("get_therapy_plan", self.inner.get_therapy_plan(plan_id)).await
    }

    async fn create_therapy_plan(&self, input: NewTherapyPlan) -> PortResult<TherapyPlan> {
        self.bounded("create_therapy_plan", self.inner.create_therapy_plan(input)).await
    }
}
