//! services/api/src/web/progress_task.rs
//!
//! The asynchronous "worker" functions behind the live progress feed.

use crate::web::{dto::ProgressResponse, protocol::ServerMessage, state::{AppState, FeedState}};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::{stream::SplitSink, SinkExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Where the feed delivers its messages.
#[async_trait]
pub trait FeedSink: Clone + Send + Sync + 'static {
    /// Returns `false` once the client is gone.
    async fn deliver(&self, message: &ServerMessage) -> bool;
}

#[async_trait]
impl FeedSink for WsSender {
    async fn deliver(&self, message: &ServerMessage) -> bool {
        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize server message: {}", e);
                return true;
            }
        };
        self.lock().await.send(Message::Text(json.into())).await.is_ok()
    }
}

/// Runs one poll: recomputes the report and pushes it unless a newer poll or
/// a pause has superseded it while it was waiting on the store.
pub async fn push_progress<S: FeedSink>(
    app_state: Arc<AppState>,
    feed_lock: Arc<Mutex<FeedState>>,
    sink: S,
) -> bool {
    let (generation, actor, patient_id) = {
        let mut feed = feed_lock.lock().await;
        (feed.begin_poll(), feed.actor, feed.patient_id)
    };

    let message = match app_state.workflow.progress(&actor, patient_id).await {
        Ok(report) => ServerMessage::Progress {
            generation,
            report: ProgressResponse::from(report),
        },
        Err(e) => {
            error!("Progress poll {} failed: {}", generation, e);
            ServerMessage::Error {
                message: e.to_string(),
            }
        }
    };

    // Hold the feed lock while sending so a newer poll cannot slip in between
    // the check and the write.
    let feed = feed_lock.lock().await;
    if !feed.is_current(generation) {
        debug!("Discarding stale progress poll {}", generation);
        return true;
    }
    sink.deliver(&message).await
}

/// The polling loop. Pushes a report immediately, then once per interval
/// until cancelled or the client disconnects.
pub async fn progress_process<S: FeedSink>(
    app_state: Arc<AppState>,
    feed_lock: Arc<Mutex<FeedState>>,
    sink: S,
    cancellation_token: CancellationToken,
) {
    info!("Progress polling started.");
    let mut ticker = tokio::time::interval(app_state.config.progress_poll_interval);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Progress polling cancelled.");
                return;
            }
            _ = ticker.tick() => {
                if !push_progress(app_state.clone(), feed_lock.clone(), sink.clone()).await {
                    error!("Failed to send progress to client. Ending polling task.");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LogNotifier, MemorySessionStore};
    use crate::config::Config;
    use panchakarma_core::ports::{PlanFilter, PortResult, SessionFilter, SessionStore};
    use panchakarma_core::{
        Actor, Feedback, NewSession, NewTherapyPlan, Session, StatusChange, TherapyPlan,
        TherapyPolicy, TherapyWorkflow,
    };
    use tokio::sync::{mpsc, oneshot};
    use uuid::Uuid;

    #[async_trait]
    impl FeedSink for mpsc::UnboundedSender<ServerMessage> {
        async fn deliver(&self, message: &ServerMessage) -> bool {
            self.send(message.clone()).is_ok()
        }
    }

    /// Holds the first session listing until the test releases it.
    struct GatedStore {
        inner: MemorySessionStore,
        entered: Mutex<Option<oneshot::Sender<()>>>,
        release: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl SessionStore for GatedStore {
        async fn list_sessions(&self, filter: SessionFilter) -> PortResult<Vec<Session>> {
            let gate = self.release.lock().await.take();
            if let Some(release) = gate {
                if let Some(entered) = self.entered.lock().await.take() {
                    let _ = entered.send(());
                }
                let _ = release.await;
            }
            self.inner.list_sessions(filter).await
        }
        async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
            self.inner.get_session(session_id).await
        }
        async fn create_session(&self, input: NewSession) -> PortResult<Session> {
            self.inner.create_session(input).await
        }
        async fn update_session_status(&self, id: Uuid, change: StatusChange) -> PortResult<Session> {
            self.inner.update_session_status(id, change).await
        }
        async fn create_feedback(&self, feedback: Feedback) -> PortResult<Feedback> {
            self.inner.create_feedback(feedback).await
        }
        async fn list_therapy_plans(&self, filter: PlanFilter) -> PortResult<Vec<TherapyPlan>> {
            self.inner.list_therapy_plans(filter).await
        }
        async fn get_therapy_plan(&self, plan_id: Uuid) -> PortResult<TherapyPlan> {
            self.inner.get_therapy_plan(plan_id).await
        }
        async fn create_therapy_plan(&self, input: NewTherapyPlan) -> PortResult<TherapyPlan> {
            self.inner.create_therapy_plan(input).await
        }
    }

    struct Feed {
        app_state: Arc<AppState>,
        feed_lock: Arc<Mutex<FeedState>>,
        entered: oneshot::Receiver<()>,
        release: oneshot::Sender<()>,
    }

    fn gated_feed() -> Feed {
        let (entered_tx, entered) = oneshot::channel();
        let (release, release_rx) = oneshot::channel();
        let store = GatedStore {
            inner: MemorySessionStore::new(),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(Some(release_rx)),
        };
        let config = Config::from_lookup(|_| None).unwrap();
        let app_state = Arc::new(AppState {
            workflow: TherapyWorkflow::new(
                Arc::new(store),
                Arc::new(LogNotifier::new()),
                TherapyPolicy::default(),
            ),
            config: Arc::new(config),
        });
        Feed {
            app_state,
            feed_lock: Arc::new(Mutex::new(FeedState::new(Actor::patient(Uuid::new_v4()), None))),
            entered,
            release,
        }
    }

    async fn drain(mut rx: mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut delivered = Vec::new();
        while let Some(message) = rx.recv().await {
            delivered.push(message);
        }
        delivered
    }

    #[tokio::test]
    async fn newer_poll_wins_over_slow_one() {
        let feed = gated_feed();
        let (tx, rx) = mpsc::unbounded_channel();

        let slow = tokio::spawn(push_progress(feed.app_state.clone(), feed.feed_lock.clone(), tx.clone()));
        feed.entered.await.unwrap();

        assert!(push_progress(feed.app_state.clone(), feed.feed_lock.clone(), tx.clone()).await);
        feed.release.send(()).unwrap();
        assert!(slow.await.unwrap());
        drop(tx);

        let delivered = drain(rx).await;
        assert_eq!(delivered.len(), 1);
        assert!(matches!(delivered[0], ServerMessage::Progress { generation: 2, .. }));
    }

    #[tokio::test]
    async fn pause_suppresses_poll_in_flight() {
        let feed = gated_feed();
        let (tx, rx) = mpsc::unbounded_channel();

        let slow = tokio::spawn(push_progress(feed.app_state.clone(), feed.feed_lock.clone(), tx.clone()));
        feed.entered.await.unwrap();

        feed.feed_lock.lock().await.pause();
        feed.release.send(()).unwrap();
        assert!(slow.await.unwrap());
        drop(tx);

        assert!(drain(rx).await.is_empty());
    }

    #[tokio::test]
    async fn polling_stops_on_cancel() {
        let feed = gated_feed();
        feed.release.send(()).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let token = feed.feed_lock.lock().await.cancellation_token.clone();

        let polling = tokio::spawn(progress_process(
            feed.app_state.clone(),
            feed.feed_lock.clone(),
            tx,
            token.clone(),
        ));
        feed.entered.await.unwrap();
        token.cancel();
        polling.await.unwrap();

        let delivered = drain(rx).await;
        assert!(delivered.len() <= 1);
        assert!(delivered
            .iter()
            .all(|m| matches!(m, ServerMessage::Progress { generation: 1, .. })));
    }
}
