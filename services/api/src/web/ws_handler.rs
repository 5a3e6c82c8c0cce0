//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a progress feed
//! connection. It owns the polling task and reacts to client commands.

use crate::web::{
    progress_task::{progress_process, push_progress, FeedSink, WsSender},
    protocol::{ClientMessage, ServerMessage},
    state::{AppState, FeedState},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::stream::StreamExt;
use panchakarma_core::Actor;
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_progress_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, actor))
}

fn spawn_polling(
    app_state: &Arc<AppState>,
    feed_lock: &Arc<Mutex<FeedState>>,
    ws_sender: &WsSender,
    token: CancellationToken,
) -> JoinHandle<()> {
    let app_state = app_state.clone();
    let feed_lock = feed_lock.clone();
    let ws_sender = ws_sender.clone();
    tokio::spawn(progress_process(app_state, feed_lock, ws_sender, token))
}

/// Tasks a connection has spawned and must stop when it closes.
#[derive(Default)]
struct FeedTasks {
    polling: Option<JoinHandle<()>>,
    refresh: Option<JoinHandle<bool>>,
}

impl FeedTasks {
    fn abort_all(&mut self) {
        if let Some(handle) = self.polling.take() {
            handle.abort();
        }
        if let Some(handle) = self.refresh.take() {
            handle.abort();
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, actor: Actor) {
    info!("New progress feed connection for {:?} {}", actor.role, actor.id);

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let feed_lock = match receiver.next().await {
        Some(Ok(Message::Text(init_json))) => match serde_json::from_str::<ClientMessage>(&init_json) {
            Ok(ClientMessage::Init { patient_id }) => Arc::new(Mutex::new(FeedState::new(actor, patient_id))),
            _ => {
                error!("First message was not a valid Init message.");
                ws_sender
                    .deliver(&ServerMessage::Error {
                        message: "The first message must be init.".to_string(),
                    })
                    .await;
                return;
            }
        },
        _ => {
            error!("Client disconnected before sending Init message.");
            return;
        }
    };

    let subscribed = ServerMessage::Subscribed {
        poll_interval_secs: app_state.config.progress_poll_interval.as_secs(),
    };
    if !ws_sender.deliver(&subscribed).await {
        error!("Failed to send subscribed message.");
        return;
    }

    // --- 2. Main Message Loop ---
    let mut tasks = FeedTasks::default();
    {
        let token = feed_lock.lock().await.cancellation_token.clone();
        tasks.polling = Some(spawn_polling(&app_state, &feed_lock, &ws_sender, token));
    }

    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                handle_text_message(&text, &app_state, &feed_lock, &ws_sender, &mut tasks).await;
            }
            Some(Ok(Message::Close(_))) => {
                info!("Client sent close message.");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
            None => {
                info!("Client disconnected.");
                break;
            }
        }
    }

    // --- 3. Cleanup ---
    feed_lock.lock().await.cancellation_token.cancel();
    tasks.abort_all();
    info!("Progress feed closed.");
}

async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    feed_lock: &Arc<Mutex<FeedState>>,
    ws_sender: &WsSender,
    tasks: &mut FeedTasks,
) {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Refresh) => {
            info!("Refresh requested.");
            if let Some(previous) = tasks.refresh.take() {
                previous.abort();
            }
            tasks.refresh = Some(tokio::spawn(push_progress(
                app_state.clone(),
                feed_lock.clone(),
                ws_sender.clone(),
            )));
        }
        Ok(ClientMessage::Pause) => {
            info!("Pause requested. Cancelling polling task.");
            feed_lock.lock().await.pause();
            if let Some(refresh) = tasks.refresh.take() {
                refresh.abort();
            }
            ws_sender.deliver(&ServerMessage::Paused).await;
        }
        Ok(ClientMessage::Resume) => {
            let mut feed = feed_lock.lock().await;
            if !feed.paused {
                warn!("Resume received while polling is already running.");
                return;
            }
            info!("Resume requested. Restarting polling task.");
            feed.paused = false;
            feed.cancellation_token = CancellationToken::new();
            let token = feed.cancellation_token.clone();
            drop(feed);
            if let Some(previous) = tasks.polling.replace(spawn_polling(app_state, feed_lock, ws_sender, token)) {
                previous.abort();
            }
        }
        Ok(ClientMessage::Init { .. }) => {
            warn!("Received subsequent Init message, which is ignored.");
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}
