pub mod dto;
pub mod middleware;
pub mod progress_task;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::{require_actor, require_feed_actor};
pub use state::AppState;
pub use ws_handler::ws_progress_handler;

/// Builds the application routes. `/health` is public; everything else
/// requires the identity headers, which the progress feed also accepts as
/// query parameters.
pub fn router(app_state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route(
            "/therapy-plans",
            post(rest::create_therapy_plan_handler).get(rest::list_therapy_plans_handler),
        )
        .route(
            "/sessions",
            post(rest::schedule_session_handler).get(rest::list_sessions_handler),
        )
        .route("/sessions/{id}/status", put(rest::update_session_status_handler))
        .route("/sessions/{id}/next-statuses", get(rest::next_statuses_handler))
        .route("/availability", post(rest::check_availability_handler))
        .route("/schedule/day", get(rest::day_view_handler))
        .route(
            "/feedback",
            post(rest::submit_feedback_handler).get(rest::list_feedback_handler),
        )
        .route("/feedback/eligible", get(rest::eligible_feedback_handler))
        .route("/therapy-progress", get(rest::therapy_progress_handler))
        .route("/dashboard", get(rest::dashboard_handler))
        .layer(axum_middleware::from_fn(require_actor));

    let feed_routes = Router::new()
        .route("/ws/progress", get(ws_progress_handler))
        .layer(axum_middleware::from_fn(require_feed_actor));

    Router::new()
        .route("/health", get(rest::health_handler))
        .merge(protected_routes)
        .merge(feed_routes)
        .with_state(app_state)
}
