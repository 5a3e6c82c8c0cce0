//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LogNotifier, MemorySessionStore, TimeoutStore},
    config::{Config, ConfigError},
    error::ApiError,
    web::{self, middleware::{USER_ID_HEADER, USER_ROLE_HEADER}, rest::ApiDoc, AppState},
};
use axum::{
    http::{header::{ACCEPT, CONTENT_TYPE}, HeaderName, HeaderValue, Method},
    Router,
};
use panchakarma_core::{SessionStore, TherapyWorkflow};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to the Session Store ---
    let store: Arc<dyn SessionStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(config.store_timeout)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            warn!("DATABASE_URL is not set. Sessions are kept in memory and lost on restart.");
            Arc::new(MemorySessionStore::new())
        }
    };
    let store = Arc::new(TimeoutStore::new(store, config.store_timeout));

    // --- 3. Build the Shared AppState ---
    let policy = config.therapy_policy();
    info!(
        "Conflict window: {:?}, completion grace: {:?}",
        policy.window, policy.completion.grace
    );
    let app_state = Arc::new(AppState {
        workflow: TherapyWorkflow::new(store, Arc::new(LogNotifier::new()), policy),
        config: config.clone(),
    });

    // --- 4. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_ROLE_HEADER),
        ]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state))
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
