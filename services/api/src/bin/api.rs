//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{db::DbAdapter, task_llm::OpenAiTaskAdapter},
    config::Config,
    error::ApiError,
    web::{
        middleware::require_identity,
        rest::{self, ApiDoc},
        state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use habit_tracker_core::{
    clock::{SystemClock, TimeZonePolicy},
    lifecycle::ChecklistLifecycle,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(
        db_pool.clone(),
        config.local_utc_offset_hours,
    ));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let task_adapter = Arc::new(OpenAiTaskAdapter::new(
        openai_client,
        config.task_model.clone(),
    ));

    let tz = TimeZonePolicy::from_offset_hours(config.local_utc_offset_hours).ok_or_else(|| {
        ApiError::Internal(format!(
            "Invalid LOCAL_UTC_OFFSET_HOURS: {}",
            config.local_utc_offset_hours
        ))
    })?;
    let lifecycle = Arc::new(ChecklistLifecycle::new(
        db_adapter,
        task_adapter,
        Arc::new(SystemClock),
        tz,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        lifecycle,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Every route requires a verified identity header from the upstream
    // identity provider.
    let api_router = Router::new()
        .route(
            "/checklist",
            get(rest::list_checklist_handler).post(rest::create_checklist_handler),
        )
        .route(
            "/checklist/{id}/days/{day_index}",
            put(rest::set_day_check_handler),
        )
        .route("/checklist/{id}/completed", put(rest::set_completed_handler))
        .route("/checklist/{id}/promote", post(rest::promote_handler))
        .route("/checklist/{id}", delete(rest::delete_checklist_handler))
        .route("/history", get(rest::list_history_handler))
        .route(
            "/core-habits",
            get(rest::list_core_habits_handler).post(rest::create_core_habit_handler),
        )
        .route(
            "/core-habits/{id}/status",
            put(rest::set_core_habit_status_handler),
        )
        .route("/core-habits/{id}", delete(rest::delete_core_habit_handler))
        .route(
            "/goals",
            get(rest::list_goals_handler).post(rest::create_goal_handler),
        )
        .route("/goals/{id}/status", put(rest::set_goal_status_handler))
        .route("/goals/{id}", delete(rest::delete_goal_handler))
        .route("/goals/{id}/generate", post(rest::generate_from_goal_handler))
        .layer(axum_middleware::from_fn(require_identity))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
