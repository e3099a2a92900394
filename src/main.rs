// Commit Weather API v0.1
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod db;
mod errors;
mod helpers;
mod routes;
mod services;

use config::AppConfig;
use routes::AppState;
use services::github::GithubClient;
use services::open_meteo::OpenMeteoClient;
use services::sync::{SharedSyncState, SyncState};

/// Maximum number of connections in the database pool.
const DB_POOL_MAX_CONNECTIONS: u32 = 5;
/// Minimum number of connections kept alive in the database pool.
const DB_POOL_MIN_CONNECTIONS: u32 = 1;

/// Commit Weather API OpenAPI specification.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Commit Weather API",
        version = "0.1.0",
        description = "Correlates personal commit activity with the weather. \
            Ingests commits and pull requests from GitHub and daily weather from \
            the Open-Meteo archive, joins them by calendar day, and reports \
            seasonal, temperature and precipitation breakdowns alongside \
            Pearson correlations.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Analysis", description = "Commit and weather analytics"),
        (name = "Sync", description = "On-demand data ingestion"),
    ),
    paths(
        routes::health::health_check,
        routes::analysis::get_stats,
        routes::analysis::get_correlations,
        routes::sync::post_github_sync,
        routes::sync::post_weather_sync,
        routes::sync::get_sync_status,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            services::analysis::StatsResponse,
            services::analysis::CommitOverview,
            services::analysis::PullRequestOverview,
            services::analysis::WeatherOverview,
            services::analysis::CorrelationReport,
            services::metrics::DailyMetric,
            services::metrics::JoinCoverage,
            services::aggregate::Season,
            services::aggregate::SeasonalStat,
            services::aggregate::TempRangeBucket,
            services::aggregate::PrecipCategory,
            services::correlation::CorrelationResult,
            services::sync::GithubSyncSummary,
            services::sync::WeatherSyncSummary,
            services::sync::SyncState,
            services::sync::SyncJobState,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();

    // Initialize tracing
    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commit_weather_api=debug,tower_http=debug".into()),
        )
        .with(fmt_layer)
        .init();

    // Set up database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(DB_POOL_MAX_CONNECTIONS)
        .min_connections(DB_POOL_MIN_CONNECTIONS)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    db::queries::validate_timezone(&pool, &config.reporting_timezone)
        .await
        .expect("REPORTING_TIMEZONE must be a time zone name Postgres recognises");

    let github_client = match &config.github_token {
        Some(token) => Some(
            GithubClient::new(&config.github_api_url, token, &config.github_user_agent)
                .expect("Failed to create GitHub client"),
        ),
        None => {
            tracing::warn!("GITHUB_TOKEN not set; GitHub sync is disabled");
            None
        }
    };
    let weather_client =
        OpenMeteoClient::new(&config.weather_api_url).expect("Failed to create weather client");

    tracing::info!(
        "Reporting commit days in {}; weather for {} ({}, {})",
        config.reporting_timezone,
        config.location.name,
        config.location.latitude,
        config.location.longitude
    );

    let sync_state: SharedSyncState = Arc::new(RwLock::new(SyncState::default()));

    // Build shared application state
    let app_state = AppState {
        pool,
        github_client,
        weather_client,
        sync_state,
        config: config.clone(),
    };

    // CORS: GET for reads, POST for the sync triggers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/stats", get(routes::analysis::get_stats))
        .route("/api/v1/correlations", get(routes::analysis::get_correlations))
        .route("/api/v1/sync/github", post(routes::sync::post_github_sync))
        .route("/api/v1/sync/weather", post(routes::sync::post_weather_sync))
        .route("/api/v1/sync/status", get(routes::sync::get_sync_status))
        .with_state(app_state);

    let app = Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    axum::serve(listener, app)
        .await
        .expect("Server terminated unexpectedly");
}
