//! Sync HTTP endpoints.
//!
//! - POST /api/v1/sync/github
//! - POST /api/v1/sync/weather
//! - GET  /api/v1/sync/status

use axum::extract::State;
use axum::Json;
use chrono::{Duration, Utc};

use super::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::services::sync::{
    run_tracked, sync_github, sync_weather, GithubSyncSummary, SyncJob, SyncState,
    WeatherSyncSummary,
};

/// Ingest commits and pull requests from GitHub.
///
/// Runs to completion before responding. Commits older than the configured
/// lookback are not fetched; already stored rows are left untouched.
#[utoipa::path(
    post,
    path = "/api/v1/sync/github",
    tag = "Sync",
    responses(
        (status = 200, description = "Sync finished", body = GithubSyncSummary),
        (status = 401, description = "No GitHub token configured, or token rejected", body = ErrorResponse),
        (status = 409, description = "A GitHub sync is already running", body = ErrorResponse),
        (status = 502, description = "GitHub unavailable or rate limited", body = ErrorResponse),
    )
)]
pub async fn post_github_sync(
    State(state): State<AppState>,
) -> Result<Json<GithubSyncSummary>, AppError> {
    let client = state.github_client.clone().ok_or_else(|| {
        AppError::Unauthorized("GITHUB_TOKEN is not configured".to_string())
    })?;
    let since = Utc::now() - Duration::days(state.config.sync_lookback_days);

    let work = sync_github(
        state.pool.clone(),
        client,
        since,
        state.config.github_include_private,
    );
    let summary = run_tracked(&state.sync_state, SyncJob::Github, work).await?;
    Ok(Json(summary))
}

/// Ingest weather for every day between the first and last stored commit.
#[utoipa::path(
    post,
    path = "/api/v1/sync/weather",
    tag = "Sync",
    responses(
        (status = 200, description = "Sync finished", body = WeatherSyncSummary),
        (status = 409, description = "A weather sync is already running", body = ErrorResponse),
        (status = 502, description = "Weather archive unavailable", body = ErrorResponse),
    )
)]
pub async fn post_weather_sync(
    State(state): State<AppState>,
) -> Result<Json<WeatherSyncSummary>, AppError> {
    let work = sync_weather(
        state.pool.clone(),
        state.weather_client.clone(),
        state.config.location.clone(),
        state.config.reporting_timezone.clone(),
    );
    let summary = run_tracked(&state.sync_state, SyncJob::Weather, work).await?;
    Ok(Json(summary))
}

/// Current state of both sync jobs.
#[utoipa::path(
    get,
    path = "/api/v1/sync/status",
    tag = "Sync",
    responses(
        (status = 200, description = "Sync job state", body = SyncState),
    )
)]
pub async fn get_sync_status(State(state): State<AppState>) -> Json<SyncState> {
    let s = state.sync_state.read().await;
    Json(s.clone())
}
